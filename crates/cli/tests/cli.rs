use assert_cmd::Command;

fn shelf() -> Command {
    let mut cmd = Command::cargo_bin("shelf").unwrap();
    cmd.env_remove("SHELF_API_URL")
        .env_remove("SHELF_API_TOKEN")
        .env_remove("SHELF_CLI_OTLP_ENDPOINT")
        .env_remove("RUST_LOG");
    cmd
}

fn stderr_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_lists_every_subcommand() {
    let output = shelf().arg("--help").output().unwrap();
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["list", "get", "create", "update", "delete", "search"] {
        assert!(help.contains(command), "missing {command} in:\n{help}");
    }
}

#[test]
fn non_numeric_id_is_a_usage_error() {
    shelf().args(["get", "abc"]).assert().failure().code(2);
}

#[test]
fn create_requires_title_and_author() {
    shelf()
        .args(["create", "--title", "Dune"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn relative_base_url_is_rejected() {
    let stderr = stderr_of(shelf().args(["--base-url", "localhost:8081", "list"]));
    assert!(stderr.contains("invalid base url"), "{stderr}");
}

#[test]
fn unreachable_server_is_reported() {
    let stderr = stderr_of(shelf().args(["--base-url", "http://127.0.0.1:1", "list"]));
    assert!(stderr.contains("request failed"), "{stderr}");
}

#[test]
fn declined_delete_sends_nothing() {
    let output = shelf()
        .args(["--base-url", "http://127.0.0.1:1", "delete", "3"])
        .write_stdin("n\n")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Are you sure you want to delete this book?"));
    assert!(stderr.contains("not deleted"));
}
