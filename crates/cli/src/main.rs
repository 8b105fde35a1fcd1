//! `shelf`: command-line client for the books API.
//!
//! Each subcommand is one traced call through [`BooksClient`]; the response
//! is printed as pretty JSON on stdout. Logs go to stderr and are off unless
//! `--verbose` is given.

use std::io::{self, BufRead, Write};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shelf_app::books::models::{CreateBookRequest, UpdateBookRequest};
use shelf_client::{view::DELETE_PROMPT, BooksApi, BooksClient, Confirm, DEFAULT_BASE_URL};
use shelf_telemetry::{TelemetrySettings, TraceExporter};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Command-line client for the books API")]
#[command(version)]
struct Cli {
    /// Base URL of the books API
    #[arg(long, env = "SHELF_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Bearer token sent with every call
    #[arg(long, env = "SHELF_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Export client spans to this OTLP/HTTP traces endpoint
    #[arg(long, env = "SHELF_CLI_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Log calls to stderr
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every book, newest first
    List,
    /// Show one book
    Get { id: i32 },
    /// Add a book
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long = "year")]
        year_published: Option<i32>,
        /// Defaults to 1 on the server
        #[arg(long = "copies")]
        available_copies: Option<i32>,
    },
    /// Change the given fields of a book
    Update {
        id: i32,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long = "year")]
        year_published: Option<i32>,
        #[arg(long = "copies")]
        available_copies: Option<i32>,
    },
    /// Delete a book after confirmation
    Delete {
        id: i32,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Case-insensitive search on title or author
    Search { query: String },
}

/// Asks on stderr, reads the answer from stdin.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        if io::stderr().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn telemetry_settings(cli: &Cli) -> TelemetrySettings {
    let mut settings = TelemetrySettings {
        service_name: shelf_client::CLIENT_TRACER_NAME.to_string(),
        log_filter: if cli.verbose { "debug" } else { "off" }.to_string(),
        traces: TraceExporter::None,
        ..TelemetrySettings::default()
    };
    if let Some(endpoint) = &cli.otlp_endpoint {
        settings.traces = TraceExporter::Otlp;
        settings.otlp_traces_endpoint = endpoint.clone();
    }
    settings
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = shelf_telemetry::init(&telemetry_settings(&cli), "cli")
        .context("failed to initialize telemetry")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = runtime.block_on(run(cli));
    drop(runtime);

    telemetry.shutdown();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut client = BooksClient::new(&cli.base_url)?;
    if let Some(token) = cli.token {
        client = client.with_token(token);
    }

    match cli.command {
        Command::List => print(&client.get_all().await?),
        Command::Get { id } => print(&client.get_by_id(id).await?),
        Command::Create {
            title,
            author,
            genre,
            year_published,
            available_copies,
        } => {
            let request = CreateBookRequest {
                title: Some(title),
                author: Some(author),
                genre,
                year_published,
                available_copies,
            };
            print(&client.create(&request).await?)
        }
        Command::Update {
            id,
            title,
            author,
            genre,
            year_published,
            available_copies,
        } => {
            let request = UpdateBookRequest {
                title,
                author,
                genre,
                year_published,
                available_copies,
            };
            print(&client.update(id, &request).await?)
        }
        Command::Delete { id, yes } => {
            if !yes && !StdinConfirm.confirm(DELETE_PROMPT) {
                eprintln!("not deleted");
                return Ok(());
            }
            print(&client.delete(id).await?)
        }
        Command::Search { query } => print(&client.search(&query).await?),
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render response")?;
    println!("{rendered}");
    Ok(())
}
