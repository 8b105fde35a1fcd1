use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use opentelemetry::trace::Status;
use opentelemetry_sdk::{
    metrics::{
        data::{AggregatedMetrics, MetricData},
        InMemoryMetricExporter, PeriodicReader, SdkMeterProvider,
    },
    trace::{InMemorySpanExporter, SdkTracerProvider, SpanData},
};
use serde_json::{json, Value};
use shelf_app::books::{repository::MemoryBookRepository, BooksModule};
use shelf_authz::{
    testing::{claims_for, sign, test_jwk_set},
    CachePolicy, KeyCache, StaticKeySource, SystemClock, TokenVerifier,
};
use shelf_http::ServerDeps;
use shelf_kernel::{settings::Settings, ModuleRegistry};
use shelf_telemetry::Instrumentation;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    repository: Arc<MemoryBookRepository>,
    exporter: InMemorySpanExporter,
    metrics: InMemoryMetricExporter,
    token: String,
    meter_provider: SdkMeterProvider,
    _tracer_provider: SdkTracerProvider,
}

impl TestApp {
    fn new() -> Self {
        let exporter = InMemorySpanExporter::default();
        let tracer_provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let metrics = InMemoryMetricExporter::default();
        let meter_provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(metrics.clone()).build())
            .build();
        let instrumentation = Instrumentation::from_providers(&tracer_provider, &meter_provider);

        let repository = Arc::new(MemoryBookRepository::new());
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(BooksModule::with_repository(
            repository.clone(),
            instrumentation.clone(),
        )));

        let mut settings = Settings::default();
        settings.database.host = "127.0.0.1".to_string();
        settings.database.port = 1;
        settings.database.connect_timeout_ms = 500;

        let issuer = settings.auth.issuer();
        let keys = KeyCache::new(
            Arc::new(StaticKeySource::new(test_jwk_set())),
            Arc::new(SystemClock),
            CachePolicy::default(),
        );

        let router = shelf_http::build_router(
            &registry,
            &settings,
            ServerDeps {
                pool: shelf_db::lazy_pool(&settings.database),
                instrumentation,
                verifier: TokenVerifier::new(keys, &issuer),
            },
        )
        .unwrap();

        Self {
            router,
            repository,
            exporter,
            metrics,
            token: sign(&claims_for(&issuer)),
            meter_provider,
            _tracer_provider: tracer_provider,
        }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        authorized: bool,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if authorized {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, true).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), true).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body), true).await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None, true).await
    }

    fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }

    /// `(operation, status, count)` from the operation counter, sorted.
    fn operation_counts(&self) -> Vec<(String, String, u64)> {
        self.meter_provider.force_flush().unwrap();
        let exported = self.metrics.get_finished_metrics().unwrap();
        let Some(metric) = exported
            .last()
            .into_iter()
            .flat_map(|resource| resource.scope_metrics())
            .flat_map(|scope| scope.metrics())
            .find(|metric| metric.name() == "books.operations")
        else {
            return Vec::new();
        };

        let AggregatedMetrics::U64(MetricData::Sum(sum)) = metric.data() else {
            panic!("books.operations is not a u64 sum");
        };
        let mut counts: Vec<_> = sum
            .data_points()
            .map(|point| {
                let attributes: Vec<_> = point.attributes().collect();
                (
                    label(&attributes, "operation"),
                    label(&attributes, "status"),
                    point.value(),
                )
            })
            .collect();
        counts.sort();
        counts
    }

    fn db_spans(&self) -> Vec<SpanData> {
        self.spans()
            .into_iter()
            .filter(|span| span.name.starts_with("db."))
            .collect()
    }
}

fn label(attributes: &[&opentelemetry::KeyValue], key: &str) -> String {
    attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
        .unwrap_or_default()
}

fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

#[tokio::test]
async fn dune_lifecycle() {
    let app = TestApp::new();

    let (status, created) = app
        .post("/books", json!({ "title": "Dune", "author": "Herbert" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Book created successfully");
    assert_eq!(created["book"]["available_copies"], 1);
    let id = created["book"]["id"].as_i64().unwrap();

    let (status, fetched) = app.get(&format!("/books/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created["book"]);

    let (status, updated) = app
        .put(&format!("/books/{id}"), json!({ "available_copies": 5 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Book updated successfully");
    assert_eq!(updated["book"]["available_copies"], 5);
    assert_eq!(updated["book"]["title"], "Dune");
    assert_eq!(updated["book"]["author"], "Herbert");

    let (status, deleted) = app.delete(&format!("/books/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Book deleted successfully");
    assert_eq!(deleted["book"]["available_copies"], 5);

    let (status, body) = app.get(&format!("/books/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Book not found" }));
}

#[tokio::test]
async fn create_then_get_returns_every_supplied_field() {
    let app = TestApp::new();
    let (_, created) = app
        .post(
            "/books",
            json!({
                "title": "The Left Hand of Darkness",
                "author": "Le Guin",
                "genre": "Science Fiction",
                "year_published": 1969,
                "available_copies": 3
            }),
        )
        .await;
    let id = created["book"]["id"].as_i64().unwrap();

    let (_, book) = app.get(&format!("/books/{id}")).await;
    assert_eq!(book["title"], "The Left Hand of Darkness");
    assert_eq!(book["author"], "Le Guin");
    assert_eq!(book["genre"], "Science Fiction");
    assert_eq!(book["year_published"], 1969);
    assert_eq!(book["available_copies"], 3);
}

#[tokio::test]
async fn non_numeric_id_is_a_bad_request() {
    let app = TestApp::new();

    let expected = json!({ "error": "Invalid book ID" });
    assert_eq!(app.get("/books/abc").await, (StatusCode::BAD_REQUEST, expected.clone()));
    assert_eq!(
        app.put("/books/abc", json!({ "title": "X" })).await,
        (StatusCode::BAD_REQUEST, expected.clone())
    );
    assert_eq!(app.delete("/books/abc").await, (StatusCode::BAD_REQUEST, expected));
    assert!(app.db_spans().is_empty());
}

#[tokio::test]
async fn missing_title_or_author_is_rejected_without_insert() {
    let app = TestApp::new();

    for body in [
        json!({ "author": "Herbert" }),
        json!({ "title": "Dune" }),
        json!({ "title": "", "author": "Herbert" }),
    ] {
        let (status, error) = app.post("/books", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "Title and author are required");
    }

    assert!(app.repository.is_empty().await);
    assert!(app.db_spans().is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new();

    let (status, error) = app.post("/books", json!("just a title")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "Invalid request body");
    assert!(error["details"].is_string());
}

#[tokio::test]
async fn partial_update_keeps_unsupplied_fields() {
    let app = TestApp::new();
    let (_, created) = app
        .post(
            "/books",
            json!({ "title": "Emma", "author": "Austen", "genre": "Novel", "year_published": 1815 }),
        )
        .await;
    let id = created["book"]["id"].as_i64().unwrap();

    let (status, updated) = app
        .put(&format!("/books/{id}"), json!({ "genre": "Romance" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["book"]["genre"], "Romance");
    assert_eq!(updated["book"]["title"], "Emma");
    assert_eq!(updated["book"]["year_published"], 1815);
    assert_eq!(updated["book"]["available_copies"], 1);
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let app = TestApp::new();

    assert_eq!(app.get("/books/404").await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        app.put("/books/404", json!({ "title": "X" })).await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.delete("/books/404").await.0, StatusCode::NOT_FOUND);

    // not-found is a successful storage call
    for span in app.db_spans() {
        assert_eq!(span.status, Status::Ok);
    }
}

#[tokio::test]
async fn list_is_newest_first_with_count() {
    let app = TestApp::new();
    app.post("/books", json!({ "title": "A", "author": "One" })).await;
    app.post("/books", json!({ "title": "B", "author": "Two" })).await;

    let (status, list) = app.get("/books").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 2);
    assert_eq!(list["books"][0]["title"], "B");
    assert_eq!(list["books"][1]["title"], "A");
}

#[tokio::test]
async fn search_is_case_insensitive_substring() {
    let app = TestApp::new();
    app.post("/books", json!({ "title": "The Hobbit", "author": "Tolkien" }))
        .await;
    app.post("/books", json!({ "title": "Dune", "author": "Herbert" }))
        .await;

    for query in ["hobbit", "HOBBIT", "Hob"] {
        let (status, results) = app.get(&format!("/books/search/{query}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results["count"], 1);
        assert_eq!(results["query"], query);
        assert_eq!(results["books"][0]["title"], "The Hobbit");
    }

    let (status, empty) = app.get("/books/search/asimov").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!({ "count": 0, "query": "asimov", "books": [] }));
}

#[tokio::test]
async fn routes_without_token_are_unauthorized_and_untraced() {
    let app = TestApp::new();

    for (method, uri) in [
        (Method::GET, "/books"),
        (Method::POST, "/books"),
        (Method::GET, "/books/1"),
        (Method::PUT, "/books/1"),
        (Method::DELETE, "/books/1"),
        (Method::GET, "/books/search/dune"),
    ] {
        let (status, body) = app.request(method, uri, None, false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "Unauthorized: No token provided");
    }

    assert!(app.db_spans().is_empty());
}

#[tokio::test]
async fn token_from_another_issuer_is_unauthorized() {
    let app = TestApp::new();
    let foreign = sign(&claims_for("https://elsewhere.example.com/realms/books-realm"));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/books")
                .header(header::AUTHORIZATION, format!("Bearer {foreign}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Unauthorized: Invalid or expired token");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn storage_failure_is_reported_and_traced() {
    let app = TestApp::new();
    app.repository.fail_with(Some("connection refused")).await;

    let (status, body) = app.get("/books").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Failed to fetch books", "details": "connection refused" })
    );

    let spans = app.db_spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "db.select.books.all");
    assert_eq!(
        spans[0].status,
        Status::error("connection refused".to_string())
    );
    assert!(spans[0]
        .events
        .events
        .iter()
        .any(|event| event.name == "exception"));

    let server = app
        .spans()
        .into_iter()
        .find(|span| span.name == "GET /books")
        .unwrap();
    assert!(matches!(server.status, Status::Error { .. }));
}

#[tokio::test]
async fn operations_are_counted_by_outcome() {
    let app = TestApp::new();

    let (status, _) = app
        .post("/books", json!({ "title": "Dune", "author": "Frank Herbert" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.get("/books/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    app.repository.fail_with(Some("connection refused")).await;
    let (status, _) = app
        .post("/books", json!({ "title": "Emma", "author": "Jane Austen" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(
        app.operation_counts(),
        vec![
            ("create".to_string(), "error".to_string(), 1),
            ("create".to_string(), "success".to_string(), 1),
            ("read_one".to_string(), "not_found".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn storage_spans_nest_under_the_request_span() {
    let app = TestApp::new();
    let (_, created) = app
        .post("/books", json!({ "title": "Dune", "author": "Herbert" }))
        .await;
    let id = created["book"]["id"].as_i64().unwrap();
    app.get(&format!("/books/{id}")).await;

    let spans = app.spans();
    let insert = spans.iter().find(|s| s.name == "db.insert.books").unwrap();
    let server = spans.iter().find(|s| s.name == "POST /books").unwrap();
    assert_eq!(insert.parent_span_id, server.span_context.span_id());
    assert_eq!(
        insert.span_context.trace_id(),
        server.span_context.trace_id()
    );
    assert_eq!(attribute(insert, "db.operation").unwrap().as_str(), "INSERT");
    assert_eq!(attribute(insert, "db.table").unwrap().as_str(), "books");
    assert_eq!(attribute(insert, "book.title").unwrap().as_str(), "Dune");

    let by_id = spans
        .iter()
        .find(|s| s.name == "db.select.books.by_id")
        .unwrap();
    assert_eq!(
        attribute(by_id, "book.id"),
        Some(&opentelemetry::Value::I64(id))
    );
    assert!(spans.iter().any(|s| s.name == "GET /books/{id}"));
}

#[tokio::test]
async fn health_is_public_and_reports_database_state() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health", None, false).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "status": "unhealthy", "database": "disconnected" }));
}

#[tokio::test]
async fn openapi_document_lists_book_routes() {
    let app = TestApp::new();

    let (status, doc) = app.request(Method::GET, "/docs/openapi.json", None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/books"]["post"].is_object());
    assert!(doc["paths"]["/books/{id}"]["delete"].is_object());
    assert!(doc["paths"]["/books/search/{query}"]["get"].is_object());
}
