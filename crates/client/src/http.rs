use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::{
    global::{self, BoxedTracer},
    Context, KeyValue,
};
use opentelemetry_http::HeaderInjector;
use reqwest::{header::HeaderMap, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize};
use shelf_app::books::models::{
    Book, BookList, BookMessage, CreateBookRequest, SearchResults, UpdateBookRequest,
};
use shelf_telemetry::{instrumentation::scope, trace_call};

use crate::{api::BooksApi, error::ClientError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";
pub const CLIENT_TRACER_NAME: &str = "books-frontend";

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// HTTP implementation of [`BooksApi`].
///
/// Every call runs in a client span (`books.getAll`, `books.create`, ...)
/// and carries that span's context in the `traceparent` header, so the
/// server's spans join the same trace.
#[derive(Clone)]
pub struct BooksClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    tracer: Arc<BoxedTracer>,
}

impl std::fmt::Debug for BooksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BooksClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl BooksClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed =
            Url::parse(base_url).map_err(|_| ClientError::InvalidBaseUrl(base_url.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: parsed,
            token: None,
            tracer: Arc::new(global::tracer_with_scope(scope(CLIENT_TRACER_NAME))),
        })
    }

    /// Send `Authorization: Bearer <token>` with every call.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_tracer(mut self, tracer: BoxedTracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send with the current trace context injected; map non-2xx to
    /// [`ClientError::Api`].
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let mut headers = HeaderMap::new();
        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&Context::current(), &mut HeaderInjector(&mut headers))
        });

        let mut request = request.headers(headers);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
            error: status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            details: None,
        });
        tracing::warn!(
            status = status.as_u16(),
            error = %body.error,
            details = ?body.details,
            "books API call failed"
        );
        Err(ClientError::Api {
            status: status.as_u16(),
            error: body.error,
            details: body.details,
        })
    }
}

#[async_trait]
impl BooksApi for BooksClient {
    async fn get_all(&self) -> Result<Vec<Book>, ClientError> {
        let url = self.url(&["books"])?;
        let attributes = vec![
            KeyValue::new("http.method", "GET"),
            KeyValue::new("http.url", url.to_string()),
        ];

        trace_call(&self.tracer, "books.getAll", attributes, async move {
            let list: BookList = self.send(self.http.get(url)).await?;
            Ok(list.books)
        })
        .await
    }

    async fn get_by_id(&self, id: i32) -> Result<Book, ClientError> {
        let url = self.url(&["books", &id.to_string()])?;
        let attributes = vec![
            KeyValue::new("http.method", "GET"),
            KeyValue::new("book.id", i64::from(id)),
        ];

        trace_call(
            &self.tracer,
            "books.getById",
            attributes,
            self.send(self.http.get(url)),
        )
        .await
    }

    async fn create(&self, book: &CreateBookRequest) -> Result<BookMessage, ClientError> {
        let url = self.url(&["books"])?;
        let attributes = vec![
            KeyValue::new("http.method", "POST"),
            KeyValue::new("book.title", book.title.clone().unwrap_or_default()),
            KeyValue::new("book.author", book.author.clone().unwrap_or_default()),
        ];

        trace_call(
            &self.tracer,
            "books.create",
            attributes,
            self.send(self.http.post(url).json(book)),
        )
        .await
    }

    async fn update(&self, id: i32, book: &UpdateBookRequest) -> Result<BookMessage, ClientError> {
        let url = self.url(&["books", &id.to_string()])?;
        let attributes = vec![
            KeyValue::new("http.method", "PUT"),
            KeyValue::new("book.id", i64::from(id)),
        ];

        trace_call(
            &self.tracer,
            "books.update",
            attributes,
            self.send(self.http.put(url).json(book)),
        )
        .await
    }

    async fn delete(&self, id: i32) -> Result<BookMessage, ClientError> {
        let url = self.url(&["books", &id.to_string()])?;
        let attributes = vec![
            KeyValue::new("http.method", "DELETE"),
            KeyValue::new("book.id", i64::from(id)),
        ];

        trace_call(
            &self.tracer,
            "books.delete",
            attributes,
            self.send(self.http.delete(url)),
        )
        .await
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>, ClientError> {
        let url = self.url(&["books", "search", query])?;
        let attributes = vec![
            KeyValue::new("http.method", "GET"),
            KeyValue::new("search.query", query.to_string()),
        ];

        trace_call(&self.tracer, "books.search", attributes, async move {
            let results: SearchResults = self.send(self.http.get(url)).await?;
            Ok(results.books)
        })
        .await
    }
}
