//! Router builder for the HTTP server

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use shelf_authz::TokenVerifier;
use shelf_db::PgPool;
use shelf_kernel::ModuleRegistry;
use shelf_telemetry::Instrumentation;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{require_auth, trace_context},
};

/// Builder for constructing the main HTTP router
///
/// Routes and module mounts come first; every `with_*` layer call wraps what
/// has been added so far, so later layers run earlier on the request path.
pub struct RouterBuilder {
    router: Router,
    auth: Option<TokenVerifier>,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            auth: None,
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Require a verified bearer token on every module mounted afterwards
    pub fn with_auth(mut self, verifier: TokenVerifier) -> Self {
        self.auth = Some(verifier);
        self
    }

    /// Mount a module's router under `/{module_name}`
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let module_router = match &self.auth {
            Some(verifier) => {
                module_router.route_layer(from_fn_with_state(verifier.clone(), require_auth))
            }
            None => module_router,
        };

        let path = format!("/{}", module_name);
        self.router = self.router.nest(&path, module_router);
        self
    }

    /// Unauthenticated `GET /health` backed by a database ping
    pub fn with_health(mut self, pool: PgPool, service: &str) -> Self {
        let state = HealthState {
            pool,
            service: Arc::from(service),
        };
        self.router = self
            .router
            .route("/health", get(health_check).with_state(state));
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Open an OpenTelemetry server span per request under the caller's context
    pub fn with_trace_context(mut self, instrumentation: Instrumentation) -> Self {
        self.router = self
            .router
            .layer(from_fn_with_state(instrumentation, trace_context));
        self
    }

    /// Allow the configured origin, with credentials
    pub fn with_cors(mut self, origin: &str) -> anyhow::Result<Self> {
        let origin = origin
            .parse::<HeaderValue>()
            .with_context(|| format!("invalid CORS origin '{}'", origin))?;

        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    HeaderName::from_static("traceparent"),
                    HeaderName::from_static("tracestate"),
                ]),
        );
        Ok(self)
    }

    /// Add request ID middleware
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Add timeout middleware
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Serve the merged OpenAPI document and Swagger UI
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = merged_openapi(registry);

        let openapi_obj: utoipa::openapi::OpenApi =
            match serde_json::from_value(openapi_spec.clone()) {
                Ok(obj) => obj,
                Err(err) => {
                    tracing::warn!(error = %err, "merged OpenAPI document is not valid, serving a stub");
                    utoipa::openapi::OpenApiBuilder::new()
                        .info(
                            utoipa::openapi::InfoBuilder::new()
                                .title("Books API")
                                .version("1.0.0")
                                .build(),
                        )
                        .build()
                }
            };

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { Json(openapi_spec.clone()) }),
        );

        self
    }

    /// Reject requests that fall through every route with the error body
    pub fn with_fallback(mut self) -> Self {
        self.router = self.router.fallback(route_not_found);
        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge every module's OpenAPI fragment under its mount point
pub fn merged_openapi(registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_spec = json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Books API",
            "version": "1.0.0",
            "description": "Traced books CRUD service"
        },
        "paths": {},
        "components": {
            "schemas": {},
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            }
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = json!({
        "type": "object",
        "properties": {
            "error": { "type": "string" },
            "details": { "type": "string" }
        },
        "required": ["error"]
    });

    openapi_spec["paths"]["/health"] = json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": { "description": "Database reachable" },
                "503": { "description": "Database unreachable" }
            }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|paths| paths.as_object()) {
            for (path, path_item) in paths {
                let prefixed_path = format!("/{}{}", module.name(), path.trim_end_matches('/'));
                openapi_spec["paths"][prefixed_path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|components| components.get("schemas"))
            .and_then(|schemas| schemas.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}

#[derive(Clone)]
struct HealthState {
    pool: PgPool,
    service: Arc<str>,
}

async fn health_check(State(state): State<HealthState>) -> Response {
    match shelf_db::ping(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "service": &*state.service,
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(operation = "HEALTH_CHECK", error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected",
                })),
            )
                .into_response()
        }
    }
}

async fn route_not_found(request: Request) -> AppError {
    tracing::debug!(method = %request.method(), path = %request.uri().path(), "no route matched");
    AppError::not_found("Route not found")
}

/// UUIDv7 request ids, sortable by creation time
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let request_id = Uuid::now_v7().to_string().parse::<HeaderValue>().ok()?;
        Some(RequestId::new(request_id))
    }
}
