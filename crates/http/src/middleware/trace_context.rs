use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use opentelemetry::{
    global,
    trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer},
    KeyValue,
};
use opentelemetry_http::HeaderExtractor;
use shelf_telemetry::Instrumentation;

/// Continue the caller's trace for the duration of the request.
///
/// Extracts `traceparent`/`tracestate` with the global propagator, opens a
/// server span `"{METHOD} {route}"` under the remote parent, and polls the
/// rest of the stack inside that context so storage spans nest beneath it.
pub async fn trace_context(
    State(instrumentation): State<Instrumentation>,
    request: Request,
    next: Next,
) -> Response {
    let parent_cx = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let tracer = instrumentation.tracer();
    let span = tracer
        .span_builder(format!("{method} {route}"))
        .with_kind(SpanKind::Server)
        .with_attributes(vec![
            KeyValue::new("http.request.method", method),
            KeyValue::new("url.path", path),
            KeyValue::new("http.route", route),
        ])
        .start_with_context(tracer, &parent_cx);
    let cx = parent_cx.with_span(span);

    let response = next.run(request).with_context(cx.clone()).await;

    let status = response.status();
    let span = cx.span();
    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(status.as_u16()),
    ));
    if status.is_server_error() {
        span.set_status(Status::error(format!("HTTP {}", status.as_u16())));
    }
    span.end();

    response
}
