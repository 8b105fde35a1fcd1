use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use shelf_authz::{bearer_token, TokenVerifier};

use crate::error::AppError;

pub const NO_TOKEN: &str = "Unauthorized: No token provided";
pub const INVALID_TOKEN: &str = "Unauthorized: Invalid or expired token";

/// Reject requests without a valid bearer token.
///
/// On success the decoded [`shelf_authz::Claims`] are inserted into the
/// request extensions for handlers to pick up.
pub async fn require_auth(
    State(verifier): State<TokenVerifier>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned)
        .ok_or_else(|| AppError::unauthorized(NO_TOKEN, None))?;

    let claims = verifier.verify(&token).await.map_err(|err| {
        tracing::warn!(
            operation = "AUTH",
            path = %request.uri().path(),
            error = %err,
            "token verification failed"
        );
        AppError::unauthorized(INVALID_TOKEN, Some(err.to_string()))
    })?;

    tracing::debug!(operation = "AUTH", principal = %claims.principal(), "token verified");
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
