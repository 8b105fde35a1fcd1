use thiserror::Error;

/// Failure to obtain the remote key set.
#[derive(Error, Debug)]
pub enum KeySourceError {
    #[error("failed to fetch key set: {0}")]
    Http(#[from] reqwest::Error),
}

/// Reasons a request is refused with 401.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token header has no key id")]
    MissingKeyId,

    #[error("no signing key found for kid '{0}'")]
    KeyNotFound(String),

    #[error("signing key for kid '{kid}' is unusable: {source}")]
    InvalidKey {
        kid: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("key set refresh rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    KeySource(#[from] KeySourceError),

    #[error(transparent)]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}
