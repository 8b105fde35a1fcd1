use thiserror::Error;

/// Failure of a call to the books API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or an undecodable response body.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status and an error body.
    #[error("{status}: {error}")]
    Api {
        status: u16,
        error: String,
        details: Option<String>,
    },

    #[error("invalid base url '{0}'")]
    InvalidBaseUrl(String),
}

impl ClientError {
    /// HTTP status of an API error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(err) => err.status().map(|status| status.as_u16()),
            ClientError::InvalidBaseUrl(_) => None,
        }
    }
}
