use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded access token payload attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity provider user id.
    #[serde(default)]
    pub sub: Option<String>,
    pub iss: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    /// Everything else the provider put in the token (roles, scopes, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Best human-readable identifier for logs.
    pub fn principal(&self) -> &str {
        self.preferred_username
            .as_deref()
            .or(self.sub.as_deref())
            .unwrap_or("unknown")
    }
}
