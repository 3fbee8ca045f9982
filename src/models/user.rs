use serde::{Deserialize, Serialize};

/// Claims of a bearer token issued by the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize,
}

/// Verified identity of the caller, inserted into request extensions by the
/// auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: String,
    pub email: Option<String>,
}

impl From<Claims> for CallerIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email.map(|e| e.to_lowercase()),
        }
    }
}
