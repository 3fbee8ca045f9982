use serde::{Deserialize, Serialize};

/// Venue an invite points at. Read-only from the lifecycle's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cafe {
    pub id: String,
    pub name: String,
    pub address: String,
    pub city: String,
}
