use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author shown when the upstream record carries no usable name.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// A comment in the canonical shape pushed to viewers.
///
/// `message` is never empty and `author_name` and `id` always carry a
/// value; records that cannot satisfy this are dropped by the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedComment {
    pub author_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub id: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Last time a fetch replaced the batch. Informational only.
    pub last_fetch: Option<DateTime<Utc>>,
    pub viewers: usize,
}

impl HealthResponse {
    pub fn ok(last_fetch: Option<DateTime<Utc>>, viewers: usize) -> Self {
        Self {
            status: "OK".into(),
            timestamp: Utc::now(),
            last_fetch,
            viewers,
        }
    }
}
