use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use livecast_store::CommentStore;
use livecast_types::models::NormalizedComment;

use crate::error::{Result, SourceError};
use crate::normalize::{normalize_batch, truncate};

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v21.0";
pub const DEFAULT_FIELDS: &str = "from,message,created_time";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to fetch comments for one live video.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub base_url: String,
    pub api_version: String,
    pub resource_id: String,
    pub access_token: String,
    pub fields: String,
    /// Sent as `limit` when set; otherwise the upstream page size applies.
    pub page_limit: Option<u32>,
    pub timeout: Duration,
}

impl GraphConfig {
    pub fn new(resource_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_version: DEFAULT_API_VERSION.into(),
            resource_id: resource_id.into(),
            access_token: access_token.into(),
            fields: DEFAULT_FIELDS.into(),
            page_limit: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Result of one refresh cycle, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The batch was replaced with this many comments
    Replaced(usize),
    /// Upstream had nothing usable; the batch was left alone
    Empty,
    /// Fetch failed; the batch was left alone
    Failed,
}

impl RefreshOutcome {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed)
    }
}

#[derive(Debug, Deserialize)]
struct GraphEnvelope {
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<GraphApiError>,
}

#[derive(Debug, Deserialize)]
struct GraphApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// Comment source backed by the Graph API comments edge.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    config: GraphConfig,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Comments endpoint without query parameters.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}/comments",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            self.config.resource_id
        )
    }

    /// Full request URL with the token masked, for logs.
    pub fn redacted_url(&self) -> String {
        format!(
            "{}?fields={}&access_token=TOKEN_HIDDEN",
            self.endpoint(),
            self.config.fields
        )
    }

    /// Fetch and normalize one page of comments.
    pub async fn fetch(&self) -> Result<Vec<NormalizedComment>> {
        debug!("GET {}", self.redacted_url());

        let mut query: Vec<(&str, String)> = vec![
            ("fields", self.config.fields.clone()),
            ("access_token", self.config.access_token.clone()),
        ];
        if let Some(limit) = self.config.page_limit {
            query.push(("limit", limit.to_string()));
        }

        let resp = self.http.get(self.endpoint()).query(&query).send().await?;
        let status = resp.status();
        debug!("Upstream responded {}", status);

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200).to_string(),
            });
        }

        let envelope: GraphEnvelope = serde_json::from_str(&body)?;
        if let Some(err) = envelope.error {
            return Err(SourceError::Api {
                message: err.message.unwrap_or_else(|| "unknown error".into()),
                code: err.code,
            });
        }

        let records = envelope.data.unwrap_or_default();
        let comments = normalize_batch(&records, Utc::now());
        if comments.len() < records.len() {
            debug!(
                "Dropped {} of {} records without a message",
                records.len() - comments.len(),
                records.len()
            );
        }
        Ok(comments)
    }

    /// Fetch and, if anything usable came back, replace the store's batch.
    ///
    /// Failures are logged here and reported only through the outcome; the
    /// previous batch stays in place until a later refresh succeeds.
    pub async fn refresh(&self, store: &CommentStore) -> RefreshOutcome {
        info!("Fetching comments for {}", self.config.resource_id);

        match self.fetch().await {
            Ok(comments) if comments.is_empty() => {
                info!("No comments found, keeping {} cached", store.len());
                RefreshOutcome::Empty
            }
            Ok(comments) => {
                let count = comments.len();
                store.replace(comments);
                store.mark_fetched(Utc::now());
                info!("Stored {} comments", count);
                RefreshOutcome::Replaced(count)
            }
            Err(e) => {
                warn!("Comment refresh failed: {}", e);
                RefreshOutcome::Failed
            }
        }
    }
}
