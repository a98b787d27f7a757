use thiserror::Error;

/// Why a fetch from the comment source did not produce records.
///
/// None of these are fatal: the refresh loop logs them and keeps the
/// previous batch until the next tick.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection, TLS, or timeout failure reaching the upstream.
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success HTTP status.
    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Upstream answered 2xx but the payload is an error envelope.
    #[error("Upstream API error: {message}")]
    Api { message: String, code: Option<i64> },

    /// Payload was not the JSON shape we expect.
    #[error("Malformed upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
