pub mod client;
pub mod error;
pub mod normalize;

pub use client::{GraphClient, GraphConfig, RefreshOutcome};
pub use error::SourceError;
