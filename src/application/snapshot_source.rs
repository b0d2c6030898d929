// Snapshot source trait - bootstrap/reload documents and the staleness marker
use crate::infrastructure::config::StationSnapshot;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("snapshot request returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable snapshot document: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the full configuration and initial series document
    async fn fetch_snapshot(&self) -> Result<StationSnapshot, SnapshotError>;

    /// Fetch the monotonically increasing "last good sample" marker (epoch seconds)
    async fn fetch_last_good_stamp(&self) -> Result<i64, SnapshotError>;
}
