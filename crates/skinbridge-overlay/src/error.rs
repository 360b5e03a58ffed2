use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid tree snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
