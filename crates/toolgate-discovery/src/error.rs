use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("fetch from '{source}' failed: {detail}")]
    Fetch { source: String, detail: String },
    #[error("registry error: {0}")]
    Store(#[from] toolgate_persist::StoreError),
}
