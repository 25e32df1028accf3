//! MCP discovery service: reconciles upstream tool catalogs into the local
//! registry.

pub mod config;
pub mod error;
pub mod fetch;
pub mod reconcile;
pub mod service;

pub use config::{DiscoveryConfig, SourceConfig, SourceKind};
pub use error::DiscoveryError;
pub use reconcile::SyncSummary;
pub use service::{DiscoveryService, SyncReport};
