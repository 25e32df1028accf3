//! Storage layer: connection pooling, the relational tool registry, and
//! vector/lexical search over the catalog.

pub mod error;
pub mod pool;
pub mod sqlite_store;
pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres_store;

pub use error::StoreError;
pub use pool::{connect, PoolConfig};
pub use sqlite_store::{content_hash, SqliteStore};
pub use traits::{ListFilter, ScoredTool, ToolRegistry, VectorStore};

#[cfg(feature = "postgres")]
pub use postgres_store::PostgresStore;
