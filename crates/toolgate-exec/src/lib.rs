//! Execution router and output summarizer.

pub mod backends;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod mcp_rpc;
pub mod python_registry;
pub mod router;
pub mod summarizer;

pub use config::ExecutorConfig;
pub use error::ExecError;
pub use python_registry::{PythonCallableRegistry, RegisteredCallable};
pub use router::{CallOutcome, ExecutionRouter};
pub use summarizer::OutputSummarizer;
