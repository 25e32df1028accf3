//! HTTP and JSON-RPC surface of the tool registry and discovery gateway:
//! request/response types and handlers over `AppState`, shared between the
//! axum router (`routes`) and the stdio transport loop that
//! `toolgate-server` drives directly against `mcp`/`rpc`.

pub mod auth;
pub mod error;
pub mod mcp;
pub mod middleware;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod state;

pub use auth::AdminAuth;
pub use error::{ApiError, ApiResult};
pub use routes::api_router;
pub use rpc::{RpcRequest, RpcResponse};
pub use server::ServerConfig;
pub use state::AppState;
