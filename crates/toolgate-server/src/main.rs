//! Composition root for the toolgate tool registry and discovery gateway.
//!
//! Builds every component exactly once — connection pool, embedding client,
//! retrieval engine, execution router, discovery service — and wires them
//! into `AppState`. Serves over HTTP by default; `--stdio` (or
//! `TOOLGATE_TRANSPORT=stdio`) instead runs a newline-delimited JSON-RPC
//! loop over stdin/stdout for agents that speak MCP directly.

use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use toolgate_api::rpc::{self, RpcRequest};
use toolgate_api::{server, AppState};
use toolgate_core::telemetry::{MetricsRecorder, NoopRecorder, Recorder};
use toolgate_discovery::{DiscoveryConfig, DiscoveryService};
use toolgate_embed::{CachedEmbeddingClient, EmbeddingClient, EmbeddingConfig, HttpEmbeddingClient};
use toolgate_exec::{ExecutionRouter, ExecutorConfig, PythonCallableRegistry};
use toolgate_persist::{connect, PoolConfig, SqliteStore, ToolRegistry, VectorStore};
use toolgate_retrieval::{RetrievalConfig, RetrievalEngine};

#[derive(Debug, Parser)]
#[command(name = "toolgate-server", about = "Tool registry and discovery gateway")]
struct Args {
    /// Run a newline-delimited JSON-RPC loop over stdin/stdout instead of
    /// serving HTTP. Equivalent to setting TOOLGATE_TRANSPORT=stdio.
    #[arg(long)]
    stdio: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let stdio = args.stdio || std::env::var("TOOLGATE_TRANSPORT").as_deref() == Ok("stdio");

    server::init_tracing();

    let embedding_config = EmbeddingConfig::from_env()?;
    let dimension = embedding_config.dimension;

    let pool_config = PoolConfig::from_env(dimension)?;
    let pool = connect(&pool_config).await?;
    let store = Arc::new(SqliteStore::new(pool, dimension));
    let registry: Arc<dyn ToolRegistry> = store.clone();
    let vector_store: Arc<dyn VectorStore> = store.clone();

    let http = reqwest::Client::builder()
        .timeout(embedding_config.timeout)
        .build()?;

    let cache_capacity = embedding_config.cache_capacity;
    let raw_embedder = HttpEmbeddingClient::new(embedding_config)?;
    let embedder: Arc<dyn EmbeddingClient> =
        Arc::new(CachedEmbeddingClient::new(Arc::new(raw_embedder), cache_capacity));

    let retrieval_config = RetrievalConfig::from_env();
    let retrieval = Arc::new(RetrievalEngine::new(
        embedder.clone(),
        vector_store.clone(),
        retrieval_config,
    ));

    let executor_config = ExecutorConfig::from_env();
    let summarizer_enabled = std::env::var("TOOLGATE_SUMMARIZER_ENABLED")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true);
    // Deployments that expose PYTHON_CALLABLE tools register their
    // callables here before the executor is built; none are registered by
    // default, so PYTHON_CALLABLE tools fail with BackendUnavailable until
    // a deployment-specific build wires some in.
    let python_registry = PythonCallableRegistry::new();
    let executor = Arc::new(ExecutionRouter::new(
        registry.clone(),
        http.clone(),
        executor_config,
        python_registry,
        summarizer_enabled,
    ));

    let discovery_config = DiscoveryConfig::from_env();
    let discovery = if discovery_config.sources.is_empty() {
        None
    } else {
        Some(Arc::new(DiscoveryService::new(
            registry.clone(),
            vector_store.clone(),
            embedder.clone(),
            http.clone(),
            discovery_config,
        )))
    };

    let admin_auth = match toolgate_api::AdminAuth::from_env() {
        Ok(auth) => Some(Arc::new(auth)),
        Err(e) => {
            tracing::warn!(error = %e, "admin routes disabled");
            None
        }
    };

    let metrics_enabled = std::env::var("TOOLGATE_METRICS_ENABLED")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };
    let recorder: Arc<dyn Recorder> = if metrics_handle.is_some() {
        Arc::new(MetricsRecorder)
    } else {
        Arc::new(NoopRecorder)
    };

    let state = AppState::new(
        registry,
        vector_store,
        embedder,
        retrieval,
        executor,
        discovery.clone(),
        admin_auth,
        recorder,
        metrics_handle,
    );

    if let Some(discovery) = &discovery {
        if std::env::var("TOOLGATE_DISCOVERY_SYNC_ON_STARTUP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
        {
            let report = discovery.sync_all().await;
            tracing::info!(sources = report.summaries.len(), "initial discovery sync complete");
        }
    }

    if stdio {
        run_stdio(state).await
    } else {
        let config = server::ServerConfig::from_env();
        let router = server::build_router(state, &config);
        server::run(router, config.addr).await
    }
}

/// Newline-delimited JSON-RPC 2.0 loop: one request per line on stdin, one
/// response per line on stdout. Malformed lines get a `parse error`
/// response rather than killing the loop, so one bad frame doesn't end the
/// session.
async fn run_stdio(state: AppState) -> anyhow::Result<()> {
    tracing::info!("toolgate running in stdio transport mode");
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => rpc::dispatch(&state, request).await,
            Err(e) => rpc::parse_error_response(e),
        };

        let mut serialized = serde_json::to_string(&response)?;
        serialized.push('\n');
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
