//! Embedding client, cache, and the OpenAI-compatible HTTP backend.

pub mod cache;
pub mod cached_client;
pub mod client;
pub mod config;
pub mod error;

pub use cache::{CacheStats, EmbeddingCache};
pub use cached_client::CachedEmbeddingClient;
pub use client::{EmbeddingClient, HttpEmbeddingClient};
pub use config::EmbeddingConfig;
pub use error::EmbeddingError;

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_server_returning(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn config_for(url: String) -> EmbeddingConfig {
        EmbeddingConfig {
            endpoint_url: format!("{url}/v1/embeddings"),
            api_key: "test-key".into(),
            model: "test-model".into(),
            dimension: 3,
            timeout: std::time::Duration::from_secs(5),
            max_retries: 1,
            cache_capacity: 16,
        }
    }

    #[tokio::test]
    async fn embed_parses_openai_data_shape() {
        let server = mock_server_returning(serde_json::json!({
            "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}]
        }))
        .await;
        let client = HttpEmbeddingClient::new(config_for(server.uri())).unwrap();
        let v = client.embed("hello").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_rejects_wrong_dimension() {
        let server = mock_server_returning(serde_json::json!({
            "embeddings": [[0.1, 0.2]]
        }))
        .await;
        let client = HttpEmbeddingClient::new(config_for(server.uri())).unwrap();
        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ShapeMismatch { .. }));
    }

    #[tokio::test]
    async fn embed_batch_falls_back_to_sequential_when_backend_rejects_arrays() {
        use wiremock::matchers::body_string_contains;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_string_contains("\"input\":[\""))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "this backend does not accept array input, send one string at a time",
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_string_contains("\"input\":\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}]
            })))
            .mount(&server)
            .await;

        let client = HttpEmbeddingClient::new(config_for(server.uri())).unwrap();
        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = client.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
        assert_eq!(vectors[1], vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn cached_client_avoids_duplicate_calls() {
        let server = mock_server_returning(serde_json::json!([[1.0, 0.0, 0.0]])).await;
        let inner = std::sync::Arc::new(HttpEmbeddingClient::new(config_for(server.uri())).unwrap());
        let cached = CachedEmbeddingClient::new(inner, 8);

        cached.embed("same text").await.unwrap();
        cached.embed("same text").await.unwrap();

        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
