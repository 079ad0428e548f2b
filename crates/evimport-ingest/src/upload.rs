//! HTTP upload of a single event batch
//!
//! One batch becomes one `GET` request carrying the API key and the
//! JSON-encoded batch as query parameters. Anything but a `200` is a failed
//! attempt, and attempts are paced by [`RetryRunner`].

use crate::config::ImportConfig;
use crate::event::{encode_batch, Event};
use crate::retry::RetryRunner;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Longest slice of an error response body kept for diagnostics
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Upload failure
#[derive(Debug, Error)]
pub enum UploadError {
    /// Connection refused, timeout, DNS failure, or a broken body stream
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bad response: {status} {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    /// Only produced when strict delivery is enabled
    #[error("gave up on batch at row {row} after {attempts} attempts")]
    Exhausted { row: u64, attempts: u32 },
}

/// Shared HTTP client for the ingestion endpoint
#[derive(Clone)]
pub struct UploadClient {
    http: Client,
    config: Arc<ImportConfig>,
}

impl UploadClient {
    pub fn new(config: Arc<ImportConfig>) -> Result<Self, UploadError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    /// Send a batch, retrying failed attempts
    ///
    /// An exhausted retry budget is logged by the runner and reported as
    /// success, unless `strict_delivery` is set.
    #[instrument(skip(self, batch), fields(events = batch.len()))]
    pub async fn send_batch(&self, batch: &[Event], row: u64) -> Result<(), UploadError> {
        let payload = encode_batch(batch)?;

        let delivered = RetryRunner::new(format!("row {}", row), self.config.max_attempts)
            .with_fixed_delay(self.config.retry_delay())
            .run(|| self.send_once(&payload))
            .await;

        match delivered {
            Some(()) => Ok(()),
            None if self.config.strict_delivery => Err(UploadError::Exhausted {
                row,
                attempts: self.config.max_attempts,
            }),
            None => Ok(()),
        }
    }

    /// One request, no retry; the body is always read to the end
    pub async fn send_once(&self, payload: &str) -> Result<(), UploadError> {
        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&[("api_key", self.config.api_key.as_str()), ("event", payload)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(UploadError::Status {
                status,
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        debug!(bytes = body.len(), "Batch accepted");
        Ok(())
    }
}

/// One batch bound to its client, ready to hand to the executor
pub struct UploadJob {
    client: UploadClient,
    batch: Vec<Event>,
    row: u64,
}

impl UploadJob {
    pub fn new(client: UploadClient, batch: Vec<Event>, row: u64) -> Self {
        Self { client, batch, row }
    }

    /// Approximate source row, used to label diagnostics
    pub fn row(&self) -> u64 {
        self.row
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.client.send_batch(&self.batch, self.row).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Arc<ImportConfig> {
        Arc::new(ImportConfig {
            api_key: "test-key".to_string(),
            endpoint: format!("{}/httpapi", server.uri()),
            max_attempts: 3,
            retry_delay_secs: 0,
            timeout_secs: 5,
            ..ImportConfig::default()
        })
    }

    fn batch() -> Vec<Event> {
        vec![
            Event::from_value(json!({"event_type": "open", "user_id": "u1"})).unwrap(),
            Event::from_value(json!({"event_type": "close", "device_id": "d1"})).unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_send_batch_encodes_query() {
        let server = MockServer::start().await;
        let expected = encode_batch(&batch()).unwrap();

        Mock::given(method("GET"))
            .and(path("/httpapi"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("event", expected.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("success"))
            .expect(1)
            .mount(&server)
            .await;

        let client = UploadClient::new(config_for(&server)).unwrap();
        client.send_batch(&batch(), 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_200_is_retried_until_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = UploadClient::new(config_for(&server)).unwrap();
        client.send_batch(&batch(), 20).await.unwrap();
    }

    #[tokio::test]
    async fn test_other_success_codes_count_as_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let client = UploadClient::new(config_for(&server)).unwrap();
        let err = client.send_once("[]").await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Status { status, .. } if status == StatusCode::ACCEPTED
        ));
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_swallowed_by_default() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .expect(3)
            .mount(&server)
            .await;

        let client = UploadClient::new(config_for(&server)).unwrap();
        assert!(client.send_batch(&batch(), 30).await.is_ok());
    }

    #[tokio::test]
    async fn test_exhausted_budget_fails_in_strict_mode() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let mut config = (*config_for(&server)).clone();
        config.strict_delivery = true;
        let client = UploadClient::new(Arc::new(config)).unwrap();

        let err = client.send_batch(&batch(), 40).await.unwrap_err();
        assert!(matches!(err, UploadError::Exhausted { row: 40, attempts: 3 }));
    }

    #[tokio::test]
    async fn test_transport_error_is_retried() {
        // Reserve a free port, then release it so connections are refused.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let config = ImportConfig {
            api_key: "test-key".to_string(),
            endpoint: format!("http://{}/httpapi", addr),
            max_attempts: 2,
            retry_delay_secs: 0,
            timeout_secs: 5,
            strict_delivery: true,
            ..ImportConfig::default()
        };

        let client = UploadClient::new(Arc::new(config)).unwrap();
        let err = client.send_batch(&batch(), 50).await.unwrap_err();
        assert!(matches!(err, UploadError::Exhausted { attempts: 2, .. }));
        assert!(matches!(
            client.send_once("[]").await.unwrap_err(),
            UploadError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn test_upload_job_runs_batch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = UploadClient::new(config_for(&server)).unwrap();
        let job = UploadJob::new(client, batch(), 60);
        assert_eq!(job.row(), 60);
        assert_eq!(job.len(), 2);
        job.run().await.unwrap();
    }
}
