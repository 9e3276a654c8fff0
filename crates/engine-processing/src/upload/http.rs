use super::Uploader;
use crate::{error::UploadError, item::BatchPayload, retry::classify_upload_error};
use async_trait::async_trait;
use engine_config::job::UploadSettings;
use engine_core::{metrics::Metrics, retry::RetryPolicy};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[derive(Debug, Default, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
}

/// Posts payloads to a bulk endpoint, `<url>/<index>/_bulk`.
///
/// Requests and responses are logged at `debug`; bodies are logged at
/// `trace` only when `log_content` is set.
#[derive(Debug, Clone)]
pub struct BulkHttpUploader {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
    cancel: CancellationToken,
    log_content: bool,
}

impl BulkHttpUploader {
    pub fn new(
        settings: &UploadSettings,
        cancel: CancellationToken,
        metrics: Metrics,
    ) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(UploadError::Client)?;

        Ok(BulkHttpUploader {
            client,
            endpoint: format!(
                "{}/{}/_bulk",
                settings.url.trim_end_matches('/'),
                settings.index.trim_matches('/')
            ),
            retry: RetryPolicy::new(
                settings.max_attempts,
                Duration::from_millis(250),
                Duration::from_secs(5),
            )
            .with_metrics(metrics),
            cancel,
            log_content: settings.log_content,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, payload: &BatchPayload) -> Result<(), UploadError> {
        let batch_number = payload.batch_number;
        debug!(method = "POST", url = %self.endpoint, batch_number, bytes = payload.content.len(), "Request");
        if self.log_content {
            trace!(batch_number, content = %String::from_utf8_lossy(&payload.content), "Request content");
        }

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(payload.content.clone())
            .send()
            .await
            .map_err(|source| UploadError::Http {
                batch_number,
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| UploadError::Http {
            batch_number,
            source,
        })?;
        debug!(
            batch_number,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Response"
        );
        if self.log_content {
            trace!(batch_number, content = %body, "Response content");
        }

        if !status.is_success() {
            return Err(UploadError::Status {
                batch_number,
                status: status.as_u16(),
                body,
            });
        }

        let summary = match serde_json::from_str::<BulkResponse>(&body) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(batch_number, error = %err, "Bulk response is not JSON, item errors cannot be checked");
                BulkResponse::default()
            }
        };
        if summary.errors {
            return Err(UploadError::ItemErrors { batch_number });
        }
        Ok(())
    }
}

#[async_trait]
impl Uploader for BulkHttpUploader {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, payload: &BatchPayload) -> Result<(), UploadError> {
        self.retry
            .run(&self.cancel, || self.send(payload), classify_upload_error)
            .await
            .map_err(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Answers each connection with the next canned response and records
    /// the request text.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                requests.push(read_request(&mut socket).await);
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });
        (url, hits, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            data.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if data.len() >= split + 4 + length || n == 0 {
                    return text;
                }
            }
            if n == 0 {
                return text;
            }
        }
    }

    fn settings(url: &str, max_attempts: usize) -> UploadSettings {
        UploadSettings {
            url: format!("{url}/"),
            index: "patients".into(),
            max_attempts,
            timeout_secs: 5,
            log_content: true,
        }
    }

    fn payload() -> BatchPayload {
        BatchPayload {
            batch_number: 1,
            query_id: "q1".into(),
            document_count: 1,
            content: Bytes::from_static(b"{\"update\":{\"_id\":\"A\"}}\n{\"doc\":{},\"doc_as_upsert\":true}\n"),
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn posts_ndjson_to_bulk_endpoint() {
        let (url, _, server) = serve(vec![(200, r#"{"took":1,"errors":false,"items":[]}"#)]).await;
        let uploader = BulkHttpUploader::new(&settings(&url, 1), CancellationToken::new(), Metrics::new()).unwrap();

        uploader.upload(&payload()).await.unwrap();

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /patients/_bulk HTTP/1.1"));
        assert!(requests[0].to_ascii_lowercase().contains("content-type: application/x-ndjson"));
        assert!(requests[0].ends_with("\"doc_as_upsert\":true}\n"));
        assert!(logs_contain("Response content"));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let (url, hits, server) = serve(vec![(503, "{}"), (200, r#"{"errors":false}"#)]).await;
        let metrics = Metrics::new();
        let uploader = BulkHttpUploader::new(&settings(&url, 3), CancellationToken::new(), metrics.clone()).unwrap();

        uploader.upload(&payload()).await.unwrap();
        server.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.snapshot().retry_count, 1);
    }

    #[tokio::test]
    async fn item_errors_fail_without_retry() {
        let (url, hits, server) = serve(vec![(200, r#"{"errors":true,"items":[]}"#)]).await;
        let uploader = BulkHttpUploader::new(&settings(&url, 3), CancellationToken::new(), Metrics::new()).unwrap();

        let err = uploader.upload(&payload()).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, UploadError::ItemErrors { batch_number: 1 }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_errors_are_reported_with_body() {
        let (url, _, server) = serve(vec![(400, r#"{"error":"bad"}"#)]).await;
        let uploader = BulkHttpUploader::new(&settings(&url, 3), CancellationToken::new(), Metrics::new()).unwrap();

        let err = uploader.upload(&payload()).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, UploadError::Status { status: 400, ref body, .. } if body.contains("bad")));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn unreadable_success_body_is_logged() {
        let (url, hits, server) = serve(vec![(200, "<html>ok</html>")]).await;
        let uploader = BulkHttpUploader::new(&settings(&url, 3), CancellationToken::new(), Metrics::new()).unwrap();

        uploader.upload(&payload()).await.unwrap();
        server.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Bulk response is not JSON"));
    }
}
