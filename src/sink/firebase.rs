use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::ScanSink;
use crate::config::FirebaseConfig;

/// Push-only client for a Firebase realtime-database path.
///
/// `POST {database_url}/{scan_path}.json` creates a child with a
/// server-generated key, returned as `{"name": "<key>"}`.
#[derive(Clone)]
pub struct FirebaseSink {
    client: reqwest::Client,
    push_url: String,
    auth: Option<String>,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl FirebaseSink {
    pub fn open(cfg: &FirebaseConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("checkpoint/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build firebase HTTP client")?;

        Ok(Self {
            client,
            push_url: format!(
                "{}/{}.json",
                cfg.database_url.trim_end_matches('/'),
                cfg.scan_path.trim_matches('/')
            ),
            auth: cfg.auth.clone(),
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }
}

#[async_trait]
impl ScanSink for FirebaseSink {
    fn name(&self) -> &'static str {
        "firebase"
    }

    async fn push(&self, document: &Value) -> anyhow::Result<String> {
        let mut req = self.client.post(&self.push_url).json(document);
        if let Some(ref auth) = self.auth {
            req = req.query(&[("auth", auth.as_str())]);
        }

        let resp = req.send().await.context("firebase push request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("firebase returned error: status={}, body={}", status, body);
        }

        let pushed: PushResponse = resp
            .json()
            .await
            .context("firebase push response was not {\"name\": ...}")?;

        let tag = document.get("tagId").and_then(Value::as_str).unwrap_or("N/A");
        let result = document.get("scanResult").and_then(Value::as_str).unwrap_or("N/A");
        let plate = document
            .pointer("/vehicle/plateNumber")
            .and_then(Value::as_str)
            .unwrap_or("N/A");
        info!(key = %pushed.name, tag, result, plate, "scan logged to firebase");
        Ok(pushed.name)
    }

    async fn close(&self) {
        tracing::debug!(url = %self.push_url, "firebase sink closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str, auth: Option<&str>) -> FirebaseConfig {
        FirebaseConfig {
            database_url: url.to_string(),
            auth: auth.map(String::from),
            scan_path: "rfidScanLogs".to_string(),
        }
    }

    #[test]
    fn test_push_url_joins_path() {
        let sink = FirebaseSink::open(
            &config("https://demo.firebaseio.com/", None),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(sink.push_url(), "https://demo.firebaseio.com/rfidScanLogs.json");
    }

    #[tokio::test]
    async fn test_push_returns_assigned_key() {
        let mock_server = MockServer::start().await;
        let doc = json!({"tagId": "E2800002", "scanResult": "success"});

        Mock::given(method("POST"))
            .and(path("/rfidScanLogs.json"))
            .and(query_param("auth", "s3cret"))
            .and(body_json(&doc))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "-NxKey123"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = FirebaseSink::open(
            &config(&mock_server.uri(), Some("s3cret")),
            Duration::from_secs(5),
        )
        .unwrap();
        let key = sink.push(&doc).await.unwrap();
        assert_eq!(key, "-NxKey123");
    }

    #[tokio::test]
    async fn test_push_non_2xx_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rfidScanLogs.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"Permission denied"}"#))
            .mount(&mock_server)
            .await;

        let sink = FirebaseSink::open(&config(&mock_server.uri(), None), Duration::from_secs(5))
            .unwrap();
        let err = sink.push(&json!({"tagId": "x"})).await.unwrap_err();
        assert!(err.to_string().contains("401"), "unexpected error: {}", err);
    }
}
