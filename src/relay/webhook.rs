use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::model::{InboundSubmission, FORWARDED_FIELDS};

/// Raw upstream answer; interpretation happens in the relay core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Webhook: Send + Sync {
    /// POST one JSON payload. `Err` means no response was received.
    async fn post(&self, payload: &Value) -> Result<UpstreamResponse>;
}

/// JSON client for the destination workflow webhook.
#[derive(Clone)]
pub struct WebhookClient {
    http: Client,
    url: Url,
    timeout: Duration,
}

impl fmt::Debug for WebhookClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookClient")
            .field("host", &self.url.host_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl WebhookClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).context("invalid webhook URL")?;
        let http = Client::builder()
            .user_agent(concat!("order-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, url, timeout })
    }

    pub fn build_request(&self, body: &Value) -> Result<reqwest::Request> {
        self.http
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(body)
            .build()
            .context("failed to build webhook request")
    }
}

#[async_trait]
impl Webhook for WebhookClient {
    async fn post(&self, payload: &Value) -> Result<UpstreamResponse> {
        let request = self.build_request(payload)?;
        info!(host = ?self.url.host_str(), "=== WEBHOOK REQUEST ===");
        debug!("Request Payload: {}", redacted(payload));

        let res = self
            .http
            .execute(request)
            .await
            .inspect_err(|err| warn!(?err, "webhook unreachable"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .inspect_err(|err| warn!(?err, "failed to read webhook response"))?;
        info!(%status, bytes = body.len(), "=== WEBHOOK RESPONSE ===");
        debug!("Response Body: {}", body);
        Ok(UpstreamResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Webhook JSON: text fields, optional secret, then base64 content and name per image.
pub fn build_webhook_payload(inbound: &InboundSubmission, secret: Option<&str>) -> Value {
    let mut payload = Map::new();
    for (from, to) in FORWARDED_FIELDS {
        payload.insert(to.to_string(), Value::String(inbound.field(from).to_string()));
    }
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        payload.insert("secret".into(), Value::String(secret.to_string()));
    }
    for (index, file) in inbound.files() {
        payload.insert(
            format!("image{}Base64", index),
            Value::String(BASE64.encode(&file.bytes)),
        );
        payload.insert(format!("image{}Name", index), Value::String(file.name.clone()));
    }
    Value::Object(payload)
}

/// Payload rendering for logs: secret masked, image content reduced to its length.
pub fn redacted(payload: &Value) -> String {
    let Some(map) = payload.as_object() else {
        return payload.to_string();
    };
    let shown: Map<String, Value> = map
        .iter()
        .map(|(k, v)| {
            let v = if k == "secret" {
                Value::String("[REDACTED]".into())
            } else if k.ends_with("Base64") {
                let len = v.as_str().map(str::len).unwrap_or_default();
                Value::String(format!("[{} base64 chars]", len))
            } else {
                v.clone()
            };
            (k.clone(), v)
        })
        .collect();
    serde_json::to_string_pretty(&Value::Object(shown)).unwrap_or_else(|_| format!("{:?}", map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn inbound() -> InboundSubmission {
        let mut inbound = InboundSubmission::default();
        inbound.insert_field("orderNumber", "#1005");
        inbound.insert_field("creatorName", "Sam");
        inbound.insert_field("quantityOrdered", "2");
        inbound.insert_field("submittedQr", "https://qr/1");
        inbound.insert_field("confirmationQr", "https://qr/2");
        inbound.insert_file("image1", "ORDER1005_Image1.png", Bytes::from_static(b"hello"));
        inbound.insert_file("image3", "ORDER1005_Image3.jpg", Bytes::from_static(b"\x00\x01"));
        inbound
    }

    #[test]
    fn payload_carries_fields_qr_and_images() {
        let body = build_webhook_payload(&inbound(), None);
        assert_eq!(body["orderNumber"], "#1005");
        assert_eq!(body["quantityOrdered"], "2");
        assert_eq!(body["submittedUrl"], "");
        assert_eq!(body["message"], "");
        assert_eq!(body["submittedQrUrl"], "https://qr/1");
        assert_eq!(body["confirmationQrUrl"], "https://qr/2");
        assert!(body.get("submittedQr").is_none());
        assert!(body.get("secret").is_none());
        assert_eq!(body["image1Base64"], "aGVsbG8=");
        assert_eq!(body["image1Name"], "ORDER1005_Image1.png");
        assert_eq!(body["image3Base64"], "AAE=");
        assert!(body.get("image2Base64").is_none());
        assert!(body.get("image2Name").is_none());
    }

    #[test]
    fn secret_is_attached_when_configured() {
        let body = build_webhook_payload(&inbound(), Some("s3cret"));
        assert_eq!(body["secret"], "s3cret");
        let body = build_webhook_payload(&inbound(), Some(""));
        assert!(body.get("secret").is_none());
    }

    #[test]
    fn redacted_hides_secret_and_image_content() {
        let body = build_webhook_payload(&inbound(), Some("s3cret"));
        let shown = redacted(&body);
        assert!(!shown.contains("s3cret"));
        assert!(!shown.contains("aGVsbG8="));
        assert!(shown.contains("[8 base64 chars]"));
        assert_eq!(redacted(&json!("plain")), "\"plain\"");
    }

    #[test]
    fn build_request_posts_json() {
        let client = WebhookClient::new("https://hooks.example/exec", Duration::from_secs(60)).unwrap();
        let request = client.build_request(&json!({ "sample": true })).unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/exec");
        assert_eq!(
            request
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
        assert_eq!(request.timeout(), Some(&Duration::from_secs(60)));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(WebhookClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
