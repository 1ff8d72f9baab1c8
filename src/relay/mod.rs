//! Server-side relay: accepts an order submission and forwards it to the
//! configured workflow webhook as JSON.
pub mod model;
pub mod server;
pub mod webhook;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayReply};
use model::InboundSubmission;
use webhook::{build_webhook_payload, Webhook, WebhookClient};

const NON_JSON_MESSAGE: &str = "Webhook returned non-JSON";

#[derive(Clone)]
pub struct RelayService {
    secret: Option<String>,
    webhook: Option<Arc<dyn Webhook>>,
}

impl fmt::Debug for RelayService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayService")
            .field("configured", &self.is_configured())
            .field("has_secret", &self.secret.is_some())
            .finish_non_exhaustive()
    }
}

impl RelayService {
    /// A missing webhook URL is allowed here; such a relay answers every submission with 500.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let webhook = match config.webhook_url.as_deref() {
            Some(url) => {
                let client = WebhookClient::new(url, config.timeout)?;
                info!(?client, "relay destination configured");
                Some(Arc::new(client) as Arc<dyn Webhook>)
            }
            None => {
                warn!("no webhook URL configured; submissions will be refused");
                None
            }
        };
        Ok(Self {
            secret: config.secret,
            webhook,
        })
    }

    pub fn with_webhook(webhook: Arc<dyn Webhook>, secret: Option<String>) -> Self {
        Self {
            secret,
            webhook: Some(webhook),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook.is_some()
    }

    pub fn ensure_configured(&self) -> Result<(), RelayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(RelayError::NotConfigured)
        }
    }

    /// Forward one submission and translate the upstream answer for the caller.
    pub async fn relay(&self, inbound: &InboundSubmission) -> RelayReply {
        let Some(webhook) = &self.webhook else {
            return RelayError::NotConfigured.into();
        };
        info!(
            order = %inbound.field("orderNumber"),
            images = inbound.files().count(),
            bytes = inbound.total_file_bytes(),
            "relaying order"
        );
        let payload = build_webhook_payload(inbound, self.secret.as_deref());
        match webhook.post(&payload).await {
            Ok(res) => map_upstream(res.status, &res.body),
            Err(err) => RelayError::Transport(format!("{:#}", err)).into(),
        }
    }
}

/// Upstream body as a JSON object; anything else is wrapped as `{ "error": text }`.
fn upstream_body(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => value,
        _ if text.is_empty() => json!({ "error": NON_JSON_MESSAGE }),
        _ => json!({ "error": text }),
    }
}

/// Non-2xx passes through with its body; a 2xx without `success: true` becomes 502.
pub fn map_upstream(status: u16, text: &str) -> RelayReply {
    let body = upstream_body(text);
    if !(200..300).contains(&status) {
        warn!(status, "webhook returned error status");
        return RelayReply {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        };
    }
    if body.get("success") != Some(&Value::Bool(true)) {
        warn!(%body, "webhook did not confirm success");
        return RelayReply {
            status: StatusCode::BAD_GATEWAY,
            body,
        };
    }
    RelayReply::success()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::webhook::UpstreamResponse;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingWebhook {
        reply: Option<UpstreamResponse>,
        payloads: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Webhook for RecordingWebhook {
        async fn post(&self, payload: &Value) -> Result<UpstreamResponse> {
            self.payloads.lock().await.push(payload.clone());
            self.reply.clone().ok_or_else(|| anyhow!("connection refused"))
        }
    }

    fn inbound() -> InboundSubmission {
        let mut inbound = InboundSubmission::default();
        inbound.insert_field("orderNumber", "#1005");
        inbound.insert_file("image1", "ORDER1005_Image1.png", Bytes::from_static(b"png"));
        inbound
    }

    #[test]
    fn upstream_success() {
        assert_eq!(map_upstream(200, r#"{"success":true,"row":4}"#), RelayReply::success());
    }

    #[test]
    fn success_false_at_200_is_bad_gateway_with_body() {
        let reply = map_upstream(200, r#"{"success":false,"error":"duplicate"}"#);
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(reply.body, json!({ "success": false, "error": "duplicate" }));

        let reply = map_upstream(200, r#"{"success":"true"}"#);
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn error_status_passes_through() {
        let reply = map_upstream(403, r#"{"error":"forbidden"}"#);
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
        assert_eq!(reply.body, json!({ "error": "forbidden" }));
    }

    #[test]
    fn non_json_bodies_are_wrapped() {
        let reply = map_upstream(200, "<html>Moved</html>");
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(reply.body, json!({ "error": "<html>Moved</html>" }));

        let reply = map_upstream(500, "");
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body, json!({ "error": "Webhook returned non-JSON" }));

        // arrays are JSON but not an object
        let reply = map_upstream(200, "[1,2]");
        assert_eq!(reply.body, json!({ "error": "[1,2]" }));
    }

    #[test]
    fn unconfigured_service_refuses() {
        let service = RelayService::new(RelayConfig {
            webhook_url: None,
            secret: None,
            timeout: Duration::from_secs(60),
        })
        .unwrap();
        assert!(!service.is_configured());
        assert!(matches!(service.ensure_configured(), Err(RelayError::NotConfigured)));
    }

    #[test]
    fn invalid_webhook_url_fails_construction() {
        let result = RelayService::new(RelayConfig {
            webhook_url: Some("::nope::".into()),
            secret: None,
            timeout: Duration::from_secs(60),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn relay_forwards_payload_with_secret() {
        let webhook = Arc::new(RecordingWebhook {
            reply: Some(UpstreamResponse {
                status: 200,
                body: r#"{"success":true}"#.into(),
            }),
            ..Default::default()
        });
        let service = RelayService::with_webhook(webhook.clone(), Some("s3cret".into()));
        let reply = service.relay(&inbound()).await;
        assert_eq!(reply, RelayReply::success());

        let payloads = webhook.payloads.lock().await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["secret"], "s3cret");
        assert_eq!(payloads[0]["image1Name"], "ORDER1005_Image1.png");
    }

    #[tokio::test]
    async fn transport_failure_is_bad_gateway() {
        let service = RelayService::with_webhook(Arc::new(RecordingWebhook::default()), None);
        let reply = service.relay(&inbound()).await;
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(reply.body, json!({ "error": "connection refused" }));
    }
}
