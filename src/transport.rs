//! Client side of the relay: the multipart request and how its reply is read.
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use tracing::{info, warn};

use crate::error::SubmitFailure;
use crate::model::{Field, ImageAsset};

/// Everything the relay receives for one order, images already renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub order_number: String,
    pub creator_name: String,
    pub quantity_ordered: String,
    pub submitted_url: String,
    pub order_confirmation_link: String,
    pub message: String,
    pub submitted_qr: String,
    pub confirmation_qr: String,
    pub images: Vec<ImageAsset>,
}

impl RelayRequest {
    /// Text parts in wire order.
    pub fn text_fields(&self) -> [(&'static str, &str); 8] {
        [
            (Field::OrderNumber.as_str(), self.order_number.as_str()),
            (Field::CreatorName.as_str(), self.creator_name.as_str()),
            (Field::QuantityOrdered.as_str(), self.quantity_ordered.as_str()),
            (Field::SubmittedUrl.as_str(), self.submitted_url.as_str()),
            (Field::OrderConfirmationLink.as_str(), self.order_confirmation_link.as_str()),
            (Field::Message.as_str(), self.message.as_str()),
            ("submittedQr", self.submitted_qr.as_str()),
            ("confirmationQr", self.confirmation_qr.as_str()),
        ]
    }

    /// Multipart body: text fields followed by `image1`..`imageN` file parts.
    pub fn to_form(&self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in self.text_fields() {
            form = form.text(name, value.to_string());
        }
        for (i, image) in self.images.iter().enumerate() {
            let part = Part::bytes(image.bytes.to_vec())
                .file_name(image.file_name.clone())
                .mime_str(&image.content_type)
                .with_context(|| format!("invalid MIME type for {}", image.file_name))?;
            form = form.part(format!("image{}", i + 1), part);
        }
        Ok(form)
    }
}

/// JSON body of a relay reply. Anything unparseable reads as the empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplyBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ReplyBody {
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: ReplyBody,
}

impl RelayResponse {
    /// Success only for a 2xx status whose body says `success: true`.
    pub fn interpret(&self) -> Result<(), SubmitFailure> {
        if !(200..300).contains(&self.status) {
            let message = self
                .body
                .error
                .clone()
                .unwrap_or_else(|| format!("Request failed ({})", self.status));
            return Err(SubmitFailure::Upstream(message));
        }
        if self.body.success != Some(true) {
            let message = self
                .body
                .error
                .clone()
                .unwrap_or_else(|| "Submission failed".to_string());
            return Err(SubmitFailure::Upstream(message));
        }
        Ok(())
    }
}

#[async_trait]
pub trait OrderTransport: Send + Sync {
    /// Deliver one request. `Err` means no reply was received at all.
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, SubmitFailure>;
}

/// Posts submissions to a running relay over HTTP.
#[derive(Clone)]
pub struct RelayClient {
    http: Client,
    endpoint: Url,
}

impl fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RelayClient {
    pub fn new(endpoint: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("order-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, endpoint })
    }

    /// Relay endpoint under `base`: `{base}/orders` when a base is given, `/api/orders` otherwise
    /// (the same rule the browser form uses with its API base setting).
    pub fn endpoint_for(base: &Url, api_base: Option<&str>) -> Result<Url> {
        let joined = match api_base.map(|b| b.trim_end_matches('/')).filter(|b| !b.is_empty()) {
            Some(api) => Url::parse(&format!("{}/orders", api))
                .or_else(|_| base.join(&format!("{}/orders", api))),
            None => base.join("/api/orders"),
        };
        joined.context("invalid relay endpoint")
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl OrderTransport for RelayClient {
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, SubmitFailure> {
        let form = request
            .to_form()
            .map_err(|err| SubmitFailure::Transport(format!("{:#}", err)))?;
        info!(
            url = %self.endpoint,
            order = %request.order_number,
            images = request.images.len(),
            "posting order to relay"
        );
        let res = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                warn!(?err, "relay unreachable");
                SubmitFailure::Transport(err.to_string())
            })?;

        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        info!(status, "relay replied");
        Ok(RelayResponse {
            status,
            body: ReplyBody::parse(&text),
        })
    }
}
