use anyhow::Result;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{post, MethodRouter};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::model::InboundSubmission;
use super::RelayService;
use crate::error::{RelayError, RelayReply};

const ALIAS_ROUTE: &str = "/orders";

type Shared = Arc<RelayService>;

fn endpoint() -> MethodRouter<Shared> {
    post(submit_order)
        .options(preflight)
        .fallback(method_not_allowed)
}

/// Relay routes: the configured path plus `/orders`.
pub fn router(service: RelayService, route: &str, body_limit: usize) -> Router {
    let mut router = Router::new().route(route, endpoint());
    if route != ALIAS_ROUTE {
        router = router.route(ALIAS_ROUTE, endpoint());
    }
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(service))
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn submit_order(
    State(service): State<Shared>,
    multipart: Result<Multipart, MultipartRejection>,
) -> RelayReply {
    if let Err(err) = service.ensure_configured() {
        return err.into();
    }
    let inbound = match multipart {
        Ok(multipart) => read_multipart(multipart).await,
        Err(rejection) => Err(RelayError::Multipart(rejection.body_text())),
    };
    match inbound {
        Ok(inbound) => service.relay(&inbound).await,
        Err(err) => err.into(),
    }
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

/// Text parts become fields; parts with a file name are kept when named `image1`..`image5`.
async fn read_multipart(mut multipart: Multipart) -> Result<InboundSubmission, RelayError> {
    let mut inbound = InboundSubmission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::Multipart(e.body_text()))?
    {
        let name = field.name().map(str::to_string).unwrap_or_default();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| RelayError::Multipart(e.body_text()))?;
                if !inbound.insert_file(&name, file_name, bytes) {
                    debug!(part = %name, "ignoring file part");
                }
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| RelayError::Multipart(e.body_text()))?;
                inbound.insert_field(name, value);
            }
        }
    }
    Ok(inbound)
}
