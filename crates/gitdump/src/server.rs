//! Webhook listener.
//!
//! `POST /` accepts an event shaped like a record (any subset of
//! `repository`, `organization`, `issue`, `comment`, plus arbitrary extra
//! keys), stores it through the engine and answers with its key.
//! `GET /health` answers `ok`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::key::RecordKey;
use crate::record::EventPayload;
use crate::sync::SyncEngine;

/// Default listener port.
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Body returned for an accepted event.
#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub id: RecordKey,
}

/// Build the webhook router around `engine`.
pub fn router(engine: Arc<SyncEngine>) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/health", get(health))
        .with_state(engine)
}

async fn health() -> &'static str {
    "ok"
}

async fn receive_event(
    State(engine): State<Arc<SyncEngine>>,
    Json(payload): Json<EventPayload>,
) -> Json<EventAccepted> {
    let record = engine.ingest_event(payload).await;
    Json(EventAccepted {
        id: record.id().clone(),
    })
}

/// Bind `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve webhook events on `listener` until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<SyncEngine>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let local: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(addr = ?local, "Webhook listener started");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(async move {
            // A dropped sender also means shut down.
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    tracing::info!("Webhook listener stopped");
    Ok(())
}
