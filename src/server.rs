// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP server for metrics, probes and admission.
//!
//! Endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always 200)
//! - `/readyz` - Readiness probe (200 once controllers are running)
//! - `/validate-backupjob` - `BackupJob` validating admission webhook

use crate::constants::{BACKUPJOB_WEBHOOK_PATH, METRICS_SERVER_PATH};
use crate::metrics::gather_metrics;
use crate::webhook::validate_backup_job_handler;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Default)]
pub struct ServerState {
    pub is_ready: AtomicBool,
}

impl ServerState {
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::Relaxed);
    }
}

/// Router with every endpoint mounted.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route(BACKUPJOB_WEBHOOK_PATH, post(validate_backup_job_handler))
        .with_state(state)
}

/// Serves [`router`] until the listener fails.
///
/// # Errors
///
/// Returns an error if binding or serving fails.
pub async fn start_server(bind_address: &str, port: u16, state: Arc<ServerState>) -> Result<()> {
    let addr = format!("{bind_address}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}"),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
