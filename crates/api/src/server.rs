use crate::middleware::{get_tracing_layer, request_id_middleware};
use crate::routes;
use anyhow::{Context, Result};
use axum::{middleware, routing::get, Router};
use dealflow_common::ServerConfig;
use dealflow_network::WorkflowService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkflowService>,
}

pub struct DealflowServer {
    state: AppState,
    addr: String,
}

impl DealflowServer {
    pub fn new(service: Arc<WorkflowService>, config: &ServerConfig) -> Self {
        Self {
            state: AppState { service },
            addr: format!("{}:{}", config.host, config.port),
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve until Ctrl-C, then drain the worker pool
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        info!("Dealflow API listening on {}", self.addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        info!("HTTP server stopped, draining workflows");
        self.state.service.shutdown().await;
        Ok(())
    }
}

/// All API routes over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/workflows",
            get(routes::workflows::list_workflows).post(routes::workflows::start_workflow),
        )
        .route("/workflows/:workflow_id", get(routes::workflows::get_workflow))
        .route("/health", get(routes::health::health))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(get_tracing_layer())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
