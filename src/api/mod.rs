//! HTTP gateway for the browser UI
//!
//! Keeps the provider credential server-side and exposes job creation, status
//! checks and a live WebSocket watch.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::provider::VideoProvider;

pub mod handlers;
pub mod models;
pub mod server;

pub use server::{router, AppState};

/// API Server for handling REST requests and WebSocket connections
pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(provider: Arc<dyn VideoProvider>, config: &Config) -> Self {
        Self {
            state: AppState::new(provider, config),
            host: config.server.host.clone(),
            port: config.server.port,
        }
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on port {}", self.port);
        server::start_http_server(self.state, &self.host, self.port).await
    }
}
