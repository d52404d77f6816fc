//! FieldOps Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main FieldOps web server
pub struct FieldOpsServer {
    config: WebConfig,
    state: AppState,
}

impl FieldOpsServer {
    /// Create a new server with seeded state
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Start the web server
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!("Starting FieldOps web server on http://{}", address);

        let app = create_app(self.state.clone());
        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for FieldOpsServer
pub struct FieldOpsServerBuilder {
    config: WebConfig,
}

impl FieldOpsServerBuilder {
    pub fn new() -> Self {
        Self {
            config: WebConfig::default(),
        }
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database_url = Some(database_url.into());
        self
    }

    pub async fn build(self) -> WebResult<FieldOpsServer> {
        FieldOpsServer::new(self.config).await
    }
}

impl Default for FieldOpsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
