mod cors;

use std::net::SocketAddr;
use std::sync::Arc;

use nexus_config::Config;
use nexus_engine::EngineState;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware.
pub struct Server {
    router: axum::Router,
    listen_address: SocketAddr,
    engine_state: Arc<EngineState>,
}

impl Server {
    /// Build the server from configuration and discovered upstream
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if no upstream credentials were discovered or a
    /// provider's base URL is invalid.
    pub async fn new(config: Config, discovered: Vec<nexus_engine::discovery::DiscoveredUpstream>) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));
        let cors_config = config.server.cors.clone();

        let engine_state = EngineState::build(discovered, &config)?;
        let mut app = nexus_engine::build_router(Arc::clone(&engine_state));

        if config.server.health.enabled {
            app = app.merge(nexus_engine::health_router(Arc::clone(&engine_state), &config.server.health.path));
        }

        app = app.layer(TraceLayer::new_for_http());

        if let Some(ref cors_config) = cors_config {
            app = app.layer(cors::cors_layer(cors_config));
        }

        Ok(Self {
            router: app,
            listen_address,
            engine_state,
        })
    }

    /// The configured listen address.
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router.
    ///
    /// Useful for testing when the caller manages the listener.
    pub fn into_router(self) -> axum::Router {
        self.router
    }

    /// Start serving requests.
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails.
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        let engine_state = self.engine_state;
        let shutdown_timeout = engine_state.lifecycle.shutdown_timeout();
        let shutdown_for_trigger = shutdown.clone();
        let engine_state_for_trigger = Arc::clone(&engine_state);

        let serve_future = axum::serve(listener, self.router).with_graceful_shutdown(async move {
            shutdown_for_trigger.cancelled().await;
            tracing::info!("graceful shutdown initiated");
            // New requests keep arriving at the listener until this future
            // resolves; the lifecycle controller rejects them with 503
            // while draining in-flight ones.
            engine_state_for_trigger.lifecycle.shutdown().await;
        });

        // `with_graceful_shutdown` only bounds how long new connections
        // keep being accepted; axum otherwise waits indefinitely for
        // already-open connections to close on their own. Race against a
        // hard deadline so a slow upstream still producing chunks cannot
        // keep the process alive past the configured grace period.
        tokio::select! {
            result = serve_future => result.map_err(Into::into),
            () = async move {
                shutdown.cancelled().await;
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!("shutdown grace period elapsed with connections still open, exiting anyway");
                Ok(())
            }
        }
    }
}
