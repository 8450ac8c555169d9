//! HTTP server implementation

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use syncapi_store::ConnectionPool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::ApiContext;
use crate::error::ServerResult;
use crate::routes;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,
    /// Enable CORS (default: true)
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with the given address
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }
}

/// Build the application router
pub fn build_router<P: ConnectionPool>(ctx: Arc<ApiContext<P>>, enable_cors: bool) -> Router {
    let mut router = routes::router::<P>().layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(ctx)
}

/// API HTTP server
pub struct ApiServer<P: ConnectionPool> {
    config: ServerConfig,
    ctx: Arc<ApiContext<P>>,
}

impl<P: ConnectionPool> ApiServer<P> {
    /// Create a new API server
    pub fn new(config: ServerConfig, ctx: ApiContext<P>) -> Self {
        Self {
            config,
            ctx: Arc::new(ctx),
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        build_router(self.ctx.clone(), self.config.enable_cors)
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        tracing::info!("API server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Get the server listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen_addr
    }
}
