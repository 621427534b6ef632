//! HTTP server wrapper.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tracing::{error, info};

use super::middleware::AdmissionLayer;
use crate::admission::AdmissionController;
use crate::error::{GatekeeperError, Result};

/// HTTP server that fronts every route with the admission controller.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The admission controller instance
    controller: Arc<AdmissionController>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, controller: Arc<AdmissionController>) -> Self {
        Self { addr, controller }
    }

    /// Start the HTTP server with the given routes.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self, routes: Router) -> Result<()> {
        self.serve_with_shutdown(routes, std::future::pending())
            .await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The admission layer is installed outermost, so it runs before route
    /// dispatch for every request. The server shuts down when the provided
    /// signal resolves.
    pub async fn serve_with_shutdown<F>(self, routes: Router, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = routes.layer(AdmissionLayer::new(self.controller));

        info!(
            addr = %self.addr,
            "Starting HTTP server with admission control"
        );

        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            GatekeeperError::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{MonotonicClock, WindowStore};
    use crate::config::LimiterConfig;

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let controller = Arc::new(AdmissionController::new(
            LimiterConfig::default(),
            Arc::new(WindowStore::new()),
            Arc::new(MonotonicClock),
        ));
        let _server = HttpServer::new(addr, controller);
    }
}
