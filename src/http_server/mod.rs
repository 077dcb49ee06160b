//! # HTTP Server
//!
//! axum surface of the console.
//!
//! ## Route groups
//!
//! - `tenant_routes`: tenant selection (any member) and membership (tenant or hoster admins)
//! - `enrollment_routes`: token management (operators and admins) and public redemption
//! - `admin_routes`: deployment-wide administration (hoster admins)
//!
//! Every group except redemption sits behind one of the access gates in
//! `middleware`.

pub mod admin_routes;
pub mod enrollment_routes;
pub mod errors;
pub mod middleware;
pub mod state;
pub mod tenant_routes;

use std::io;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use errors::{ApiError, ErrorResponse, DENIAL_REASON_HEADER};
pub use state::{ConsoleState, StateError};

/// Assemble the full router
pub fn build_router(state: ConsoleState) -> Router {
    Router::new()
        .merge(tenant_routes::tenant_access_routes(state.clone()))
        .merge(tenant_routes::member_routes(state.clone()))
        .merge(enrollment_routes::token_admin_routes(state.clone()))
        .merge(admin_routes::admin_routes(state.clone()))
        .merge(enrollment_routes::redemption_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server
pub struct HttpServer {
    state: ConsoleState,
    listen_addr: String,
}

impl HttpServer {
    pub fn new(state: ConsoleState, listen_addr: impl Into<String>) -> Self {
        Self {
            state,
            listen_addr: listen_addr.into(),
        }
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> io::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(addr = %self.listen_addr, "fleet console listening");

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
