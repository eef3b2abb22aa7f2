//! HTTP Server

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener},
    time::Duration,
};

use anyhow::Context;
use axum::{extract::Request, routing::get, Router};
use axum_server::Handle;
use clap::Parser;
use handlers::{panic_handler, tracking, v1};
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::domain::communication::{
    dispatcher::EmailDispatcher, notifications::QuoteNotifier, suppressions::SuppressionService,
};

pub mod errors;
pub mod handlers;
mod open_api;
pub mod state;

pub use state::AppState;

/// Configuration for the HTTP server.
#[derive(Clone, PartialEq, Eq, Parser)]
pub struct HttpServerConfig {
    /// The port to listen on
    #[arg(short, long, env = "HTTP_PORT", default_value = "3000")]
    pub port: u16,

    /// Shared secret required in the `X-Webhook-Token` header
    #[arg(long, env = "WEBHOOK_TOKEN")]
    pub webhook_token: Option<String>,
}

impl std::fmt::Debug for HttpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerConfig")
            .field("port", &self.port)
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The application's HTTP server
#[derive(Debug)]
pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    /// Returns a new HTTP server bound to the port specified in `config`.
    pub async fn new<S, D, N>(state: AppState<S, D, N>, config: &HttpServerConfig) -> anyhow::Result<Self>
    where
        S: SuppressionService,
        D: EmailDispatcher,
        N: QuoteNotifier,
    {
        let router = router(state);

        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        let listener = TcpListener::bind(address)
            .with_context(|| format!("failed to listen on {}", config.port))?;

        listener
            .set_nonblocking(true)
            .context("failed to make the listener non-blocking")?;

        Ok(Self { router, listener })
    }

    /// Runs the HTTP server until a shutdown signal arrives.
    #[mutants::skip]
    pub async fn run(self) -> anyhow::Result<()> {
        debug!("listening on {}", self.listener.local_addr()?);

        let handle = Handle::new();

        tokio::spawn(shutdown_signal(Some(handle.clone())));

        axum_server::from_tcp(self.listener)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        info!("HTTP server stopped");

        Ok(())
    }
}

/// Create the application's router
pub fn router<S, D, N>(state: AppState<S, D, N>) -> Router
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let uri = request.uri().to_string();
        tracing::info_span!("http_request", method = ?request.method(), uri)
    });

    Router::new()
        .route("/t/open/:message_id", get(tracking::open::handler::<S, D, N>))
        .route("/t/click/:message_id", get(tracking::click::handler::<S, D, N>))
        .nest("/api/v1", v1::router(state.clone()))
        .layer(CatchPanicLayer::custom(panic_handler))
        .layer(trace_layer)
        .with_state(state)
}

/// Waits for Ctrl+C or SIGTERM, then asks `handle` to drain connections.
#[mutants::skip]
pub async fn shutdown_signal(handle: Option<Handle>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    if let Some(handle) = handle {
        debug!("shutting down gracefully");
        handle.graceful_shutdown(Some(Duration::from_secs(10)));
    }
}
