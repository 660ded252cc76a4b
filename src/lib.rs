//! Finledger is a multi-tenant personal finance REST API: users register and log in with email
//! and password, own bank accounts, and record transactions against those accounts. Account
//! balances are kept consistent with their transactions as transactions are created, edited and
//! deleted.

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

pub mod auth;
mod bank_accounts;
mod config;
pub mod db;
mod error;
pub mod models;
mod routing;
mod transactions;

pub use config::AppConfig;
pub use error::AppError;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
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
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
