//! Phoodle uploader server binary.
//!
//! A password-gated web app for uploading MP3 files to a storage backend,
//! listing them and deleting them. Every request passes the session gate
//! first; the main entry point builds the shared components from one
//! immutable configuration and serves the Axum router.

mod assets;
mod auth;
mod background;
mod config;
mod error;
mod files;
mod frontend;
mod gate;
mod http;
mod logging;
mod router;
mod session;
mod staging;
mod upload;
mod version;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use crate::assets::AssetDirectory;
use crate::auth::CredentialCheck;
use crate::background::spawn_background_tasks;
use crate::config::{AppConfig, Args};
use crate::router::{AppComponents, build_router};
use crate::session::SessionMarker;
use crate::upload::UploadConfig;

shadow!(build);

/// Starts the server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let config = AppConfig::from_args(Args::parse()).map_err(|err| {
        error!(error = %err, "invalid configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;
    if config.auth_password.is_none() {
        warn!("AUTH_PASSWORD is not set, every login will fail");
    }

    let directory = AssetDirectory::from_config(&config)
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    if let AssetDirectory::Local(store) = &directory {
        store.ensure_root().await?;
    }
    let components = AppComponents {
        credentials: Arc::new(CredentialCheck::new(&config)),
        marker: Arc::new(SessionMarker::new(&config)),
        directory: Arc::new(directory),
        upload: Arc::new(UploadConfig::new(&config)),
    };
    let app = build_router(&components);
    spawn_background_tasks(components.upload.clone());

    let addr = SocketAddr::new(config.bind, config.port);
    let handle = Handle::new();
    let backend = components.directory.backend_name();
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    info!(%addr, backend, "starting HTTP server");
    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(make_service);

    tokio::spawn(shutdown_signal(handle.clone()));
    server.await
}

async fn shutdown_signal(handle: Handle) {
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

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
