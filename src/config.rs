//! CLI arguments, server defaults and the immutable application config.

use axum_extra::extract::cookie::Key;
use clap::{Parser, ValueEnum};
use shadow_rs::formatcp;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const SESSION_COOKIE_NAME: &str = "authenticated";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const MIN_SESSION_KEY_LEN: usize = 64;
pub const DEFAULT_UPLOAD_MAX_SIZE: u64 = 128 * 1024 * 1024;
pub const DEFAULT_STAGING_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPLOADTHING_API_URL: &str = "https://api.uploadthing.com";
pub const UPLOADTHING_FILE_URL_BASE: &str = "https://utfs.io/f/";
pub const LOCAL_FILE_URL_BASE: &str = "/f/";
pub const LIST_PAGE_LIMIT: u32 = 100;
pub const STAGING_DIR: &str = ".staging";
pub const STAGING_CLEAN_INTERVAL_SECS: u64 = 900;

/// Storage backend behind the asset directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Local,
    Uploadthing,
}

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(
    name = "phoodle-uploader",
    version = VERSION_INFO,
    about = "Password-gated MP3 uploader"
)]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "PHOODLE_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub bind: String,
    #[arg(
        short = 'p',
        long,
        env = "PHOODLE_PORT",
        default_value_t = 3000,
        help = "Listen port"
    )]
    pub port: u16,
    #[arg(
        long,
        env = "AUTH_PASSWORD",
        hide_env_values = true,
        help = "Operator password for the web UI"
    )]
    pub auth_password: Option<String>,
    #[arg(
        long,
        env = "PHOODLE_PRODUCTION",
        help = "Production mode (marks the session cookie Secure)"
    )]
    pub production: bool,
    #[arg(
        long,
        env = "PHOODLE_SESSION_KEY",
        hide_env_values = true,
        help = "Cookie signing key, at least 64 bytes (random per start if unset)"
    )]
    pub session_key: Option<String>,
    #[arg(
        long,
        env = "PHOODLE_SESSION_TTL_SECS",
        default_value_t = DEFAULT_SESSION_TTL_SECS,
        help = "Session cookie lifetime in seconds"
    )]
    pub session_ttl_secs: u64,
    #[arg(
        short = 's',
        long,
        env = "PHOODLE_STORAGE_DIR",
        default_value = ".phoodle",
        help = "Local storage and upload staging directory"
    )]
    pub storage_dir: String,
    #[arg(
        long,
        env = "PHOODLE_BACKEND",
        value_enum,
        default_value_t = Backend::Local,
        help = "Storage backend"
    )]
    pub backend: Backend,
    #[arg(
        long,
        env = "UPLOADTHING_SECRET",
        hide_env_values = true,
        help = "UploadThing API secret"
    )]
    pub uploadthing_secret: Option<String>,
    #[arg(
        long,
        env = "UPLOADTHING_API_URL",
        default_value = DEFAULT_UPLOADTHING_API_URL,
        help = "UploadThing API base URL"
    )]
    pub uploadthing_api_url: String,
    #[arg(
        long,
        env = "PHOODLE_UPSTREAM_TIMEOUT_SECS",
        default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS,
        help = "Timeout for storage provider requests in seconds"
    )]
    pub upstream_timeout_secs: u64,
    #[arg(
        long,
        env = "PHOODLE_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max upload size in bytes"
    )]
    pub upload_max_size: u64,
    #[arg(
        long,
        env = "PHOODLE_STAGING_TTL_SECS",
        default_value_t = DEFAULT_STAGING_TTL_SECS,
        help = "Stale staging file threshold in seconds (0 to disable)"
    )]
    pub staging_ttl_secs: u64,
}

/// Start-up configuration faults.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address: {0}")]
    InvalidBind(String),
    #[error("session key must be at least {MIN_SESSION_KEY_LEN} bytes")]
    SessionKeyTooShort,
    #[error("uploadthing backend requires UPLOADTHING_SECRET")]
    MissingUploadthingSecret,
}

/// Connection settings for the UploadThing backend.
#[derive(Clone, Debug)]
pub struct UploadthingSettings {
    pub secret: String,
    pub api_url: String,
}

/// Immutable application configuration, built once at start-up.
#[derive(Clone)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub auth_password: Option<String>,
    pub production: bool,
    pub session_key: Key,
    pub session_ttl: Duration,
    pub storage_dir: PathBuf,
    pub backend: Backend,
    pub uploadthing: Option<UploadthingSettings>,
    pub upstream_timeout: Duration,
    pub upload_max_size: u64,
    pub staging_ttl: Duration,
}

impl AppConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let bind = args
            .bind
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidBind(args.bind.clone()))?;

        let session_key = match args.session_key.as_deref() {
            Some(raw) => {
                Key::try_from(raw.as_bytes()).map_err(|_| ConfigError::SessionKeyTooShort)?
            }
            None => {
                warn!("no session key configured, sessions will not survive a restart");
                Key::generate()
            }
        };

        let uploadthing = match (args.backend, args.uploadthing_secret) {
            (Backend::Uploadthing, None) => return Err(ConfigError::MissingUploadthingSecret),
            (_, Some(secret)) if !secret.trim().is_empty() => Some(UploadthingSettings {
                secret,
                api_url: args.uploadthing_api_url.trim_end_matches('/').to_string(),
            }),
            (Backend::Uploadthing, Some(_)) => return Err(ConfigError::MissingUploadthingSecret),
            _ => None,
        };

        Ok(Self {
            bind,
            port: args.port,
            auth_password: args.auth_password.filter(|value| !value.is_empty()),
            production: args.production,
            session_key,
            session_ttl: Duration::from_secs(args.session_ttl_secs),
            storage_dir: PathBuf::from(args.storage_dir),
            backend: args.backend,
            uploadthing,
            upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
            upload_max_size: args.upload_max_size,
            staging_ttl: Duration::from_secs(args.staging_ttl_secs),
        })
    }

    /// Configuration for tests: local backend rooted at `storage_dir`.
    #[cfg(test)]
    pub fn for_tests(storage_dir: PathBuf, auth_password: Option<&str>) -> Self {
        Self {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            auth_password: auth_password.map(str::to_string),
            production: false,
            session_key: Key::generate(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            storage_dir,
            backend: Backend::Local,
            uploadthing: None,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            upload_max_size: DEFAULT_UPLOAD_MAX_SIZE,
            staging_ttl: Duration::from_secs(DEFAULT_STAGING_TTL_SECS),
        }
    }
}
