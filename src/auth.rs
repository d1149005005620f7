//! 密码校验与登录接口。

use axum::extract::{Extension, Json};
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AUTH_FAILED_MESSAGE, ApiError};
use crate::session::SessionMarker;

/// Result of comparing a submitted password with the configured one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Granted,
    Denied,
    Misconfigured,
}

/// Compares submitted passwords against the operator secret.
#[derive(Debug)]
pub struct CredentialCheck {
    configured: Option<String>,
}

impl CredentialCheck {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            configured: config.auth_password.clone(),
        }
    }

    pub fn verify(&self, submitted: &str) -> Verdict {
        match self.configured.as_deref() {
            None | Some("") => Verdict::Misconfigured,
            Some(expected) if expected == submitted => Verdict::Granted,
            Some(_) => Verdict::Denied,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct AuthRequest {
    password: String,
}

#[derive(Serialize)]
pub(crate) struct SuccessBody {
    pub success: bool,
}

/// 登录接口：校验密码并写入会话 Cookie。
pub async fn auth_login(
    Extension(check): Extension<Arc<CredentialCheck>>,
    Extension(marker): Extension<Arc<SessionMarker>>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("password is required".into()))?;

    match check.verify(&payload.password) {
        Verdict::Granted => {
            info!("login succeeded");
            Ok((marker.issue(), JsonResponse(SuccessBody { success: true })).into_response())
        }
        Verdict::Denied => {
            warn!("login rejected: wrong password");
            Err(ApiError::Unauthorized(AUTH_FAILED_MESSAGE))
        }
        Verdict::Misconfigured => Err(ApiError::Misconfigured("AUTH_PASSWORD is not set")),
    }
}
