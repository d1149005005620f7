//! 会话闸门：路径分类与每个请求的放行/重定向决策。

use axum::body::Body as AxumBody;
use axum::extract::Extension;
use axum::http::Request;
use axum::middleware;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::session::SessionMarker;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

// Paths below are compared after `normalize`, without surrounding slashes.
const LOGIN_PAGE: &str = "login";
const API_ROOT: &str = "api";
const API_PREFIX: &str = "api/";
const PUBLIC_API_PATHS: &[&str] = &["api/auth", "api/version"];
/// Every path the frontend answers with the main page.
const PROTECTED_PAGES: &[&str] = &["", "index", "index.html"];

/// Access category of a request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathClass {
    Public,
    ProtectedPage,
    ProtectedApi,
}

impl PathClass {
    pub fn is_protected(self) -> bool {
        !matches!(self, PathClass::Public)
    }
}

/// Outcome of the gate for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin,
    RedirectToHome,
}

/// Drops leading and trailing slashes, so `//index.html` and `/index.html/`
/// classify like `/index.html`.
fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn is_login_page(path: &str) -> bool {
    normalize(path) == LOGIN_PAGE
}

/// 路径分类：全函数，无状态。
pub fn classify(path: &str) -> PathClass {
    if path.is_empty() {
        return PathClass::Public;
    }
    let path = normalize(path);
    if PUBLIC_API_PATHS.contains(&path) {
        return PathClass::Public;
    }
    if path.starts_with(API_PREFIX) || path == API_ROOT {
        return PathClass::ProtectedApi;
    }
    if PROTECTED_PAGES.contains(&path) {
        return PathClass::ProtectedPage;
    }
    PathClass::Public
}

/// Decides what happens to a request given its path and marker presence.
pub fn evaluate(path: &str, has_marker: bool) -> Decision {
    if is_login_page(path) {
        return if has_marker {
            Decision::RedirectToHome
        } else {
            Decision::Allow
        };
    }
    let class = classify(path);
    if !class.is_protected() {
        return Decision::Allow;
    }
    if !has_marker {
        return Decision::RedirectToLogin;
    }
    Decision::Allow
}

/// 闸门中间件：API 返回 401，页面重定向到登录页。
pub async fn session_gate(
    Extension(marker): Extension<Arc<SessionMarker>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    let path = req.uri().path().to_owned();
    let has_marker = marker.is_present(req.headers());
    match evaluate(&path, has_marker) {
        Decision::Allow => next.run(req).await,
        Decision::RedirectToLogin if classify(&path) == PathClass::ProtectedApi => {
            debug!(%path, "rejected api request without session");
            ApiError::Unauthorized("Unauthorized").into_response()
        }
        Decision::RedirectToLogin => Redirect::temporary(LOGIN_PATH).into_response(),
        Decision::RedirectToHome => Redirect::temporary(HOME_PATH).into_response(),
    }
}
