//! Session marker: the signed cookie that proves a successful login.

use axum::http::HeaderMap;
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use cookie::time::Duration as CookieDuration;
use std::time::Duration;

use crate::config::{AppConfig, SESSION_COOKIE_NAME};

const MARKER_VALUE: &str = "true";

/// Issues and recognises the session cookie.
#[derive(Clone)]
pub struct SessionMarker {
    key: Key,
    ttl: Duration,
    secure: bool,
}

impl SessionMarker {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            key: config.session_key.clone(),
            ttl: config.session_ttl,
            secure: config.production,
        }
    }

    /// Returns true when the request carries a marker with a valid signature.
    pub fn is_present(&self, headers: &HeaderMap) -> bool {
        let jar: SignedCookieJar = SignedCookieJar::from_headers(headers, self.key.clone());
        jar.get(SESSION_COOKIE_NAME)
            .is_some_and(|cookie| cookie.value() == MARKER_VALUE)
    }

    /// 生成带签名的会话 Cookie。
    pub fn issue(&self) -> SignedCookieJar {
        let cookie = Cookie::build((SESSION_COOKIE_NAME, MARKER_VALUE))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(CookieDuration::seconds(self.ttl.as_secs() as i64))
            .build();
        SignedCookieJar::new(self.key.clone()).add(cookie)
    }
}
