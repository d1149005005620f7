//! Axum router: routes, the session gate and shared components.

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::assets::AssetDirectory;
use crate::auth::CredentialCheck;
use crate::session::SessionMarker;
use crate::upload::UploadConfig;
use crate::{auth, files, frontend, gate, http, upload, version};

/// Components shared by every request, built once from `AppConfig`.
#[derive(Clone)]
pub struct AppComponents {
    pub credentials: Arc<CredentialCheck>,
    pub marker: Arc<SessionMarker>,
    pub directory: Arc<AssetDirectory>,
    pub upload: Arc<UploadConfig>,
}

pub fn build_router(components: &AppComponents) -> Router {
    let mut app = Router::new()
        .route("/api/auth", post(auth::auth_login))
        .route("/api/files", get(files::list_files))
        .route(
            "/api/uploadthing",
            post(upload::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/uploadthing/delete", delete(files::delete_by_url))
        .route(
            "/api/uploadthing/delete/{file_key}",
            delete(files::delete_file),
        )
        .route("/api/version", get(version::get_version_info));

    if let AssetDirectory::Local(store) = components.directory.as_ref() {
        app = app.nest_service("/f", ServeDir::new(store.objects_dir()));
    }

    app.fallback(frontend::serve_frontend)
        .layer(middleware::from_fn(gate::session_gate))
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.to_string());
                    let client_ip = http::client_ip(request.headers(), connect_ip);

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(Extension(components.credentials.clone()))
        .layer(Extension(components.marker.clone()))
        .layer(Extension(components.directory.clone()))
        .layer(Extension(components.upload.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, StatusCode, header};
    use axum::response::Response;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::assets::{Asset, LocalStore};

    struct TestApp {
        _temp: tempfile::TempDir,
        router: Router,
    }

    async fn make_app(password: Option<&str>) -> TestApp {
        let temp = tempdir().expect("tempdir");
        let config = AppConfig::for_tests(temp.path().join("storage"), password);
        let store = LocalStore::new(config.storage_dir.clone());
        store.ensure_root().await.expect("ensure root");
        let components = AppComponents {
            credentials: Arc::new(CredentialCheck::new(&config)),
            marker: Arc::new(SessionMarker::new(&config)),
            directory: Arc::new(AssetDirectory::Local(store)),
            upload: Arc::new(UploadConfig::new(&config)),
        };
        TestApp {
            _temp: temp,
            router: build_router(&components),
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.router
                .clone()
                .oneshot(request)
                .await
                .expect("router is infallible")
        }

        async fn login(&self, password: &str) -> Response {
            self.send(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/auth")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "password": password }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
        }

        async fn session_cookie(&self) -> String {
            let response = self.login("correct").await;
            assert_eq!(response.status(), StatusCode::OK);
            let set_cookie = response.headers()[header::SET_COOKIE]
                .to_str()
                .expect("set-cookie");
            set_cookie.split(';').next().unwrap_or_default().to_string()
        }
    }

    fn request(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn login_then_list_files() {
        let app = make_app(Some("correct")).await;
        let cookie = app.session_cookie().await;

        let response = app
            .send(
                request(Method::GET, "/api/files", Some(&cookie))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn protected_api_without_marker_is_unauthorized() {
        let app = make_app(Some("correct")).await;
        for (method, uri) in [
            (Method::GET, "/api/files"),
            (Method::DELETE, "/api/uploadthing/delete/abc123"),
            (Method::POST, "/api/uploadthing?name=a.mp3"),
        ] {
            let response = app
                .send(request(method, uri, None).body(Body::empty()).expect("request"))
                .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(
                json_body(response).await,
                serde_json::json!({ "error": "Unauthorized" })
            );
        }
    }

    #[tokio::test]
    async fn forged_marker_is_rejected() {
        let app = make_app(Some("correct")).await;
        let response = app
            .send(
                request(Method::GET, "/api/files", Some("authenticated=true"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_unknown_key_with_marker_succeeds() {
        let app = make_app(Some("correct")).await;
        let cookie = app.session_cookie().await;
        let response = app
            .send(
                request(Method::DELETE, "/api/uploadthing/delete/abc123", Some(&cookie))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({ "success": true }));
    }

    #[tokio::test]
    async fn wrong_and_missing_password_look_alike() {
        let denied = make_app(Some("correct")).await.login("x").await;
        let misconfigured = make_app(None).await.login("x").await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(misconfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(denied).await, json_body(misconfigured).await);
    }

    #[tokio::test]
    async fn pages_redirect_by_marker() {
        let app = make_app(Some("correct")).await;
        let response = app
            .send(request(Method::GET, "/", None).body(Body::empty()).expect("request"))
            .await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/login");

        let response = app
            .send(request(Method::GET, "/login", None).body(Body::empty()).expect("request"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = app.session_cookie().await;
        let response = app
            .send(
                request(Method::GET, "/login", Some(&cookie))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let response = app
            .send(request(Method::GET, "/", Some(&cookie)).body(Body::empty()).expect("request"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    }

    #[tokio::test]
    async fn main_page_aliases_need_marker() {
        let app = make_app(Some("correct")).await;
        for uri in ["/index", "//index.html", "/index.html/"] {
            let response = app
                .send(request(Method::GET, uri, None).body(Body::empty()).expect("request"))
                .await;
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{uri}");
            assert_eq!(response.headers()[header::LOCATION], "/login", "{uri}");
        }

        let cookie = app.session_cookie().await;
        let response = app
            .send(
                request(Method::GET, "/index", Some(&cookie))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_list_download_delete() {
        let app = make_app(Some("correct")).await;
        let cookie = app.session_cookie().await;

        let response = app
            .send(
                request(Method::POST, "/api/uploadthing?name=song.mp3", Some(&cookie))
                    .header(header::CONTENT_TYPE, "audio/mpeg")
                    .body(Body::from("ID3 not really audio"))
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let asset: Asset = serde_json::from_value(json_body(response).await).expect("asset");

        let response = app
            .send(
                request(Method::GET, "/api/files", Some(&cookie))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        let listed: Vec<Asset> = serde_json::from_value(json_body(response).await).expect("list");
        assert_eq!(listed, vec![asset.clone()]);

        let response = app
            .send(
                request(Method::GET, &asset.file_url, None)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        assert_eq!(bytes.as_ref(), b"ID3 not really audio");

        let response = app
            .send(
                request(Method::DELETE, "/api/uploadthing/delete", Some(&cookie))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "fileUrl": asset.file_url }).to_string(),
                    ))
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .send(
                request(Method::GET, "/api/files", Some(&cookie))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(json_body(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected() {
        let app = make_app(Some("correct")).await;
        let cookie = app.session_cookie().await;
        let response = app
            .send(
                request(Method::POST, "/api/uploadthing?name=big.mp3", Some(&cookie))
                    .header(header::CONTENT_TYPE, "audio/mpeg")
                    .header(header::CONTENT_LENGTH, (129 * 1024 * 1024).to_string())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn version_is_public() {
        let app = make_app(Some("correct")).await;
        let response = app
            .send(
                request(Method::GET, "/api/version", None)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["backend"], "local");
    }
}
