//! 嵌入式前端页面（上传页与登录页）。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

use crate::error::ApiError;

#[derive(RustEmbed)]
#[folder = "frontend"]
/// 嵌入式前端资源。
pub struct FrontendAssets;

/// 前端资源处理器：`/` 对应 index.html，无扩展名路径尝试 `<path>.html`。
pub async fn serve_frontend(req: Request<AxumBody>) -> Result<Response, ApiError> {
    let path = req.uri().path().trim_matches('/');
    let requested = if path.is_empty() { "index.html" } else { path };
    if let Some(response) = load_embedded_asset(requested)? {
        return Ok(response);
    }

    if !requested.contains('.')
        && let Some(response) = load_embedded_asset(&format!("{requested}.html"))?
    {
        return Ok(response);
    }

    Err(ApiError::NotFound("not found".into()))
}

/// 加载指定路径的嵌入式资源。
fn load_embedded_asset(path: &str) -> Result<Option<Response>, ApiError> {
    let Some(asset) = FrontendAssets::get(path) else {
        return Ok(None);
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(Some(
        (headers, AxumBody::from(asset.data.into_owned())).into_response(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    async fn get(path: &str) -> Result<Response, ApiError> {
        let req = Request::builder()
            .uri(path)
            .body(AxumBody::empty())
            .expect("request");
        serve_frontend(req).await
    }

    #[tokio::test]
    async fn serves_pages_and_assets() {
        for (path, content_type) in [
            ("/", "text/html"),
            ("/login", "text/html"),
            ("/styles.css", "text/css"),
        ] {
            let response = get(path).await.unwrap_or_else(|_| panic!("{path} missing"));
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE].to_str().expect("header"),
                content_type,
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        assert!(matches!(get("/nope.png").await, Err(ApiError::NotFound(_))));
    }
}
