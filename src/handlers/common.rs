use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{config::AppConfig, ApiResponse};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Scheme and host the buyer's browser should return to after paying.
///
/// Prefers the request `Origin`, then the configured public base URL.
pub fn request_origin(headers: &HeaderMap, config: &AppConfig) -> Option<String> {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|o| !o.is_empty() && *o != "null")
        .map(str::to_string)
        .or_else(|| config.public_base_url.clone())
        .map(|o| o.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(public_base_url: Option<&str>) -> AppConfig {
        let mut config = AppConfig::new(
            "sqlite::memory:".into(),
            "a-very-long-test-secret-for-tokens-0123".into(),
            "sk_test_secret".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        config.public_base_url = public_base_url.map(str::to_string);
        config
    }

    #[test]
    fn origin_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://shop.example.com"));
        assert_eq!(
            request_origin(&headers, &config(Some("https://fallback.example.com"))).as_deref(),
            Some("https://shop.example.com")
        );
    }

    #[test]
    fn falls_back_to_public_base_url() {
        let headers = HeaderMap::new();
        assert_eq!(
            request_origin(&headers, &config(Some("https://shop.example.com/"))).as_deref(),
            Some("https://shop.example.com")
        );
        assert_eq!(request_origin(&headers, &config(None)), None);
    }
}
