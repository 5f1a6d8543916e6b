//! Shared `reqwest` plumbing for the adapters.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::error::ProviderError;

/// Longest error body carried into a [`ProviderError`] message.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Build a client that sends `Authorization: Bearer <api_key>` on every
/// request.
pub fn bearer_client(
    provider: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<reqwest::Client, ProviderError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| ProviderError::config(provider, "Invalid API key format"))?;
    auth_value.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth_value);

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ProviderError::config(provider, format!("Failed to create HTTP client: {e}")))
}

/// Trim a trailing slash so paths can be appended with `format!`.
pub fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Send a request, mapping transport failures to a network error.
pub async fn send(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ProviderError> {
    request
        .send()
        .await
        .map_err(|e| ProviderError::network(provider, e.to_string()))
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or an HTTP error carrying the status and a
/// truncated body on failure.
pub async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        if body.len() > MAX_ERROR_BODY_LEN {
            let mut cut = MAX_ERROR_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(ProviderError::http(provider, status.as_u16(), body));
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
pub async fn parse_json<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let response = ensure_success(provider, response).await?;
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network(provider, e.to_string()))?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::decode(provider, format!("Unexpected response body: {e}")))
}
