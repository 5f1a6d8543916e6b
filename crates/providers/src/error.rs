//! Error type shared by every provider adapter.

use serde::Serialize;

/// Failure category of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// The provider answered with a non-2xx status.
    Http,
    /// The request never completed (DNS, TLS, connect, timeout).
    Network,
    /// The response body did not have the expected shape.
    Decode,
    /// The provider answered 2xx but refused the job or task id.
    Rejected,
    /// The adapter is misconfigured (bad key, missing provider).
    Config,
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Network => "network",
            Self::Decode => "decode",
            Self::Rejected => "rejected",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed submit or status call. Always eligible for fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{provider} {code} error: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub code: ProviderErrorCode,
    /// HTTP status, when the provider answered.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    fn new(provider: &str, code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            code,
            status: None,
            message: message.into(),
        }
    }

    pub fn http(provider: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(provider, ProviderErrorCode::Http, body)
        }
    }

    pub fn network(provider: &str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorCode::Network, message)
    }

    pub fn decode(provider: &str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorCode::Decode, message)
    }

    pub fn rejected(provider: &str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorCode::Rejected, message)
    }

    pub fn config(provider: &str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorCode::Config, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_provider_and_code() {
        let err = ProviderError::http("kling", 503, "upstream busy");
        assert_eq!(err.to_string(), "kling http error: upstream busy");
        assert_eq!(err.status, Some(503));
    }

    #[test]
    fn code_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ProviderErrorCode::Rejected).unwrap(),
            "rejected"
        );
    }
}
