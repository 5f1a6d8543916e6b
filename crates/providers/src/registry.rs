//! Provider registry.
//!
//! Built once at startup and shared behind an `Arc`; there is no way to
//! add or remove adapters afterwards. The "available models" of a category
//! are the catalog entries whose provider is registered, in default order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aiyou_core::catalog::{
    self, ModelCategory, PROVIDER_HAILUO, PROVIDER_IMAGE, PROVIDER_KLING, PROVIDER_SORA,
};
use aiyou_core::generation_config::ProviderInfo;

use crate::adapter::ProviderAdapter;
use crate::error::ProviderError;
use crate::{hailuo, image, kling, sora};

/// Credentials and endpoint for one provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub provider_id: &'static str,
    pub api_key: String,
    pub base_url: String,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider_id", &self.provider_id)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Environment variable prefix, provider id, and default base URL.
const ENV_PROVIDERS: [(&str, &str, &str); 4] = [
    ("SORA", PROVIDER_SORA, sora::DEFAULT_BASE_URL),
    ("KLING", PROVIDER_KLING, kling::DEFAULT_BASE_URL),
    ("HAILUO", PROVIDER_HAILUO, hailuo::DEFAULT_BASE_URL),
    ("IMAGE", PROVIDER_IMAGE, image::DEFAULT_BASE_URL),
];

/// Read `<PREFIX>_API_KEY` / `<PREFIX>_BASE_URL` for every known provider.
///
/// Providers without a non-empty key are left out.
pub fn settings_from_env() -> Vec<ProviderSettings> {
    ENV_PROVIDERS
        .into_iter()
        .filter_map(|(prefix, provider_id, default_base_url)| {
            let api_key = std::env::var(format!("{prefix}_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty())?;
            let base_url = std::env::var(format!("{prefix}_BASE_URL"))
                .unwrap_or_else(|_| default_base_url.to_string());
            Some(ProviderSettings {
                provider_id,
                api_key,
                base_url,
            })
        })
        .collect()
}

/// Map of provider id to adapter.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the adapters named by `settings`.
    pub fn from_settings(
        settings: &[ProviderSettings],
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        for s in settings {
            let adapter: Arc<dyn ProviderAdapter> = match s.provider_id {
                PROVIDER_SORA => Arc::new(sora::SoraAdapter::with_config(
                    &s.api_key,
                    s.base_url.as_str(),
                    timeout,
                )?),
                PROVIDER_KLING => Arc::new(kling::KlingAdapter::with_config(
                    &s.api_key,
                    s.base_url.as_str(),
                    timeout,
                )?),
                PROVIDER_HAILUO => Arc::new(hailuo::HailuoAdapter::with_config(
                    &s.api_key,
                    s.base_url.as_str(),
                    timeout,
                )?),
                PROVIDER_IMAGE => Arc::new(image::ImageAdapter::with_config(
                    &s.api_key,
                    s.base_url.as_str(),
                    timeout,
                )?),
                other => {
                    return Err(ProviderError::config(other, "Unknown provider id"));
                }
            };
            registry.register(adapter)?;
        }
        Ok(registry)
    }

    /// Build the registry from environment variables.
    pub fn from_env(timeout: Duration) -> Result<Self, ProviderError> {
        Self::from_settings(&settings_from_env(), timeout)
    }

    /// Add an adapter. A second adapter for the same provider id is an error.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> Result<(), ProviderError> {
        let id = adapter.info().id.clone();
        if self.adapters.contains_key(&id) {
            return Err(ProviderError::config(&id, "Provider registered twice"));
        }
        tracing::info!(provider = %id, "Registered provider");
        self.adapters.insert(id, adapter);
        Ok(())
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Registered providers, sorted by id.
    pub fn providers(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> =
            self.adapters.values().map(|a| a.info().clone()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Catalog models of `category` served by a registered provider, in
    /// default order.
    pub fn available_models(&self, category: ModelCategory) -> Vec<String> {
        catalog::models_in(category)
            .into_iter()
            .filter(|m| self.adapters.contains_key(m.provider_id))
            .map(|m| m.id.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::error::ProviderErrorCode;

    fn settings(provider_id: &'static str) -> ProviderSettings {
        ProviderSettings {
            provider_id,
            api_key: "key".into(),
            base_url: "http://localhost:9".into(),
        }
    }

    #[test]
    fn available_models_follow_registered_providers() {
        let registry = ProviderRegistry::from_settings(
            &[settings(PROVIDER_KLING), settings(PROVIDER_HAILUO)],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            registry.available_models(ModelCategory::Video),
            vec!["kling-v2-1", "hailuo-02", "kling-v1-6"]
        );
        assert!(registry.available_models(ModelCategory::Image).is_empty());
        assert!(registry.get(PROVIDER_SORA).is_none());
        assert!(registry.get(PROVIDER_KLING).is_some());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let err = ProviderRegistry::from_settings(
            &[settings(PROVIDER_SORA), settings(PROVIDER_SORA)],
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert_matches!(err.code, ProviderErrorCode::Config);
    }

    #[test]
    fn providers_sorted_by_id() {
        let registry = ProviderRegistry::from_settings(
            &[settings(PROVIDER_SORA), settings(PROVIDER_IMAGE)],
            Duration::from_secs(5),
        )
        .unwrap();
        let ids: Vec<String> = registry.providers().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["openai-image", "sora"]);
    }

    #[test]
    fn settings_debug_redacts_key() {
        let rendered = format!("{:?}", settings(PROVIDER_SORA));
        assert!(!rendered.contains("\"key\""));
        assert!(rendered.contains("<redacted>"));
    }
}
