//! Model selection with health-aware fallback.
//!
//! The candidate order is the user's saved order for a category followed
//! by every other available model in catalog order. Resolution walks that
//! order and takes the first healthy model; when every candidate is
//! unhealthy the first one is used anyway. Health never rewrites the saved
//! order.

use std::collections::HashSet;
use std::sync::Arc;

use aiyou_core::catalog::{self, ModelCategory};
use aiyou_core::health::ModelHealth;
use aiyou_core::priority::{build_candidate_order, select_model};
use aiyou_db::repositories::ModelPriorityRepo;
use aiyou_db::DbPool;
use aiyou_providers::ProviderRegistry;
use serde::Serialize;

use crate::error::PipelineError;
use crate::health::ModelHealthTracker;

/// The model chosen for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Catalog id, the key health is tracked under.
    pub model_id: String,
    pub provider_id: String,
    /// Identifier the provider expects on the wire.
    pub provider_model: String,
}

/// One row of the priority view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityEntry {
    pub position: usize,
    pub model_id: String,
    pub provider_id: String,
    pub health: ModelHealth,
}

pub struct ModelPriorityResolver {
    pool: DbPool,
    registry: Arc<ProviderRegistry>,
    health: Arc<ModelHealthTracker>,
}

impl ModelPriorityResolver {
    pub fn new(
        pool: DbPool,
        registry: Arc<ProviderRegistry>,
        health: Arc<ModelHealthTracker>,
    ) -> Self {
        Self {
            pool,
            registry,
            health,
        }
    }

    /// Full fallback chain for a category, before health is applied.
    pub async fn candidate_order(
        &self,
        category: ModelCategory,
    ) -> Result<Vec<String>, PipelineError> {
        let user_order = ModelPriorityRepo::list(&self.pool, category.as_str()).await?;
        let available = self.registry.available_models(category);
        Ok(build_candidate_order(&user_order, &available))
    }

    /// Pick the model for a new attempt.
    pub async fn resolve(&self, category: ModelCategory) -> Result<ResolvedModel, PipelineError> {
        let candidates = self.candidate_order(category).await?;
        let health = self.health.snapshot().await;
        let chosen = select_model(&candidates, |id| {
            health.get(id).map_or(true, |h| h.healthy)
        })
        .ok_or_else(|| {
            PipelineError::validation(format!(
                "No provider is configured for {category} generation"
            ))
        })?;

        let model = catalog::find_model(chosen).ok_or_else(|| {
            PipelineError::validation(format!("Model '{chosen}' is not in the catalog"))
        })?;
        if candidates.first().map(String::as_str) != Some(chosen) {
            tracing::info!(
                category = %category,
                model_id = chosen,
                "Falling back past unhealthy models",
            );
        }
        Ok(ResolvedModel {
            model_id: model.id.to_string(),
            provider_id: model.provider_id.to_string(),
            provider_model: model.provider_model.to_string(),
        })
    }

    /// The candidate order of a category annotated with live health.
    pub async fn priorities(
        &self,
        category: ModelCategory,
    ) -> Result<Vec<PriorityEntry>, PipelineError> {
        let candidates = self.candidate_order(category).await?;
        let mut entries = Vec::with_capacity(candidates.len());
        for (position, model_id) in candidates.into_iter().enumerate() {
            let provider_id = catalog::find_model(&model_id)
                .map(|m| m.provider_id.to_string())
                .unwrap_or_default();
            let health = self.health.get_health(&model_id).await;
            entries.push(PriorityEntry {
                position,
                model_id,
                provider_id,
                health,
            });
        }
        Ok(entries)
    }

    /// Save the user's order for a category.
    ///
    /// Every id must be a catalog model of that category; duplicates are
    /// rejected. Models whose provider is not configured may be listed and
    /// are skipped at resolution time.
    pub async fn set_priority(
        &self,
        category: ModelCategory,
        model_ids: &[String],
    ) -> Result<Vec<PriorityEntry>, PipelineError> {
        let mut seen = HashSet::with_capacity(model_ids.len());
        for id in model_ids {
            match catalog::find_model(id) {
                Some(m) if m.category == category => {}
                Some(m) => {
                    return Err(PipelineError::validation(format!(
                        "Model '{id}' is a {} model, not {category}",
                        m.category
                    )))
                }
                None => {
                    return Err(PipelineError::validation(format!("Unknown model '{id}'")));
                }
            }
            if !seen.insert(id.as_str()) {
                return Err(PipelineError::validation(format!(
                    "Model '{id}' is listed more than once"
                )));
            }
        }

        ModelPriorityRepo::replace(&self.pool, category.as_str(), model_ids).await?;
        tracing::info!(category = %category, models = model_ids.len(), "Saved model priority");
        self.priorities(category).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aiyou_core::catalog::{PROVIDER_HAILUO, PROVIDER_KLING, PROVIDER_SORA};
    use aiyou_core::error::CoreError;
    use aiyou_providers::ProviderSettings;
    use assert_matches::assert_matches;

    fn settings(provider_id: &'static str) -> ProviderSettings {
        ProviderSettings {
            provider_id,
            api_key: "key".into(),
            base_url: "http://localhost:9".into(),
        }
    }

    async fn resolver(providers: &[&'static str]) -> (ModelPriorityResolver, Arc<ModelHealthTracker>) {
        let pool = aiyou_db::create_pool("sqlite::memory:").await.unwrap();
        aiyou_db::run_migrations(&pool).await.unwrap();
        let all: Vec<_> = providers.iter().map(|p| settings(*p)).collect();
        let registry =
            Arc::new(ProviderRegistry::from_settings(&all, Duration::from_secs(5)).unwrap());
        let health = Arc::new(ModelHealthTracker::load(pool.clone()).await.unwrap());
        (
            ModelPriorityResolver::new(pool, registry, Arc::clone(&health)),
            health,
        )
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn default_order_without_saved_priority() {
        let (resolver, _) = resolver(&[PROVIDER_SORA, PROVIDER_KLING]).await;
        assert_eq!(
            resolver.candidate_order(ModelCategory::Video).await.unwrap(),
            ids(&["sora-2", "kling-v2-1", "sora-2-pro", "kling-v1-6"])
        );
        let chosen = resolver.resolve(ModelCategory::Video).await.unwrap();
        assert_eq!(chosen.model_id, "sora-2");
        assert_eq!(chosen.provider_id, PROVIDER_SORA);
    }

    #[tokio::test]
    async fn saved_order_leads_and_unavailable_entries_are_skipped() {
        let (resolver, _) = resolver(&[PROVIDER_KLING, PROVIDER_HAILUO]).await;
        resolver
            .set_priority(ModelCategory::Video, &ids(&["sora-2", "hailuo-02"]))
            .await
            .unwrap();
        assert_eq!(
            resolver.candidate_order(ModelCategory::Video).await.unwrap(),
            ids(&["hailuo-02", "kling-v2-1", "kling-v1-6"])
        );
        let chosen = resolver.resolve(ModelCategory::Video).await.unwrap();
        assert_eq!(chosen.provider_model, "MiniMax-Hailuo-02");
    }

    #[tokio::test]
    async fn falls_back_past_unhealthy_and_recovers() {
        let (resolver, health) = resolver(&[PROVIDER_SORA, PROVIDER_KLING]).await;
        resolver
            .set_priority(ModelCategory::Video, &ids(&["kling-v2-1", "sora-2"]))
            .await
            .unwrap();

        for _ in 0..3 {
            health.record_outcome("kling-v2-1", false).await.unwrap();
        }
        assert_eq!(
            resolver.resolve(ModelCategory::Video).await.unwrap().model_id,
            "sora-2"
        );
        // The saved order is untouched by health.
        assert_eq!(
            resolver.candidate_order(ModelCategory::Video).await.unwrap()[0],
            "kling-v2-1"
        );

        health.record_outcome("kling-v2-1", true).await.unwrap();
        assert_eq!(
            resolver.resolve(ModelCategory::Video).await.unwrap().model_id,
            "kling-v2-1"
        );
    }

    #[tokio::test]
    async fn all_unhealthy_uses_first_candidate() {
        let (resolver, health) = resolver(&[PROVIDER_HAILUO]).await;
        for _ in 0..3 {
            health.record_outcome("hailuo-02", false).await.unwrap();
        }
        assert_eq!(
            resolver.resolve(ModelCategory::Video).await.unwrap().model_id,
            "hailuo-02"
        );
    }

    #[tokio::test]
    async fn no_provider_for_category_is_validation_error() {
        let (resolver, _) = resolver(&[PROVIDER_SORA]).await;
        let err = resolver.resolve(ModelCategory::Image).await.unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn set_priority_rejects_bad_lists() {
        let (resolver, _) = resolver(&[PROVIDER_SORA]).await;
        let wrong_category = resolver
            .set_priority(ModelCategory::Video, &ids(&["dall-e-3"]))
            .await
            .unwrap_err();
        assert_matches!(wrong_category, PipelineError::Core(CoreError::Validation(_)));

        let unknown = resolver
            .set_priority(ModelCategory::Video, &ids(&["veo-3"]))
            .await
            .unwrap_err();
        assert_matches!(unknown, PipelineError::Core(CoreError::Validation(_)));

        let duplicate = resolver
            .set_priority(ModelCategory::Video, &ids(&["sora-2", "sora-2"]))
            .await
            .unwrap_err();
        assert_matches!(duplicate, PipelineError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn priorities_carry_health() {
        let (resolver, health) = resolver(&[PROVIDER_SORA]).await;
        health.record_outcome("sora-2-pro", false).await.unwrap();
        let entries = resolver.priorities(ModelCategory::Video).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].model_id, "sora-2-pro");
        assert_eq!(entries[1].health.consecutive_failures, 1);
        assert!(entries[0].health.healthy);
    }
}
