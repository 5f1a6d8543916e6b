//! Built-in model catalog.
//!
//! Models are data, not owned by a provider instance. Each entry names the
//! provider that serves it and the identifier that provider expects. The
//! slice order within a category is the default fallback order.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Provider ids
// ---------------------------------------------------------------------------

pub const PROVIDER_SORA: &str = "sora";
pub const PROVIDER_KLING: &str = "kling";
pub const PROVIDER_HAILUO: &str = "hailuo";
pub const PROVIDER_IMAGE: &str = "openai-image";

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Media category a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    Image,
    Text,
    Audio,
    Video,
}

impl ModelCategory {
    /// Parse a category name, as used in paths and the database.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(CoreError::Validation(format!(
                "Invalid model category '{s}'. Must be one of: image, text, audio, video"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// One model the system knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogModel {
    /// Stable id used in priorities and health records.
    pub id: &'static str,
    pub category: ModelCategory,
    pub provider_id: &'static str,
    /// Identifier sent on the wire to the provider.
    pub provider_model: &'static str,
    /// Category-scoped default rank, 1 is preferred.
    pub rank: u32,
}

const CATALOG: &[CatalogModel] = &[
    CatalogModel {
        id: "sora-2",
        category: ModelCategory::Video,
        provider_id: PROVIDER_SORA,
        provider_model: "sora-2",
        rank: 1,
    },
    CatalogModel {
        id: "kling-v2-1",
        category: ModelCategory::Video,
        provider_id: PROVIDER_KLING,
        provider_model: "kling-v2-1",
        rank: 2,
    },
    CatalogModel {
        id: "hailuo-02",
        category: ModelCategory::Video,
        provider_id: PROVIDER_HAILUO,
        provider_model: "MiniMax-Hailuo-02",
        rank: 3,
    },
    CatalogModel {
        id: "sora-2-pro",
        category: ModelCategory::Video,
        provider_id: PROVIDER_SORA,
        provider_model: "sora-2-pro",
        rank: 4,
    },
    CatalogModel {
        id: "kling-v1-6",
        category: ModelCategory::Video,
        provider_id: PROVIDER_KLING,
        provider_model: "kling-v1-6",
        rank: 5,
    },
    CatalogModel {
        id: "gpt-image-1",
        category: ModelCategory::Image,
        provider_id: PROVIDER_IMAGE,
        provider_model: "gpt-image-1",
        rank: 1,
    },
    CatalogModel {
        id: "dall-e-3",
        category: ModelCategory::Image,
        provider_id: PROVIDER_IMAGE,
        provider_model: "dall-e-3",
        rank: 2,
    },
];

/// Every catalog entry.
pub fn all_models() -> &'static [CatalogModel] {
    CATALOG
}

/// Models of one category in default order (ascending rank).
pub fn models_in(category: ModelCategory) -> Vec<&'static CatalogModel> {
    let mut models: Vec<&'static CatalogModel> =
        CATALOG.iter().filter(|m| m.category == category).collect();
    models.sort_by_key(|m| m.rank);
    models
}

/// Model ids of one category in default order.
pub fn default_order(category: ModelCategory) -> Vec<String> {
    models_in(category).iter().map(|m| m.id.to_string()).collect()
}

/// Look up a catalog entry by model id.
pub fn find_model(id: &str) -> Option<&'static CatalogModel> {
    CATALOG.iter().find(|m| m.id == id)
}
