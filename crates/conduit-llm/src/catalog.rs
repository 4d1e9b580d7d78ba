//! Cached model listing

use std::time::{Duration, Instant};

use conduit_config::Config;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::protocol::openai::OpenAiModel;

/// A model advertised by the server, with limits from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    /// Last path segment of the id
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    pub supports_tools: bool,
}

impl ModelInfo {
    pub fn from_wire(model: OpenAiModel, config: &Config) -> Self {
        let display_name = model
            .id
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&model.id)
            .to_owned();

        Self {
            display_name,
            id: model.id,
            owned_by: model.owned_by,
            max_input_tokens: config.limits.max_input_tokens(),
            max_output_tokens: config.limits.max_output_tokens,
            supports_tools: config.tools.enabled,
        }
    }
}

#[derive(Debug)]
struct CachedModels {
    models: Vec<ModelInfo>,
    fetched_at: Instant,
}

/// Model list cache with a time-to-live
///
/// Owned by the engine and cleared whenever the configuration changes or a
/// refresh is requested.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    cache: RwLock<Option<CachedModels>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached models, if fetched less than `ttl` ago
    pub async fn fresh(&self, ttl: Duration) -> Option<Vec<ModelInfo>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < ttl)
            .map(|cached| cached.models.clone())
    }

    pub async fn store(&self, models: Vec<ModelInfo>) {
        *self.cache.write().await = Some(CachedModels {
            models,
            fetched_at: Instant::now(),
        });
    }

    pub async fn invalidate(&self) {
        if self.cache.write().await.take().is_some() {
            tracing::debug!("model catalog invalidated");
        }
    }
}
