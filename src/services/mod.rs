//! Entity services: validated mutations over the storage ports, with audit
//! and index side effects.
//!
//! The scheduler applies deferred patches through [`EntityServices`], so a
//! change-set passes through exactly the same validation and update path as
//! a direct API call.

mod article;
mod property;

pub use article::ArticleService;
pub use property::PropertyService;

use std::sync::Arc;

use serde_json::Value;

use crate::entities::{ArticlePatch, EntityKind, PropertyPatch};
use crate::error::{CmsError, CmsResult};
use crate::index::SearchIndex;
use crate::scheduler::ChangeSet;
use crate::store::Stores;

/// Per-mutation options threaded from the transport (or the scheduler).
#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
    /// Suppress the post-commit index rebuild. The scheduler sets this so a
    /// batch of applied jobs triggers a single rebuild.
    pub skip_index_rebuild: bool,
    pub ip_address: Option<String>,
}

impl MutationOptions {
    pub fn deferred() -> Self {
        Self {
            skip_index_rebuild: true,
            ip_address: None,
        }
    }
}

/// Both entity services behind one dispatch point keyed by [`EntityKind`].
pub struct EntityServices {
    pub properties: PropertyService,
    pub articles: ArticleService,
}

impl EntityServices {
    pub fn new(stores: Stores, index: Arc<dyn SearchIndex>) -> Self {
        Self {
            properties: PropertyService::new(stores.clone(), index.clone()),
            articles: ArticleService::new(stores, index),
        }
    }

    /// Validate a raw patch against the schema of the targeted entity kind
    /// and return its normalized form. Deferred patches go through this at
    /// staging time so nothing invalid can sit in the queue.
    pub fn validate_patch(kind: EntityKind, patch: &Value) -> CmsResult<Value> {
        match kind {
            EntityKind::Property => {
                let typed: PropertyPatch = parse_patch(patch)?;
                typed.validate()?;
                serde_json::to_value(&typed).map_err(|e| CmsError::Internal(e.into()))
            }
            EntityKind::Article => {
                let typed: ArticlePatch = parse_patch(patch)?;
                typed.validate()?;
                serde_json::to_value(&typed).map_err(|e| CmsError::Internal(e.into()))
            }
        }
    }

    /// Apply a due change-set through the matching service, index rebuild
    /// suppressed.
    pub async fn apply_change_set(&self, change_set: &ChangeSet) -> CmsResult<()> {
        match change_set.entity_type {
            EntityKind::Property => {
                let patch: PropertyPatch = parse_patch(&change_set.patch)?;
                self.properties
                    .update(
                        change_set.entity_id,
                        patch,
                        &change_set.created_by,
                        MutationOptions::deferred(),
                    )
                    .await?;
            }
            EntityKind::Article => {
                let patch: ArticlePatch = parse_patch(&change_set.patch)?;
                self.articles
                    .update(
                        change_set.entity_id,
                        patch,
                        &change_set.created_by,
                        MutationOptions::deferred(),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

fn parse_patch<T: serde::de::DeserializeOwned>(patch: &Value) -> CmsResult<T> {
    serde_json::from_value(patch.clone())
        .map_err(|e| CmsError::Validation(format!("invalid patch: {e}")))
}
