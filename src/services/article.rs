//! Article mutations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{actions, AuditEvent};
use crate::entities::{Article, ArticleCreate, ArticlePatch};
use crate::error::{CmsError, CmsResult};
use crate::index::{rebuild_safe, SearchIndex};
use crate::store::Stores;
use crate::workflow::{self, WorkflowState};

use super::MutationOptions;

pub struct ArticleService {
    stores: Stores,
    index: Arc<dyn SearchIndex>,
}

impl ArticleService {
    pub fn new(stores: Stores, index: Arc<dyn SearchIndex>) -> Self {
        Self { stores, index }
    }

    pub async fn create(
        &self,
        input: ArticleCreate,
        actor: &str,
        opts: MutationOptions,
    ) -> CmsResult<Article> {
        input.validate()?;
        let now = Utc::now();
        let mut article = Article {
            id: Uuid::new_v4(),
            slug: input.slug.clone(),
            i18n: input.i18n.clone(),
            workflow_state: WorkflowState::Draft,
            workflow_changed_at: now,
            published_at: None,
            scheduled_at: None,
            hidden_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        workflow::transition(&mut article, input.initial_state(), now, None)?;

        let audit = AuditEvent::new(actions::ARTICLE_CREATE, "Article", article.id)
            .actor(actor)
            .meta(json!({ "slug": article.slug }))
            .ip(opts.ip_address.clone());
        let created = self.stores.articles.insert(article, audit).await?;

        if !opts.skip_index_rebuild {
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: ArticlePatch,
        actor: &str,
        opts: MutationOptions,
    ) -> CmsResult<Article> {
        patch.validate()?;
        let actor = actor.to_string();
        let ip = opts.ip_address.clone();
        let updated = self
            .stores
            .articles
            .update_with(
                id,
                Box::new(move |article| {
                    let now = Utc::now();
                    patch.apply(article, now)?;
                    article.updated_at = now;
                    Ok(AuditEvent::new(actions::ARTICLE_UPDATE, "Article", article.id)
                        .actor(&actor)
                        .meta(json!({ "slug": article.slug }))
                        .ip(ip))
                }),
            )
            .await?;

        if !opts.skip_index_rebuild {
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(updated)
    }

    pub async fn transition_state(
        &self,
        id: Uuid,
        target: WorkflowState,
        scheduled_at: Option<DateTime<Utc>>,
        actor: &str,
        opts: MutationOptions,
    ) -> CmsResult<Article> {
        let actor = actor.to_string();
        let ip = opts.ip_address.clone();
        let updated = self
            .stores
            .articles
            .update_with(
                id,
                Box::new(move |article| {
                    let from = article.workflow_state;
                    let now = Utc::now();
                    workflow::transition(article, target, now, scheduled_at)?;
                    article.updated_at = now;
                    Ok(
                        AuditEvent::new(actions::ARTICLE_TRANSITION, "Article", article.id)
                            .actor(&actor)
                            .meta(json!({
                                "from": from,
                                "to": target,
                                "scheduledAt": scheduled_at,
                            }))
                            .ip(ip),
                    )
                }),
            )
            .await?;

        if !opts.skip_index_rebuild {
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(updated)
    }

    pub async fn soft_delete(&self, id: Uuid, actor: &str, opts: MutationOptions) -> CmsResult<()> {
        let actor = actor.to_string();
        let ip = opts.ip_address.clone();
        self.stores
            .articles
            .update_with(
                id,
                Box::new(move |article| {
                    let now = Utc::now();
                    workflow::soft_delete(article, now);
                    article.updated_at = now;
                    Ok(
                        AuditEvent::new(actions::ARTICLE_SOFT_DELETE, "Article", article.id)
                            .actor(&actor)
                            .meta(json!({ "slug": article.slug }))
                            .ip(ip),
                    )
                }),
            )
            .await?;

        if !opts.skip_index_rebuild {
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(())
    }

    pub async fn restore(&self, id: Uuid, actor: &str, opts: MutationOptions) -> CmsResult<Article> {
        let actor = actor.to_string();
        let ip = opts.ip_address.clone();
        let restored = self
            .stores
            .articles
            .update_with(
                id,
                Box::new(move |article| {
                    let now = Utc::now();
                    workflow::restore(article, now)?;
                    article.updated_at = now;
                    Ok(AuditEvent::new(actions::ARTICLE_RESTORE, "Article", article.id)
                        .actor(&actor)
                        .meta(json!({ "slug": article.slug }))
                        .ip(ip))
                }),
            )
            .await?;

        if !opts.skip_index_rebuild {
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(restored)
    }

    pub async fn get(&self, id: Uuid, preview: bool) -> CmsResult<Article> {
        self.stores
            .articles
            .get(id)
            .await?
            .filter(|a| visible(a, preview))
            .ok_or_else(|| CmsError::NotFound(format!("article not found: {id}")))
    }

    pub async fn get_by_slug(&self, slug: &str, preview: bool) -> CmsResult<Article> {
        self.stores
            .articles
            .find_by_slug(slug)
            .await?
            .filter(|a| visible(a, preview))
            .ok_or_else(|| CmsError::NotFound(format!("article not found: {slug}")))
    }

    pub async fn list(&self, preview: bool) -> CmsResult<Vec<Article>> {
        let rows = self.stores.articles.list().await?;
        Ok(rows.into_iter().filter(|a| visible(a, preview)).collect())
    }
}

fn visible(article: &Article, preview: bool) -> bool {
    if preview {
        workflow::is_preview_visible(article, Utc::now())
    } else {
        workflow::is_publicly_visible(article)
    }
}
