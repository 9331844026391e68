//! Article entity and patch payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmsError, CmsResult};
use crate::workflow::{impl_publishable, transition, WorkflowState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleI18n {
    pub locale: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub slug: String,
    pub i18n: Vec<ArticleI18n>,
    pub workflow_state: WorkflowState,
    pub workflow_changed_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub hidden_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_publishable!(Article);

/// Creation payload. Articles start as drafts unless `published` or an
/// explicit `workflow_state` says otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArticleCreate {
    pub slug: String,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub workflow_state: Option<WorkflowState>,
    pub i18n: Vec<ArticleI18n>,
}

impl ArticleCreate {
    pub fn validate(&self) -> CmsResult<()> {
        validate_slug(&self.slug)?;
        validate_i18n(&self.i18n)
    }

    pub fn initial_state(&self) -> WorkflowState {
        self.workflow_state.unwrap_or(match self.published {
            Some(true) => WorkflowState::Published,
            _ => WorkflowState::Draft,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArticlePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Flipping `published` is a shorthand for a `Published`/`Draft`
    /// workflow transition inside the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<Vec<ArticleI18n>>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        self.slug.is_none() && self.published.is_none() && self.i18n.is_none()
    }

    pub fn validate(&self) -> CmsResult<()> {
        if self.is_empty() {
            return Err(CmsError::Validation("update payload cannot be empty".into()));
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if let Some(i18n) = &self.i18n {
            validate_i18n(i18n)?;
        }
        Ok(())
    }

    pub fn apply(&self, article: &mut Article, now: DateTime<Utc>) -> CmsResult<()> {
        if let Some(slug) = &self.slug {
            article.slug = slug.clone();
        }
        if let Some(i18n) = &self.i18n {
            article.i18n = i18n.clone();
        }
        if let Some(published) = self.published {
            let target = if published {
                WorkflowState::Published
            } else {
                WorkflowState::Draft
            };
            transition(article, target, now, None)?;
        }
        Ok(())
    }
}

fn validate_slug(slug: &str) -> CmsResult<()> {
    if slug.trim().is_empty() {
        return Err(CmsError::Validation("slug must not be empty".into()));
    }
    Ok(())
}

fn validate_i18n(entries: &[ArticleI18n]) -> CmsResult<()> {
    if entries.is_empty() {
        return Err(CmsError::Validation(
            "at least one i18n entry is required".into(),
        ));
    }
    for entry in entries {
        if entry.locale.len() < 2 {
            return Err(CmsError::Validation("locale must be at least 2 characters".into()));
        }
        if entry.title.trim().is_empty() {
            return Err(CmsError::Validation("i18n title must not be empty".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_article() -> Article {
        Article {
            id: Uuid::new_v4(),
            slug: "market-update".into(),
            i18n: vec![ArticleI18n {
                locale: "en".into(),
                title: "Market update".into(),
                body: Some("...".into()),
            }],
            workflow_state: WorkflowState::Draft,
            workflow_changed_at: Utc::now(),
            published_at: None,
            scheduled_at: None,
            hidden_at: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn published_flag_drives_a_workflow_transition() {
        let mut article = sample_article();
        let now = Utc::now();
        let patch: ArticlePatch = serde_json::from_value(json!({ "published": true })).unwrap();
        patch.apply(&mut article, now).unwrap();

        assert_eq!(article.workflow_state, WorkflowState::Published);
        assert_eq!(article.published_at, Some(now));

        let patch: ArticlePatch = serde_json::from_value(json!({ "published": false })).unwrap();
        patch.apply(&mut article, now).unwrap();
        assert_eq!(article.workflow_state, WorkflowState::Draft);
        assert_eq!(article.published_at, None);
    }

    #[test]
    fn create_defaults_to_draft() {
        let create: ArticleCreate = serde_json::from_value(json!({
            "slug": "hello",
            "i18n": [{ "locale": "en", "title": "Hello" }]
        }))
        .unwrap();
        create.validate().unwrap();
        assert_eq!(create.initial_state(), WorkflowState::Draft);
    }

    #[test]
    fn empty_i18n_is_rejected() {
        let patch: ArticlePatch = serde_json::from_value(json!({ "i18n": [] })).unwrap();
        assert!(patch.validate().is_err());
    }
}
