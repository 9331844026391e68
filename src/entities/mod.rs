//! Domain entities and their patch payloads.
//!
//! The business schema is deliberately small: enough fields for the patch
//! pipeline, the reservation sweep, and the workflow state machine to be
//! exercised end to end. Patch types double as the validation schema — the
//! scheduler validates deferred patches against exactly the same types the
//! direct update endpoints deserialize into.

mod article;
mod property;

pub use article::{Article, ArticleCreate, ArticleI18n, ArticlePatch};
pub use property::{
    Property, PropertyCreate, PropertyI18n, PropertyPatch, PropertyStatus, PropertyType,
};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CmsError, CmsResult};

/// Deserialize a patch field that distinguishes an explicit `null`
/// (`Some(None)`, "clear the column") from an absent key (`None`, "keep").
/// Pair with `#[serde(default)]` so absence falls back to `None`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Closed set of publishable entity kinds. All dispatch on kind goes
/// through a `match` on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Property,
    Article,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Article => "article",
        }
    }

    /// Audit `entityType` label, matching the record shape the rest of the
    /// log uses.
    pub fn audit_label(&self) -> &'static str {
        match self {
            Self::Property => "Property",
            Self::Article => "Article",
        }
    }

    pub fn parse(value: &str) -> CmsResult<Self> {
        match value {
            "property" => Ok(Self::Property),
            "article" => Ok(Self::Article),
            other => Err(CmsError::UnsupportedEntityType(other.to_string())),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
