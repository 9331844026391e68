//! Property listing entity and patch payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmsError, CmsResult};
use crate::workflow::{impl_publishable, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    Available,
    Reserved,
    Sold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Condo,
    House,
    Land,
    Commercial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyI18n {
    pub locale: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    pub slug: String,
    pub status: PropertyStatus,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Asking price in whole currency units.
    pub price: i64,
    pub area: Option<f64>,
    pub beds: Option<i32>,
    pub baths: Option<i32>,
    /// A reservation without a deposit is released once `reserved_until`
    /// passes.
    pub deposit: bool,
    pub reserved_until: Option<DateTime<Utc>>,
    pub i18n: Vec<PropertyI18n>,
    pub workflow_state: WorkflowState,
    pub workflow_changed_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub hidden_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_publishable!(Property);

/// Creation payload. `workflow_state` defaults to `Published` — listings go
/// live on creation unless staged explicitly.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropertyCreate {
    pub slug: String,
    #[serde(default)]
    pub status: Option<PropertyStatus>,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub price: i64,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub beds: Option<i32>,
    #[serde(default)]
    pub baths: Option<i32>,
    #[serde(default)]
    pub deposit: Option<bool>,
    #[serde(default)]
    pub reserved_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub workflow_state: Option<WorkflowState>,
    pub i18n: Vec<PropertyI18n>,
}

impl PropertyCreate {
    pub fn validate(&self) -> CmsResult<()> {
        validate_slug(&self.slug)?;
        validate_price(self.price)?;
        validate_dimensions(self.area, self.beds, self.baths)?;
        validate_i18n(&self.i18n)
    }
}

/// Partial update. Plain `Option` fields distinguish "absent" from a value;
/// the nested `Option` on nullable columns additionally distinguishes an
/// explicit `null` ("clear") from absence ("keep").
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropertyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PropertyStatus>,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub property_type: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(
        default,
        deserialize_with = "crate::entities::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub area: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "crate::entities::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub beds: Option<Option<i32>>,
    #[serde(
        default,
        deserialize_with = "crate::entities::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub baths: Option<Option<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit: Option<bool>,
    #[serde(
        default,
        deserialize_with = "crate::entities::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reserved_until: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<Vec<PropertyI18n>>,
}

impl PropertyPatch {
    pub fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.status.is_none()
            && self.property_type.is_none()
            && self.price.is_none()
            && self.area.is_none()
            && self.beds.is_none()
            && self.baths.is_none()
            && self.deposit.is_none()
            && self.reserved_until.is_none()
            && self.i18n.is_none()
    }

    pub fn validate(&self) -> CmsResult<()> {
        if self.is_empty() {
            return Err(CmsError::Validation("update payload cannot be empty".into()));
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        validate_dimensions(
            self.area.flatten(),
            self.beds.flatten(),
            self.baths.flatten(),
        )?;
        if let Some(i18n) = &self.i18n {
            validate_i18n(i18n)?;
        }
        Ok(())
    }

    /// Merge the patch into an existing row. The caller stamps
    /// `updated_at`.
    pub fn apply(&self, property: &mut Property) {
        if let Some(slug) = &self.slug {
            property.slug = slug.clone();
        }
        if let Some(status) = self.status {
            property.status = status;
        }
        if let Some(property_type) = self.property_type {
            property.property_type = property_type;
        }
        if let Some(price) = self.price {
            property.price = price;
        }
        if let Some(area) = self.area {
            property.area = area;
        }
        if let Some(beds) = self.beds {
            property.beds = beds;
        }
        if let Some(baths) = self.baths {
            property.baths = baths;
        }
        if let Some(deposit) = self.deposit {
            property.deposit = deposit;
        }
        if let Some(reserved_until) = self.reserved_until {
            property.reserved_until = reserved_until;
        }
        if let Some(i18n) = &self.i18n {
            property.i18n = i18n.clone();
        }
    }
}

fn validate_slug(slug: &str) -> CmsResult<()> {
    if slug.trim().is_empty() {
        return Err(CmsError::Validation("slug must not be empty".into()));
    }
    Ok(())
}

fn validate_price(price: i64) -> CmsResult<()> {
    if price < 0 {
        return Err(CmsError::Validation("price must be non-negative".into()));
    }
    Ok(())
}

fn validate_dimensions(
    area: Option<f64>,
    beds: Option<i32>,
    baths: Option<i32>,
) -> CmsResult<()> {
    if let Some(area) = area {
        if area <= 0.0 {
            return Err(CmsError::Validation("area must be positive".into()));
        }
    }
    if beds.is_some_and(|n| n < 0) || baths.is_some_and(|n| n < 0) {
        return Err(CmsError::Validation(
            "beds and baths must be non-negative".into(),
        ));
    }
    Ok(())
}

fn validate_i18n(entries: &[PropertyI18n]) -> CmsResult<()> {
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
