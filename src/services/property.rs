//! Property mutations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{actions, AuditEvent};
use crate::entities::{Property, PropertyCreate, PropertyPatch, PropertyStatus};
use crate::error::{CmsError, CmsResult};
use crate::index::{rebuild_safe, SearchIndex};
use crate::store::Stores;
use crate::workflow::{self, WorkflowState};

use super::MutationOptions;

pub struct PropertyService {
    stores: Stores,
    index: Arc<dyn SearchIndex>,
}

impl PropertyService {
    pub fn new(stores: Stores, index: Arc<dyn SearchIndex>) -> Self {
        Self { stores, index }
    }

    pub async fn create(
        &self,
        input: PropertyCreate,
        actor: &str,
        opts: MutationOptions,
    ) -> CmsResult<Property> {
        input.validate()?;
        let now = Utc::now();
        let mut property = Property {
            id: Uuid::new_v4(),
            slug: input.slug.clone(),
            status: input.status.unwrap_or(PropertyStatus::Available),
            property_type: input.property_type,
            price: input.price,
            area: input.area,
            beds: input.beds,
            baths: input.baths,
            deposit: input.deposit.unwrap_or(false),
            reserved_until: input.reserved_until,
            i18n: input.i18n,
            workflow_state: WorkflowState::Draft,
            workflow_changed_at: now,
            published_at: None,
            scheduled_at: None,
            hidden_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        // Listings go live on creation unless the caller stages them.
        let initial = input.workflow_state.unwrap_or(WorkflowState::Published);
        workflow::transition(&mut property, initial, now, None)?;

        let audit = AuditEvent::new(actions::PROPERTY_CREATE, "Property", property.id)
            .actor(actor)
            .meta(json!({ "slug": property.slug }))
            .ip(opts.ip_address.clone());
        let created = self.stores.properties.insert(property, audit).await?;

        if !opts.skip_index_rebuild {
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: PropertyPatch,
        actor: &str,
        opts: MutationOptions,
    ) -> CmsResult<Property> {
        patch.validate()?;
        let actor = actor.to_string();
        let ip = opts.ip_address.clone();
        let updated = self
            .stores
            .properties
            .update_with(
                id,
                Box::new(move |property| {
                    patch.apply(property);
                    property.updated_at = Utc::now();
                    Ok(AuditEvent::new(actions::PROPERTY_UPDATE, "Property", property.id)
                        .actor(&actor)
                        .meta(json!({ "slug": property.slug }))
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
    ) -> CmsResult<Property> {
        let actor = actor.to_string();
        let ip = opts.ip_address.clone();
        let updated = self
            .stores
            .properties
            .update_with(
                id,
                Box::new(move |property| {
                    let from = property.workflow_state;
                    let now = Utc::now();
                    workflow::transition(property, target, now, scheduled_at)?;
                    property.updated_at = now;
                    Ok(
                        AuditEvent::new(actions::PROPERTY_TRANSITION, "Property", property.id)
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
            .properties
            .update_with(
                id,
                Box::new(move |property| {
                    let now = Utc::now();
                    workflow::soft_delete(property, now);
                    property.updated_at = now;
                    Ok(
                        AuditEvent::new(actions::PROPERTY_SOFT_DELETE, "Property", property.id)
                            .actor(&actor)
                            .meta(json!({ "slug": property.slug }))
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

    pub async fn restore(&self, id: Uuid, actor: &str, opts: MutationOptions) -> CmsResult<Property> {
        let actor = actor.to_string();
        let ip = opts.ip_address.clone();
        let restored = self
            .stores
            .properties
            .update_with(
                id,
                Box::new(move |property| {
                    let now = Utc::now();
                    workflow::restore(property, now)?;
                    property.updated_at = now;
                    Ok(AuditEvent::new(actions::PROPERTY_RESTORE, "Property", property.id)
                        .actor(&actor)
                        .meta(json!({ "slug": property.slug }))
                        .ip(ip))
                }),
            )
            .await?;

        if !opts.skip_index_rebuild {
            rebuild_safe(self.index.as_ref()).await;
        }
        Ok(restored)
    }

    pub async fn get(&self, id: Uuid, preview: bool) -> CmsResult<Property> {
        let property = self
            .stores
            .properties
            .get(id)
            .await?
            .filter(|p| visible(p, preview))
            .ok_or_else(|| CmsError::NotFound(format!("property not found: {id}")))?;
        Ok(property)
    }

    pub async fn list(&self, preview: bool) -> CmsResult<Vec<Property>> {
        let rows = self.stores.properties.list().await?;
        Ok(rows.into_iter().filter(|p| visible(p, preview)).collect())
    }
}

fn visible(property: &Property, preview: bool) -> bool {
    if preview {
        workflow::is_preview_visible(property, Utc::now())
    } else {
        workflow::is_publicly_visible(property)
    }
}
