//! Organization Management Handlers

use chrono::Utc;
use crm_common::{
    Module, Organization, OrganizationMember, OrganizationSettings, Permission, UserProfile,
};
use uuid::Uuid;
use validator::Validate;

use super::members::new_member;
use super::types::{CreateOrganizationRequest, CreatedOrganization, UpdateOrganizationRequest};
use super::{load_organization, OrganizationError};
use crate::permissions::{require_member_permission, RolePreset};
use crate::state::AppState;

/// URL slug for an organization name: lowercase, whitespace runs become `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Create an organization owned by `owner`.
///
/// Seeds the five system roles, points the default role setting at the
/// member preset and enrolls `owner` as the first member with the owner role.
#[tracing::instrument(skip(state, owner, body), fields(user_id = %owner.id))]
pub fn create_organization(
    state: &AppState,
    owner: &UserProfile,
    body: CreateOrganizationRequest,
) -> Result<CreatedOrganization, OrganizationError> {
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;

    let now = Utc::now();
    let organization_id = Uuid::now_v7();

    // Seed system roles
    let owner_role = state
        .store
        .roles()
        .insert(RolePreset::Owner.to_role(organization_id, now))?;
    let mut default_role_id = owner_role.id;
    for preset in RolePreset::ALL {
        if preset == RolePreset::Owner {
            continue;
        }
        let role = state
            .store
            .roles()
            .insert(preset.to_role(organization_id, now))?;
        if role.is_default {
            default_role_id = role.id;
        }
    }

    let name = body.name.trim().to_string();
    let organization = state.store.organizations().insert(Organization {
        id: organization_id,
        slug: slugify(&name),
        name,
        logo_url: body.logo_url,
        industry: body.industry,
        size: body.size,
        website: body.website,
        description: body.description,
        owner_id: owner.id,
        settings: OrganizationSettings {
            default_role_id,
            allow_member_invites: true,
            require_two_factor: false,
            timezone: state.config.default_timezone.clone(),
            date_format: state.config.default_date_format.clone(),
            currency: state.config.default_currency.clone(),
        },
        created_at: now,
        updated_at: now,
    })?;

    let owner_member = state
        .store
        .members()
        .insert(new_member(&organization, owner, owner_role, Vec::new(), now))?;

    state.persist()?;
    tracing::info!(
        organization_id = %organization.id,
        slug = %organization.slug,
        "Organization created"
    );

    Ok(CreatedOrganization {
        organization,
        owner: owner_member,
    })
}

/// Fetch an organization the actor belongs to.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn get_organization(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
) -> Result<Organization, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Organization, Permission::View)?;
    load_organization(state, organization_id)
}

/// Organizations where `user_id` holds a membership, ordered by id.
#[tracing::instrument(skip(state))]
pub fn list_organizations(state: &AppState, user_id: Uuid) -> Vec<Organization> {
    let mut organizations: Vec<Organization> = state
        .store
        .members()
        .list()
        .into_iter()
        .filter(|m| m.user_id == user_id)
        .filter_map(|m| state.store.organizations().get(m.organization_id))
        .collect();
    organizations.sort_by_key(|o| o.id);
    organizations.dedup_by_key(|o| o.id);
    organizations
}

/// Update organization profile and settings.
#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn update_organization(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    body: UpdateOrganizationRequest,
) -> Result<Organization, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Organization, Permission::Edit)?;
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;

    let mut organization = load_organization(state, organization_id)?;

    if let Some(name) = body.name {
        let name = name.trim().to_string();
        organization.slug = slugify(&name);
        organization.name = name;
    }
    if body.industry.is_some() {
        organization.industry = body.industry;
    }
    if body.size.is_some() {
        organization.size = body.size;
    }
    if body.website.is_some() {
        organization.website = body.website;
    }
    if body.description.is_some() {
        organization.description = body.description;
    }
    if body.logo_url.is_some() {
        organization.logo_url = body.logo_url;
    }

    let settings = &mut organization.settings;
    if let Some(allow) = body.allow_member_invites {
        settings.allow_member_invites = allow;
    }
    if let Some(require) = body.require_two_factor {
        settings.require_two_factor = require;
    }
    if let Some(timezone) = body.timezone {
        settings.timezone = timezone;
    }
    if let Some(date_format) = body.date_format {
        settings.date_format = date_format;
    }
    if let Some(currency) = body.currency {
        settings.currency = currency.to_uppercase();
    }
    organization.updated_at = Utc::now();

    let organization = state.store.organizations().update(organization)?;
    state.persist()?;
    tracing::info!(organization_id = %organization.id, "Organization updated");

    Ok(organization)
}
