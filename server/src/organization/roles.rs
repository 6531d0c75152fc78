//! Organization role management handlers.
//!
//! Members hold a copy of their role. Editing a role here does not touch
//! those copies; [`propagate_role`] pushes the current grants out to every
//! member holding the role.

use chrono::Utc;
use crm_common::{Module, OrganizationMember, Permission, Role};
use uuid::Uuid;
use validator::Validate;

use super::types::{CreateRoleRequest, UpdateRoleRequest};
use super::{is_owner_role, load_organization, load_role, OrganizationError};
use crate::permissions::{require_member_permission, RolePreset};
use crate::state::AppState;

/// Roles of an organization, system presets first, then custom roles in
/// creation order.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn list_roles(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
) -> Result<Vec<Role>, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Settings, Permission::View)?;
    let mut roles = state.store.roles().list_by_organization(organization_id);
    roles.sort_by_key(|r| (!r.is_system, r.id));
    Ok(roles)
}

/// Create a custom role.
#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn create_role(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    body: CreateRoleRequest,
) -> Result<Role, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Settings, Permission::Edit)?;
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;
    load_organization(state, organization_id)?;

    let now = Utc::now();
    let role = state.store.roles().insert(Role {
        id: Uuid::now_v7(),
        organization_id,
        name: body.name.trim().to_string(),
        description: body.description.unwrap_or_default(),
        permissions: body
            .permissions
            .unwrap_or_else(|| RolePreset::Member.permissions()),
        is_default: false,
        is_system: false,
        created_at: now,
        updated_at: now,
    })?;

    state.persist()?;
    tracing::info!(%organization_id, role_id = %role.id, name = %role.name, "Role created");

    Ok(role)
}

/// Edit a custom role. Member snapshots are left as they are.
#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn update_role(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    role_id: Uuid,
    body: UpdateRoleRequest,
) -> Result<Role, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Settings, Permission::Edit)?;
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;

    let mut role = load_role(state, organization_id, role_id)?;
    if role.is_system {
        return Err(OrganizationError::SystemRole);
    }

    if let Some(name) = body.name {
        role.name = name.trim().to_string();
    }
    if let Some(description) = body.description {
        role.description = description;
    }
    if let Some(permissions) = body.permissions {
        role.permissions = permissions;
    }
    role.updated_at = Utc::now();

    let role = state.store.roles().update(role)?;
    state.persist()?;
    tracing::info!(%organization_id, role_id = %role.id, "Role updated");

    Ok(role)
}

/// Delete a custom role that is neither the default nor held by any member.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn delete_role(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    role_id: Uuid,
) -> Result<Role, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Settings, Permission::Edit)?;

    let organization = load_organization(state, organization_id)?;
    let role = load_role(state, organization_id, role_id)?;
    if role.is_system {
        return Err(OrganizationError::SystemRole);
    }
    if role.is_default || organization.settings.default_role_id == role.id {
        return Err(OrganizationError::RoleIsDefault);
    }

    let holders = state
        .store
        .members()
        .list_by_organization(organization_id)
        .iter()
        .filter(|m| m.role.id == role.id)
        .count();
    if holders > 0 {
        return Err(OrganizationError::RoleInUse(holders));
    }

    let removed = state.store.roles().remove(role.id)?;
    state.persist()?;
    tracing::info!(%organization_id, role_id = %removed.id, "Role deleted");

    Ok(removed)
}

/// Make `role_id` the role assigned to members joining without one.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn set_default_role(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    role_id: Uuid,
) -> Result<Role, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Settings, Permission::Edit)?;

    let mut organization = load_organization(state, organization_id)?;
    let mut role = load_role(state, organization_id, role_id)?;
    if is_owner_role(&role) {
        return Err(OrganizationError::OwnerRoleReserved);
    }
    let now = Utc::now();

    for mut previous in state.store.roles().list_by_organization(organization_id) {
        if previous.is_default && previous.id != role.id {
            previous.is_default = false;
            previous.updated_at = now;
            state.store.roles().update(previous)?;
        }
    }

    if !role.is_default {
        role.is_default = true;
        role.updated_at = now;
        role = state.store.roles().update(role)?;
    }

    organization.settings.default_role_id = role.id;
    organization.updated_at = now;
    state.store.organizations().update(organization)?;

    state.persist()?;
    tracing::info!(%organization_id, role_id = %role.id, "Default role changed");

    Ok(role)
}

/// Overwrite every member snapshot of `role_id` with the current role.
///
/// Returns the number of members updated. Each member record is replaced
/// independently; a concurrent member edit may win over this pass.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn propagate_role(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    role_id: Uuid,
) -> Result<usize, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Settings, Permission::Edit)?;
    let role = load_role(state, organization_id, role_id)?;

    let mut updated = 0;
    for mut member in state.store.members().list_by_organization(organization_id) {
        if member.role.id != role.id || member.role == role {
            continue;
        }
        member.role = role.clone();
        state.store.members().update(member)?;
        updated += 1;
    }

    state.persist()?;
    tracing::info!(%organization_id, role_id = %role.id, updated, "Role propagated to members");

    Ok(updated)
}
