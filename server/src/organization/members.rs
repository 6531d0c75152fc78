//! Organization membership handlers.

use chrono::{DateTime, Utc};
use crm_common::{
    MemberStatus, Module, Organization, OrganizationMember, Permission, Role, UserProfile,
};
use uuid::Uuid;
use validator::Validate;

use super::types::UpdateMemberRequest;
use super::{
    dedup_ids, ensure_teams_exist, is_owner_role, load_member, load_organization, load_role,
    OrganizationError,
};
use crate::permissions::require_member_permission;
use crate::state::AppState;

/// Build an active member record for `profile` holding a snapshot of `role`.
pub(crate) fn new_member(
    organization: &Organization,
    profile: &UserProfile,
    role: Role,
    team_ids: Vec<Uuid>,
    now: DateTime<Utc>,
) -> OrganizationMember {
    OrganizationMember {
        id: Uuid::now_v7(),
        user_id: profile.id,
        organization_id: organization.id,
        email: profile.email.clone(),
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        job_title: None,
        phone: None,
        status: MemberStatus::Active,
        role,
        team_ids,
        joined_at: now,
        last_active_at: Some(now),
    }
}

pub(crate) fn find_membership(
    state: &AppState,
    organization_id: Uuid,
    user_id: Uuid,
) -> Option<OrganizationMember> {
    state
        .store
        .members()
        .list_by_organization(organization_id)
        .into_iter()
        .find(|m| m.user_id == user_id)
}

/// Enroll `profile` in `organization` with `role`, rejecting duplicates.
pub(crate) fn enroll(
    state: &AppState,
    organization: &Organization,
    profile: &UserProfile,
    role: Role,
    team_ids: Vec<Uuid>,
) -> Result<OrganizationMember, OrganizationError> {
    if find_membership(state, organization.id, profile.id).is_some() {
        return Err(OrganizationError::AlreadyMember);
    }
    let member = new_member(organization, profile, role, team_ids, Utc::now());
    Ok(state.store.members().insert(member)?)
}

/// Members of an organization, in join order.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn list_members(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
) -> Result<Vec<OrganizationMember>, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::View)?;
    let mut members = state.store.members().list_by_organization(organization_id);
    members.sort_by_key(|m| m.joined_at);
    Ok(members)
}

/// Join an organization directly.
///
/// Without `role_id` the organization's default role is assigned.
#[tracing::instrument(skip(state, profile), fields(user_id = %profile.id))]
pub fn join_organization(
    state: &AppState,
    organization_id: Uuid,
    profile: &UserProfile,
    role_id: Option<Uuid>,
) -> Result<OrganizationMember, OrganizationError> {
    let organization = load_organization(state, organization_id)?;
    let role_id = role_id.unwrap_or(organization.settings.default_role_id);
    let role = load_role(state, organization_id, role_id)?;
    if is_owner_role(&role) {
        return Err(OrganizationError::OwnerRoleReserved);
    }

    let member = enroll(state, &organization, profile, role, Vec::new())?;
    state.persist()?;
    tracing::info!(
        %organization_id,
        member_id = %member.id,
        role = %member.role.name,
        "Member joined"
    );

    Ok(member)
}

/// Change a member's role, status, profile fields or teams.
///
/// The owner keeps the owner role and status; the owner role cannot be
/// given to anyone else.
#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn update_member(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    member_id: Uuid,
    body: UpdateMemberRequest,
) -> Result<OrganizationMember, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::Edit)?;
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;

    let organization = load_organization(state, organization_id)?;
    let mut member = load_member(state, organization_id, member_id)?;
    let is_owner = member.user_id == organization.owner_id;

    if let Some(role_id) = body.role_id {
        if is_owner && role_id != member.role.id {
            return Err(OrganizationError::OwnerProtected);
        }
        let role = load_role(state, organization_id, role_id)?;
        if !is_owner && is_owner_role(&role) {
            return Err(OrganizationError::OwnerRoleReserved);
        }
        member.role = role;
    }
    if let Some(status) = body.status {
        if is_owner && status != member.status {
            return Err(OrganizationError::OwnerProtected);
        }
        member.status = status;
    }
    if body.job_title.is_some() {
        member.job_title = body.job_title;
    }
    if body.phone.is_some() {
        member.phone = body.phone;
    }
    if let Some(team_ids) = body.team_ids {
        ensure_teams_exist(state, organization_id, &team_ids)?;
        member.team_ids = dedup_ids(&team_ids);
    }

    let member = state.store.members().update(member)?;
    state.persist()?;
    tracing::info!(
        %organization_id,
        target_member_id = %member.id,
        role = %member.role.name,
        "Member updated"
    );

    Ok(member)
}

/// Remove a member. The organization owner cannot be removed.
///
/// Teams led by the member lose their leader.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn remove_member(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    member_id: Uuid,
) -> Result<OrganizationMember, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::Delete)?;

    let organization = load_organization(state, organization_id)?;
    let member = load_member(state, organization_id, member_id)?;
    if member.user_id == organization.owner_id {
        return Err(OrganizationError::CannotRemoveOwner);
    }

    for mut team in state.store.teams().list_by_organization(organization_id) {
        if team.leader_id == Some(member.id) {
            team.leader_id = None;
            team.updated_at = Utc::now();
            state.store.teams().update(team)?;
        }
    }
    let removed = state.store.members().remove(member.id)?;
    state.persist()?;
    tracing::info!(%organization_id, target_member_id = %removed.id, "Member removed");

    Ok(removed)
}
