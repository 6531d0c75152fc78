//! Organization Invitation Handlers

use chrono::{DateTime, Duration, Utc};
use crm_common::{
    Invitation, InvitationStatus, Module, OrganizationMember, Permission, UserProfile,
};
use rand::Rng;
use uuid::Uuid;
use validator::Validate;

use super::members::enroll;
use super::types::InviteMemberRequest;
use super::{
    dedup_ids, ensure_teams_exist, is_owner_role, load_organization, load_role, OrganizationError,
};
use crate::permissions::{require_member_permission, PermissionEngine};
use crate::state::AppState;

/// Generate a random 24-byte hex invitation token.
fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Expiry of an invitation issued at `now` that lives for `days`.
fn expiry_after(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, OrganizationError> {
    if days < 1 {
        return Err(OrganizationError::InvalidExpiry(days));
    }
    Duration::try_days(days)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(OrganizationError::InvalidExpiry(days))
}

/// Invite someone by email.
///
/// When the organization disables member invites only team admins may
/// invite.
#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn invite_member(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    body: InviteMemberRequest,
) -> Result<Invitation, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::Create)?;
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;

    let organization = load_organization(state, organization_id)?;
    if !organization.settings.allow_member_invites
        && !PermissionEngine::for_member(Some(actor)).is_admin(Module::Team)
    {
        return Err(OrganizationError::InvitesDisabled);
    }

    if is_owner_role(&load_role(state, organization_id, body.role_id)?) {
        return Err(OrganizationError::OwnerRoleReserved);
    }
    ensure_teams_exist(state, organization_id, &body.team_ids)?;

    let email = body.email.trim().to_lowercase();
    let already_member = state
        .store
        .members()
        .list_by_organization(organization_id)
        .iter()
        .any(|m| m.email.eq_ignore_ascii_case(&email));
    if already_member {
        return Err(OrganizationError::AlreadyMember);
    }

    let now = Utc::now();
    let expires_at = expiry_after(now, state.config.invitation_expiry_days)?;
    let invitation = state.store.invitations().insert(Invitation {
        id: Uuid::now_v7(),
        organization_id,
        email,
        role_id: body.role_id,
        team_ids: dedup_ids(&body.team_ids),
        status: InvitationStatus::Pending,
        invited_by: actor.id,
        invited_at: now,
        expires_at,
        accepted_at: None,
        token: generate_token(),
    })?;

    state.persist()?;
    tracing::info!(
        %organization_id,
        invitation_id = %invitation.id,
        expires_at = %invitation.expires_at,
        "Invitation created"
    );

    Ok(invitation)
}

/// Invitations of an organization, newest first.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn list_invitations(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
) -> Result<Vec<Invitation>, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::View)?;
    let mut invitations = state.store.invitations().list_by_organization(organization_id);
    invitations.sort_by(|a, b| b.invited_at.cmp(&a.invited_at));
    Ok(invitations)
}

/// Cancel a pending invitation.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn cancel_invitation(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    invitation_id: Uuid,
) -> Result<Invitation, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::Delete)?;

    let mut invitation = state
        .store
        .invitations()
        .get(invitation_id)
        .filter(|i| i.organization_id == organization_id)
        .ok_or(OrganizationError::InvitationNotFound)?;
    if invitation.status != InvitationStatus::Pending {
        return Err(OrganizationError::InvitationNotPending);
    }

    invitation.status = InvitationStatus::Cancelled;
    let invitation = state.store.invitations().update(invitation)?;
    state.persist()?;
    tracing::info!(%organization_id, invitation_id = %invitation.id, "Invitation cancelled");

    Ok(invitation)
}

/// Redeem an invitation token for `profile`.
///
/// The profile email must match the invited address. An invitation found
/// past its expiry is marked expired and rejected.
#[tracing::instrument(skip(state, token, profile), fields(user_id = %profile.id))]
pub fn accept_invitation(
    state: &AppState,
    token: &str,
    profile: &UserProfile,
) -> Result<OrganizationMember, OrganizationError> {
    let mut invitation = state
        .store
        .invitations()
        .list()
        .into_iter()
        .find(|i| i.token == token)
        .ok_or(OrganizationError::InvitationNotFound)?;

    if invitation.status != InvitationStatus::Pending {
        return Err(OrganizationError::InvitationNotPending);
    }
    let now = Utc::now();
    if invitation.is_expired_at(now) {
        invitation.status = InvitationStatus::Expired;
        state.store.invitations().update(invitation)?;
        state.persist()?;
        return Err(OrganizationError::InvitationExpired);
    }
    if !invitation.email.eq_ignore_ascii_case(profile.email.trim()) {
        return Err(OrganizationError::InvitationEmailMismatch);
    }

    let organization = load_organization(state, invitation.organization_id)?;
    let role = load_role(state, organization.id, invitation.role_id)?;
    // Teams deleted since the invitation was sent are skipped
    let team_ids: Vec<Uuid> = invitation
        .team_ids
        .iter()
        .copied()
        .filter(|id| state.store.teams().get(*id).is_some())
        .collect();

    let member = enroll(state, &organization, profile, role, team_ids)?;

    invitation.status = InvitationStatus::Accepted;
    invitation.accepted_at = Some(now);
    state.store.invitations().update(invitation)?;
    state.persist()?;
    tracing::info!(
        organization_id = %organization.id,
        member_id = %member.id,
        "Invitation accepted"
    );

    Ok(member)
}
