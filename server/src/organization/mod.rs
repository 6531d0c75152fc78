//! Organization management.
//!
//! Organizations, their roles, members, teams and invitations. Every service
//! function takes the acting member and checks the required permission before
//! touching the store; entry points reached before membership exists
//! (`create_organization`, `join_organization`, `accept_invitation`) take a
//! [`UserProfile`](crm_common::UserProfile) instead.

pub mod handlers;
pub mod invites;
pub mod members;
pub mod roles;
pub mod teams;
pub mod types;

use crm_common::{Organization, OrganizationMember, Role, Team};
use thiserror::Error;
use uuid::Uuid;

use crate::permissions::{PermissionError, RolePreset};
use crate::state::AppState;
use crate::store::StoreError;

pub use handlers::{
    create_organization, get_organization, list_organizations, slugify, update_organization,
};
pub use invites::{accept_invitation, cancel_invitation, invite_member, list_invitations};
pub use members::{join_organization, list_members, remove_member, update_member};
pub use roles::{
    create_role, delete_role, list_roles, propagate_role, set_default_role, update_role,
};
pub use teams::{create_team, delete_team, list_teams, update_team};
pub use types::*;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum OrganizationError {
    #[error("Organization not found")]
    NotFound,

    #[error("Role not found")]
    RoleNotFound,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Team not found")]
    TeamNotFound,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Permission(#[from] PermissionError),

    #[error("System roles cannot be modified")]
    SystemRole,

    #[error("Role is assigned to {0} member(s)")]
    RoleInUse(usize),

    #[error("The default role cannot be deleted")]
    RoleIsDefault,

    #[error("The organization owner cannot be removed")]
    CannotRemoveOwner,

    #[error("The organization owner's role and status cannot be changed")]
    OwnerProtected,

    #[error("The owner role is reserved for the organization owner")]
    OwnerRoleReserved,

    #[error("User is already a member of this organization")]
    AlreadyMember,

    #[error("Member invitations are disabled for this organization")]
    InvitesDisabled,

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation lifetime of {0} days is out of range")]
    InvalidExpiry(i64),

    #[error("Invitation is no longer pending")]
    InvitationNotPending,

    #[error("Invitation was issued to a different email address")]
    InvitationEmailMismatch,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// Lookups
// ============================================================================

pub(crate) fn load_organization(
    state: &AppState,
    organization_id: Uuid,
) -> Result<Organization, OrganizationError> {
    state
        .store
        .organizations()
        .get(organization_id)
        .ok_or(OrganizationError::NotFound)
}

/// Role `role_id`, only if it belongs to `organization_id`.
pub(crate) fn load_role(
    state: &AppState,
    organization_id: Uuid,
    role_id: Uuid,
) -> Result<Role, OrganizationError> {
    state
        .store
        .roles()
        .get(role_id)
        .filter(|r| r.organization_id == organization_id)
        .ok_or(OrganizationError::RoleNotFound)
}

pub(crate) fn load_member(
    state: &AppState,
    organization_id: Uuid,
    member_id: Uuid,
) -> Result<OrganizationMember, OrganizationError> {
    state
        .store
        .members()
        .get(member_id)
        .filter(|m| m.organization_id == organization_id)
        .ok_or(OrganizationError::MemberNotFound)
}

pub(crate) fn load_team(
    state: &AppState,
    organization_id: Uuid,
    team_id: Uuid,
) -> Result<Team, OrganizationError> {
    state
        .store
        .teams()
        .get(team_id)
        .filter(|t| t.organization_id == organization_id)
        .ok_or(OrganizationError::TeamNotFound)
}

/// Fail unless every id names a team of `organization_id`.
pub(crate) fn ensure_teams_exist(
    state: &AppState,
    organization_id: Uuid,
    team_ids: &[Uuid],
) -> Result<(), OrganizationError> {
    for team_id in team_ids {
        load_team(state, organization_id, *team_id)?;
    }
    Ok(())
}

/// Drop duplicate ids, keeping the first occurrence.
/// Whether `role` is the organization's seeded owner role.
pub(crate) fn is_owner_role(role: &Role) -> bool {
    role.is_system && role.name == RolePreset::Owner.display_name()
}

pub(crate) fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}
