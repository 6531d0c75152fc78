//! Team handlers.
//!
//! Membership is stored on the member record as a list of team ids.

use chrono::Utc;
use crm_common::{Module, OrganizationMember, Permission, Team};
use uuid::Uuid;
use validator::Validate;

use super::types::{CreateTeamRequest, TeamWithMemberCount, UpdateTeamRequest};
use super::{dedup_ids, load_member, load_organization, load_team, OrganizationError};
use crate::permissions::require_member_permission;
use crate::state::AppState;

/// Teams of an organization with their member counts.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn list_teams(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
) -> Result<Vec<TeamWithMemberCount>, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::View)?;

    let members = state.store.members().list_by_organization(organization_id);
    let teams = state
        .store
        .teams()
        .list_by_organization(organization_id)
        .into_iter()
        .map(|team| {
            let member_count = members
                .iter()
                .filter(|m| m.team_ids.contains(&team.id))
                .count();
            TeamWithMemberCount { team, member_count }
        })
        .collect();

    Ok(teams)
}

/// Create a team, optionally adding initial members.
#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn create_team(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    body: CreateTeamRequest,
) -> Result<Team, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::Create)?;
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;
    load_organization(state, organization_id)?;

    if let Some(leader_id) = body.leader_id {
        load_member(state, organization_id, leader_id)?;
    }
    // Resolve every initial member before writing anything
    let initial_members = dedup_ids(&body.member_ids)
        .into_iter()
        .map(|id| load_member(state, organization_id, id))
        .collect::<Result<Vec<_>, _>>()?;

    let now = Utc::now();
    let team = state.store.teams().insert(Team {
        id: Uuid::now_v7(),
        organization_id,
        name: body.name.trim().to_string(),
        description: body.description,
        color: body
            .color
            .unwrap_or_else(|| state.config.default_team_color.clone()),
        leader_id: body.leader_id,
        created_at: now,
        updated_at: now,
    })?;

    for mut member in initial_members {
        if !member.team_ids.contains(&team.id) {
            member.team_ids.push(team.id);
            state.store.members().update(member)?;
        }
    }

    state.persist()?;
    tracing::info!(%organization_id, team_id = %team.id, name = %team.name, "Team created");

    Ok(team)
}

#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn update_team(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    team_id: Uuid,
    body: UpdateTeamRequest,
) -> Result<Team, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::Edit)?;
    body.validate()
        .map_err(|e| OrganizationError::Validation(e.to_string()))?;

    let mut team = load_team(state, organization_id, team_id)?;

    if let Some(name) = body.name {
        team.name = name.trim().to_string();
    }
    if body.description.is_some() {
        team.description = body.description;
    }
    if let Some(color) = body.color {
        team.color = color;
    }
    if let Some(leader_id) = body.leader_id {
        load_member(state, organization_id, leader_id)?;
        team.leader_id = Some(leader_id);
    }
    team.updated_at = Utc::now();

    let team = state.store.teams().update(team)?;
    state.persist()?;
    tracing::info!(%organization_id, team_id = %team.id, "Team updated");

    Ok(team)
}

/// Delete a team and drop it from member records and pending invitations.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn delete_team(
    state: &AppState,
    actor: &OrganizationMember,
    organization_id: Uuid,
    team_id: Uuid,
) -> Result<Team, OrganizationError> {
    require_member_permission(actor, organization_id, Module::Team, Permission::Delete)?;
    let team = load_team(state, organization_id, team_id)?;

    for mut member in state.store.members().list_by_organization(organization_id) {
        if member.team_ids.contains(&team.id) {
            member.team_ids.retain(|id| *id != team.id);
            state.store.members().update(member)?;
        }
    }
    for mut invitation in state.store.invitations().list_by_organization(organization_id) {
        if invitation.team_ids.contains(&team.id) {
            invitation.team_ids.retain(|id| *id != team.id);
            state.store.invitations().update(invitation)?;
        }
    }

    let removed = state.store.teams().remove(team.id)?;
    state.persist()?;
    tracing::info!(%organization_id, team_id = %removed.id, "Team deleted");

    Ok(removed)
}
