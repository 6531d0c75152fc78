//! Shared setup for integration tests.
//!
//! Builds an in-memory [`AppState`] and seeds an organization so tests can
//! act through real members holding each preset role.
#![allow(dead_code)]

use crm_common::{OrganizationMember, Role, UserProfile};
use crm_server::config::Config;
use crm_server::organization::{
    create_organization, join_organization, CreateOrganizationRequest, CreatedOrganization,
};
use crm_server::permissions::RolePreset;
use crm_server::state::AppState;
use uuid::Uuid;

/// Fresh state over an empty in-memory store.
pub fn test_state() -> AppState {
    AppState::in_memory(Config::default_for_test())
}

/// Profile with a unique id and the given email.
pub fn profile(email: &str) -> UserProfile {
    let (local, _) = email.split_once('@').unwrap_or((email, ""));
    UserProfile {
        id: Uuid::now_v7(),
        email: email.to_string(),
        first_name: local.to_string(),
        last_name: "Tester".to_string(),
        avatar_url: None,
    }
}

/// Create an organization named `name`, owned by a fresh profile.
pub fn create_org(state: &AppState, name: &str) -> CreatedOrganization {
    let slug = name.to_lowercase().replace(' ', "");
    create_organization(
        state,
        &profile(&format!("owner@{slug}.test")),
        CreateOrganizationRequest {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .expect("organization should be created")
}

/// The organization's system role for `preset`.
pub fn preset_role(state: &AppState, organization_id: Uuid, preset: RolePreset) -> Role {
    state
        .store
        .roles()
        .list_by_organization(organization_id)
        .into_iter()
        .find(|r| r.is_system && r.name == preset.display_name())
        .expect("system role should be seeded")
}

/// Enroll a new member holding `preset`.
pub fn member_with(
    state: &AppState,
    organization_id: Uuid,
    preset: RolePreset,
    email: &str,
) -> OrganizationMember {
    let role = preset_role(state, organization_id, preset);
    join_organization(state, organization_id, &profile(email), Some(role.id))
        .expect("member should join")
}
