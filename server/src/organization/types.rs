//! Organization Request and Response Types

use crm_common::{
    Industry, MemberStatus, Organization, OrganizationMember, OrganizationSize, PermissionMatrix,
    Team,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Reject values that are empty once surrounding whitespace is removed.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Must not be blank".into()));
    }
    Ok(())
}

/// Names are stored trimmed, so the bounds apply to the trimmed value.
fn organization_name(value: &str) -> Result<(), ValidationError> {
    if (2..=100).contains(&value.trim().chars().count()) {
        Ok(())
    } else {
        Err(ValidationError::new("length").with_message("Name must be 2-100 characters".into()))
    }
}

// ============================================================================
// Organization
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(custom(function = "organization_name"))]
    pub name: String,
    pub industry: Option<Industry>,
    pub size: Option<OrganizationSize>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(url(message = "Logo URL must be a valid URL"))]
    pub logo_url: Option<String>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(custom(function = "organization_name"))]
    pub name: Option<String>,
    pub industry: Option<Industry>,
    pub size: Option<OrganizationSize>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(url(message = "Logo URL must be a valid URL"))]
    pub logo_url: Option<String>,
    pub allow_member_invites: Option<bool>,
    pub require_two_factor: Option<bool>,
    #[validate(length(min = 1, max = 64, message = "Timezone must be 1-64 characters"))]
    pub timezone: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Date format must be 1-32 characters"))]
    pub date_format: Option<String>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
}

/// A freshly created organization and its owner membership.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrganization {
    pub organization: Organization,
    pub owner: OrganizationMember,
}

// ============================================================================
// Roles
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(
        length(min = 1, max = 64, message = "Role name must be 1-64 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    /// Grants of the new role. Defaults to the member preset.
    pub permissions: Option<PermissionMatrix>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(
        length(min = 1, max = 64, message = "Role name must be 1-64 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    pub permissions: Option<PermissionMatrix>,
}

// ============================================================================
// Members
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    /// Assign a different role; the member receives a fresh snapshot.
    pub role_id: Option<Uuid>,
    pub status: Option<MemberStatus>,
    #[validate(length(max = 100, message = "Job title must be at most 100 characters"))]
    pub job_title: Option<String>,
    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
    /// Replaces the member's team list.
    pub team_ids: Option<Vec<Uuid>>,
}

// ============================================================================
// Teams
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(
        length(min = 1, max = 64, message = "Team name must be 1-64 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 4, max = 9, message = "Color must be a hex color"))]
    pub color: Option<String>,
    /// Member id of the team leader.
    pub leader_id: Option<Uuid>,
    /// Members added to the team on creation.
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(
        length(min = 1, max = 64, message = "Team name must be 1-64 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 4, max = 9, message = "Color must be a hex color"))]
    pub color: Option<String>,
    pub leader_id: Option<Uuid>,
}

/// Team with member count for list responses.
#[derive(Debug, Clone, Serialize)]
pub struct TeamWithMemberCount {
    #[serde(flatten)]
    pub team: Team,
    /// Number of members listing this team.
    pub member_count: usize,
}

// ============================================================================
// Invitations
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InviteMemberRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub role_id: Uuid,
    #[serde(default)]
    pub team_ids: Vec<Uuid>,
}
