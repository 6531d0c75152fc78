//! Organization Types
//!
//! Multi-tenancy entities: organizations, teams, members and invitations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permissions::Role;

/// Organization head-count bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganizationSize {
    #[serde(rename = "solo")]
    Solo,
    #[serde(rename = "2-10")]
    Small,
    #[serde(rename = "11-50")]
    Medium,
    #[serde(rename = "51-200")]
    Large,
    #[serde(rename = "201-500")]
    XLarge,
    #[serde(rename = "500+")]
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Technology,
    Healthcare,
    Finance,
    Retail,
    Manufacturing,
    Education,
    RealEstate,
    Consulting,
    Marketing,
    Legal,
    Other,
}

/// Membership state of an organization member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

/// Per-organization preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    /// Role given to members who join without an explicit role.
    pub default_role_id: Uuid,
    pub allow_member_invites: bool,
    pub require_two_factor: bool,
    pub timezone: String,
    pub date_format: String,
    pub currency: String,
}

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// URL-friendly identifier derived from the name.
    pub slug: String,
    pub logo_url: Option<String>,
    pub industry: Option<Industry>,
    pub size: Option<OrganizationSize>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub settings: OrganizationSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Hex color for UI identification.
    pub color: String,
    pub leader_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Association of a user with an organization.
///
/// `role` is a denormalized snapshot of the assigned role, not a reference.
/// Edits to the role are only visible here after they are propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub status: MemberStatus,
    pub role: Role,
    pub team_ids: Vec<Uuid>,
    pub joined_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl OrganizationMember {
    /// Display name, `"First Last"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub team_ids: Vec<Uuid>,
    pub status: InvitationStatus,
    pub invited_by: Uuid,
    pub invited_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub token: String,
}

impl Invitation {
    /// Whether the invitation has passed its expiry time at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
