//! Default role presets.
//!
//! Every organization is seeded with five system roles built from this table.
//! The grants are part of the stored data format and must not drift.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use crm_common::{Module, ModulePermissions, PermissionMatrix, Role};
use uuid::Uuid;

type P = ModulePermissions;

const OWNER: PermissionMatrix = PermissionMatrix::from_grants([P::FULL; Module::COUNT]);

const ADMIN: PermissionMatrix = PermissionMatrix::from_grants([
    P::FULL,                        // contacts
    P::FULL,                        // leads
    P::FULL,                        // deals
    P::FULL,                        // tasks
    P::FULL,                        // reports
    P::VIEW.union(P::EDIT),         // settings
    P::CONTRIBUTE.union(P::DELETE), // team
    P::VIEW.union(P::EDIT),         // organization
]);

const MANAGER: PermissionMatrix = PermissionMatrix::from_grants([
    P::CONTRIBUTE.union(P::EXPORT),            // contacts
    P::CONTRIBUTE.union(P::EXPORT),            // leads
    P::CONTRIBUTE.union(P::EXPORT),            // deals
    P::CONTRIBUTE.union(P::DELETE),            // tasks
    P::VIEW.union(P::CREATE).union(P::EXPORT), // reports
    P::READ_ONLY,                              // settings
    P::VIEW.union(P::EDIT),                    // team
    P::READ_ONLY,                              // organization
]);

const MEMBER: PermissionMatrix = PermissionMatrix::from_grants([
    P::CONTRIBUTE, // contacts
    P::CONTRIBUTE, // leads
    P::CONTRIBUTE, // deals
    P::CONTRIBUTE, // tasks
    P::READ_ONLY,  // reports
    P::READ_ONLY,  // settings
    P::READ_ONLY,  // team
    P::READ_ONLY,  // organization
]);

const VIEWER: PermissionMatrix = PermissionMatrix::from_grants([
    P::READ_ONLY, // contacts
    P::READ_ONLY, // leads
    P::READ_ONLY, // deals
    P::READ_ONLY, // tasks
    P::READ_ONLY, // reports
    P::empty(),   // settings
    P::READ_ONLY, // team
    P::READ_ONLY, // organization
]);

/// One of the five built-in role templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RolePreset {
    Owner,
    Admin,
    Manager,
    Member,
    Viewer,
}

impl RolePreset {
    /// All presets, in seeding order.
    pub const ALL: [Self; 5] = [
        Self::Owner,
        Self::Admin,
        Self::Manager,
        Self::Member,
        Self::Viewer,
    ];

    /// Table key of the preset.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Admin => "Admin",
            Self::Manager => "Manager",
            Self::Member => "Member",
            Self::Viewer => "Viewer",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Owner => "Full access to all features and settings",
            Self::Admin => "Full access except billing and organization deletion",
            Self::Manager => "Can manage team data and export reports",
            Self::Member => "Can view and edit assigned records",
            Self::Viewer => "Read-only access to data",
        }
    }

    /// Grant table for this preset.
    #[must_use]
    pub const fn permissions(self) -> PermissionMatrix {
        match self {
            Self::Owner => OWNER,
            Self::Admin => ADMIN,
            Self::Manager => MANAGER,
            Self::Member => MEMBER,
            Self::Viewer => VIEWER,
        }
    }

    /// Whether new members receive this preset when no role is chosen.
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Member)
    }

    /// Materialize this preset as a system role of `organization_id`.
    #[must_use]
    pub fn to_role(self, organization_id: Uuid, now: DateTime<Utc>) -> Role {
        Role {
            id: Uuid::now_v7(),
            organization_id,
            name: self.display_name().to_string(),
            description: self.description().to_string(),
            permissions: self.permissions(),
            is_default: self.is_default(),
            is_system: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Display for RolePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RolePreset {
    type Err = crm_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or_else(|| crm_common::Error::UnknownPreset(s.to_string()))
    }
}

/// The five system roles seeded for a new organization, in preset order.
#[must_use]
pub fn system_roles(organization_id: Uuid, now: DateTime<Utc>) -> Vec<Role> {
    RolePreset::ALL
        .into_iter()
        .map(|preset| preset.to_role(organization_id, now))
        .collect()
}
