//! Permission Types
//!
//! Access control is organized per functional area ([`Module`]). A role grants
//! each module a set of capabilities ([`Permission`]), stored as a compact
//! bitfield ([`ModulePermissions`]). Holding [`Permission::Admin`] on a module
//! implies every other capability on that module.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ============================================================================
// Module
// ============================================================================

/// Functional area subject to independent access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Contacts,
    Leads,
    Deals,
    Tasks,
    Reports,
    Settings,
    Team,
    Organization,
}

impl Module {
    /// Number of modules.
    pub const COUNT: usize = 8;

    /// Every module, in canonical order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Contacts,
        Self::Leads,
        Self::Deals,
        Self::Tasks,
        Self::Reports,
        Self::Settings,
        Self::Team,
        Self::Organization,
    ];

    /// Wire name of the module.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Leads => "leads",
            Self::Deals => "deals",
            Self::Tasks => "tasks",
            Self::Reports => "reports",
            Self::Settings => "settings",
            Self::Team => "team",
            Self::Organization => "organization",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Contacts => "Contacts",
            Self::Leads => "Leads",
            Self::Deals => "Deals",
            Self::Tasks => "Tasks",
            Self::Reports => "Reports",
            Self::Settings => "Settings",
            Self::Team => "Team",
            Self::Organization => "Organization",
        }
    }

    /// Short description shown next to the module in role editors.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Contacts => "Manage customer contacts",
            Self::Leads => "Manage sales leads",
            Self::Deals => "Manage sales deals",
            Self::Tasks => "Manage tasks and activities",
            Self::Reports => "View and create reports",
            Self::Settings => "Organization settings",
            Self::Team => "Manage team members",
            Self::Organization => "Organization management",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnknownModule(s.to_string()))
    }
}

// ============================================================================
// Permission
// ============================================================================

/// Capability that can be granted on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Create,
    Edit,
    Delete,
    Export,
    /// Superset grant: implies every other permission on the same module.
    Admin,
}

impl Permission {
    /// Every permission, in canonical order.
    pub const ALL: [Self; 6] = [
        Self::View,
        Self::Create,
        Self::Edit,
        Self::Delete,
        Self::Export,
        Self::Admin,
    ];

    /// Wire name of the permission.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::Admin => "admin",
        }
    }

    /// The single-bit set for this permission.
    #[must_use]
    pub const fn flag(self) -> ModulePermissions {
        match self {
            Self::View => ModulePermissions::VIEW,
            Self::Create => ModulePermissions::CREATE,
            Self::Edit => ModulePermissions::EDIT,
            Self::Delete => ModulePermissions::DELETE,
            Self::Export => ModulePermissions::EXPORT,
            Self::Admin => ModulePermissions::ADMIN,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::UnknownPermission(s.to_string()))
    }
}

// ============================================================================
// ModulePermissions
// ============================================================================

bitflags! {
    /// Permissions granted on a single module.
    ///
    /// Serialized as a JSON array of permission names, e.g. `["view","edit"]`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModulePermissions: u8 {
        const VIEW   = 1 << 0;
        const CREATE = 1 << 1;
        const EDIT   = 1 << 2;
        const DELETE = 1 << 3;
        const EXPORT = 1 << 4;
        const ADMIN  = 1 << 5;
    }
}

impl ModulePermissions {
    // === Preset Combinations ===

    /// `view`
    pub const READ_ONLY: Self = Self::VIEW;

    /// `view`, `create`, `edit`
    pub const CONTRIBUTE: Self = Self::VIEW.union(Self::CREATE).union(Self::EDIT);

    /// Every permission including `admin`.
    pub const FULL: Self = Self::all();

    /// Whether `permission` is explicitly present in this set.
    ///
    /// Does not apply the admin superset rule; see [`Self::grants`].
    #[must_use]
    pub const fn has(self, permission: Permission) -> bool {
        self.contains(permission.flag())
    }

    /// Whether this set authorizes `permission`.
    ///
    /// True if the permission is present or if `admin` is present.
    ///
    /// # Examples
    ///
    /// ```
    /// use crm_common::{ModulePermissions, Permission};
    ///
    /// let perms = ModulePermissions::VIEW | ModulePermissions::ADMIN;
    /// assert!(perms.grants(Permission::Delete));
    /// assert!(!ModulePermissions::VIEW.grants(Permission::Edit));
    /// ```
    #[must_use]
    pub const fn grants(self, permission: Permission) -> bool {
        self.has(permission) || self.contains(Self::ADMIN)
    }

    /// Explicitly present permissions, in canonical order.
    pub fn permissions(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.has(*p))
    }
}

impl Default for ModulePermissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Permission> for ModulePermissions {
    fn from(permission: Permission) -> Self {
        permission.flag()
    }
}

impl FromIterator<Permission> for ModulePermissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |acc, p| acc.union(p.flag()))
    }
}

impl Serialize for ModulePermissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.permissions())
    }
}

impl<'de> Deserialize<'de> for ModulePermissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<Permission>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}

// ============================================================================
// PermissionMatrix
// ============================================================================

/// Total mapping from every [`Module`] to its granted permissions.
///
/// Every module always has an entry; an empty set means no access.
/// Serialized as an object keyed by module name. Keys missing on input are
/// read as empty sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PermissionMatrix {
    grants: [ModulePermissions; Module::COUNT],
}

impl PermissionMatrix {
    /// Matrix granting nothing on any module.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            grants: [ModulePermissions::empty(); Module::COUNT],
        }
    }

    /// Build a matrix from grants listed in [`Module::ALL`] order.
    #[must_use]
    pub const fn from_grants(grants: [ModulePermissions; Module::COUNT]) -> Self {
        Self { grants }
    }

    /// Permissions granted on `module`.
    #[must_use]
    pub const fn get(&self, module: Module) -> ModulePermissions {
        self.grants[module.index()]
    }

    /// Replace the permissions granted on `module`.
    pub fn set(&mut self, module: Module, permissions: ModulePermissions) {
        self.grants[module.index()] = permissions;
    }

    /// Builder-style variant of [`Self::set`].
    #[must_use]
    pub fn with(mut self, module: Module, permissions: ModulePermissions) -> Self {
        self.set(module, permissions);
        self
    }

    /// Iterate `(module, permissions)` pairs in canonical module order.
    pub fn iter(&self) -> impl Iterator<Item = (Module, ModulePermissions)> + '_ {
        Module::ALL.into_iter().map(|m| (m, self.get(m)))
    }

    /// Total number of explicit grants across all modules.
    #[must_use]
    pub fn grant_count(&self) -> usize {
        self.grants.iter().map(|p| p.bits().count_ones() as usize).sum()
    }

    /// Upper bound for [`Self::grant_count`].
    #[must_use]
    pub const fn max_grant_count() -> usize {
        Module::COUNT * Permission::ALL.len()
    }
}

impl Serialize for PermissionMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Module::COUNT))?;
        for (module, permissions) in self.iter() {
            map.serialize_entry(&module, &permissions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PermissionMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries =
            std::collections::BTreeMap::<Module, ModulePermissions>::deserialize(deserializer)?;
        let mut matrix = Self::empty();
        for (module, permissions) in entries {
            matrix.set(module, permissions);
        }
        Ok(matrix)
    }
}

// ============================================================================
// Role
// ============================================================================

/// Named, organization-scoped bundle of per-module grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: String,
    pub permissions: PermissionMatrix,
    /// Assigned to members who join without an explicit role.
    pub is_default: bool,
    /// System roles cannot be edited or deleted.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Raw grants on `module`.
    #[must_use]
    pub const fn grants(&self, module: Module) -> ModulePermissions {
        self.permissions.get(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Bit Position Tests ===

    #[test]
    fn test_permission_bits() {
        assert_eq!(ModulePermissions::VIEW.bits(), 1 << 0);
        assert_eq!(ModulePermissions::CREATE.bits(), 1 << 1);
        assert_eq!(ModulePermissions::EDIT.bits(), 1 << 2);
        assert_eq!(ModulePermissions::DELETE.bits(), 1 << 3);
        assert_eq!(ModulePermissions::EXPORT.bits(), 1 << 4);
        assert_eq!(ModulePermissions::ADMIN.bits(), 1 << 5);
    }

    #[test]
    fn test_flag_matches_enum() {
        for permission in Permission::ALL {
            let flag = permission.flag();
            assert_eq!(flag.bits().count_ones(), 1);
            assert_eq!(flag.permissions().collect::<Vec<_>>(), vec![permission]);
        }
    }

    // === Grant Tests ===

    #[test]
    fn test_grants_explicit_permission() {
        let perms = ModulePermissions::VIEW | ModulePermissions::EDIT;
        assert!(perms.grants(Permission::View));
        assert!(perms.grants(Permission::Edit));
        assert!(!perms.grants(Permission::Delete));
        assert!(!perms.grants(Permission::Admin));
    }

    #[test]
    fn test_admin_grants_everything() {
        let perms = ModulePermissions::ADMIN;
        for permission in Permission::ALL {
            assert!(perms.grants(permission), "{permission} should be implied");
        }
        assert!(!perms.has(Permission::View));
    }

    #[test]
    fn test_empty_grants_nothing() {
        let perms = ModulePermissions::default();
        assert!(perms.is_empty());
        for permission in Permission::ALL {
            assert!(!perms.grants(permission));
        }
    }

    #[test]
    fn test_collect_collapses_duplicates() {
        let perms: ModulePermissions = [Permission::Edit, Permission::View, Permission::Edit]
            .into_iter()
            .collect();
        assert_eq!(perms, ModulePermissions::VIEW | ModulePermissions::EDIT);
    }

    // === Parsing Tests ===

    #[test]
    fn test_module_from_str() {
        for module in Module::ALL {
            assert_eq!(module.as_str().parse::<Module>(), Ok(module));
        }
        assert_eq!(
            "billing".parse::<Module>(),
            Err(Error::UnknownModule("billing".into()))
        );
    }

    #[test]
    fn test_permission_from_str() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>(), Ok(permission));
        }
        assert_eq!(
            "Admin".parse::<Permission>(),
            Err(Error::UnknownPermission("Admin".into()))
        );
    }

    // === Serde Tests ===

    #[test]
    fn test_serialize_module_permissions_as_list() {
        let perms = ModulePermissions::EXPORT | ModulePermissions::VIEW;
        let json = serde_json::to_string(&perms).unwrap();
        assert_eq!(json, r#"["view","export"]"#);
    }

    #[test]
    fn test_serialize_empty_module_permissions() {
        let json = serde_json::to_string(&ModulePermissions::empty()).unwrap();
        assert_eq!(json, "[]");
    }

    #[test]
    fn test_deserialize_rejects_unknown_permission() {
        let result: std::result::Result<ModulePermissions, _> =
            serde_json::from_str(r#"["view","approve"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_matrix_serializes_every_module() {
        let matrix = PermissionMatrix::empty().with(Module::Leads, ModulePermissions::VIEW);
        let value = serde_json::to_value(matrix).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), Module::COUNT);
        assert_eq!(object["leads"], serde_json::json!(["view"]));
        assert_eq!(object["settings"], serde_json::json!([]));
    }

    #[test]
    fn test_matrix_missing_keys_are_empty() {
        let matrix: PermissionMatrix =
            serde_json::from_str(r#"{"contacts":["view","admin"]}"#).unwrap();

        assert_eq!(
            matrix.get(Module::Contacts),
            ModulePermissions::VIEW | ModulePermissions::ADMIN
        );
        assert!(matrix.get(Module::Organization).is_empty());
    }

    #[test]
    fn test_matrix_rejects_unknown_module() {
        let result: std::result::Result<PermissionMatrix, _> =
            serde_json::from_str(r#"{"billing":["view"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_grant_count() {
        let matrix = PermissionMatrix::empty()
            .with(Module::Contacts, ModulePermissions::FULL)
            .with(Module::Team, ModulePermissions::CONTRIBUTE);
        assert_eq!(matrix.grant_count(), 9);
        assert_eq!(PermissionMatrix::max_grant_count(), 48);
    }
}
