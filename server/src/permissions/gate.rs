//! Access requirements for gating actions.
//!
//! UI consumers describe what an action needs as an [`AccessRequirement`] and
//! show, hide or disable it depending on the answer. Service functions use
//! [`require`] to fail fast with a [`PermissionError`].

use crm_common::{Module, OrganizationMember, Permission, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::engine::{authorize, has_permission, PermissionEngine};

/// What an action needs on one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    pub module: Module,
    pub permissions: Vec<Permission>,
    /// AND semantics when true, OR otherwise.
    #[serde(default)]
    pub require_all: bool,
}

impl AccessRequirement {
    /// Requirement on a single permission.
    #[must_use]
    pub fn single(module: Module, permission: Permission) -> Self {
        Self {
            module,
            permissions: vec![permission],
            require_all: false,
        }
    }

    /// Satisfied by any one of `permissions`.
    #[must_use]
    pub fn any_of(module: Module, permissions: &[Permission]) -> Self {
        Self {
            module,
            permissions: permissions.to_vec(),
            require_all: false,
        }
    }

    /// Satisfied only by all of `permissions`.
    #[must_use]
    pub fn all_of(module: Module, permissions: &[Permission]) -> Self {
        Self {
            module,
            permissions: permissions.to_vec(),
            require_all: true,
        }
    }

    #[must_use]
    pub fn is_satisfied_by(&self, role: Option<&Role>) -> bool {
        authorize(role, self.module, &self.permissions, self.require_all)
    }
}

/// One branch of a permission switch.
#[derive(Debug, Clone)]
pub struct PermissionCase<T> {
    pub requirement: AccessRequirement,
    pub value: T,
}

/// Pick the first case whose requirement the engine's role satisfies.
///
/// Returns `None` when no case matches, letting the caller fall back.
pub fn first_permitted<'c, T>(
    engine: &PermissionEngine<'_>,
    cases: &'c [PermissionCase<T>],
) -> Option<&'c T> {
    cases
        .iter()
        .find(|case| case.requirement.is_satisfied_by(engine.role()))
        .map(|case| &case.value)
}

/// Require that `role` authorizes `permission` on `module`.
pub fn require(
    role: Option<&Role>,
    module: Module,
    permission: Permission,
) -> Result<(), PermissionError> {
    if role.is_none() {
        return Err(PermissionError::NotMember);
    }
    if has_permission(role, module, permission) {
        Ok(())
    } else {
        Err(PermissionError::MissingPermission { module, permission })
    }
}

/// Require that `actor` belongs to `organization_id` and is authorized.
pub fn require_member_permission(
    actor: &OrganizationMember,
    organization_id: Uuid,
    module: Module,
    permission: Permission,
) -> Result<(), PermissionError> {
    if actor.organization_id != organization_id {
        return Err(PermissionError::NotMember);
    }
    let result = require(Some(&actor.role), module, permission);
    if let Err(e) = &result {
        tracing::debug!(
            member_id = %actor.id,
            %organization_id,
            error = %e,
            "Permission denied"
        );
    }
    result
}

/// Permission check errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// Actor lacks the required permission.
    MissingPermission {
        module: Module,
        permission: Permission,
    },

    /// Actor has no membership in the target organization.
    NotMember,
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPermission { module, permission } => {
                write!(f, "Missing permission: {permission} on {module}")
            }
            Self::NotMember => write!(f, "User is not a member of this organization"),
        }
    }
}

impl std::error::Error for PermissionError {}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::permissions::presets::RolePreset;

    fn preset_role(preset: RolePreset) -> Role {
        preset.to_role(Uuid::now_v7(), Utc::now())
    }

    #[test]
    fn test_requirement_constructors() {
        let any = AccessRequirement::any_of(Module::Leads, &[Permission::View, Permission::Delete]);
        let all = AccessRequirement::all_of(Module::Leads, &[Permission::View, Permission::Delete]);
        let manager = preset_role(RolePreset::Manager);

        assert!(any.is_satisfied_by(Some(&manager)));
        assert!(!all.is_satisfied_by(Some(&manager)));
        assert!(!AccessRequirement::single(Module::Leads, Permission::View).is_satisfied_by(None));
    }

    #[test]
    fn test_requirement_deserialize_defaults_to_any() {
        let req: AccessRequirement =
            serde_json::from_str(r#"{"module":"contacts","permissions":["edit","delete"]}"#)
                .unwrap();
        assert!(!req.require_all);
    }

    #[test]
    fn test_first_permitted_picks_first_match() {
        let member = preset_role(RolePreset::Member);
        let engine = PermissionEngine::new(Some(&member));
        let cases = [
            PermissionCase {
                requirement: AccessRequirement::single(Module::Contacts, Permission::Delete),
                value: "full",
            },
            PermissionCase {
                requirement: AccessRequirement::single(Module::Contacts, Permission::Edit),
                value: "editor",
            },
            PermissionCase {
                requirement: AccessRequirement::single(Module::Contacts, Permission::View),
                value: "reader",
            },
        ];

        assert_eq!(first_permitted(&engine, &cases), Some(&"editor"));
        assert_eq!(first_permitted(&PermissionEngine::default(), &cases), None);
    }

    #[test]
    fn test_require() {
        let viewer = preset_role(RolePreset::Viewer);

        assert!(require(Some(&viewer), Module::Contacts, Permission::View).is_ok());
        assert_eq!(
            require(Some(&viewer), Module::Contacts, Permission::Edit),
            Err(PermissionError::MissingPermission {
                module: Module::Contacts,
                permission: Permission::Edit,
            })
        );
        assert_eq!(
            require(None, Module::Contacts, Permission::View),
            Err(PermissionError::NotMember)
        );
    }

    #[test]
    fn test_error_display() {
        let err = PermissionError::MissingPermission {
            module: Module::Settings,
            permission: Permission::Edit,
        };
        assert_eq!(err.to_string(), "Missing permission: edit on settings");
    }
}
