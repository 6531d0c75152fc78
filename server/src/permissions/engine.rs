//! Permission decision logic.
//!
//! Answers authorization questions against a single role snapshot. Every
//! function is pure: an absent role, an ungranted module and an empty set all
//! resolve to "no access", except that `admin` on a module implies every
//! other permission on that module.

use crm_common::{Module, ModulePermissions, OrganizationMember, Permission, Role};

/// Check if `role` authorizes `permission` on `module`.
///
/// Returns `false` when `role` is `None`.
#[must_use]
pub fn has_permission(role: Option<&Role>, module: Module, permission: Permission) -> bool {
    role.is_some_and(|r| r.grants(module).grants(permission))
}

/// Check if `role` authorizes at least one of `permissions` on `module`.
///
/// An empty slice requests nothing and therefore grants nothing: `false`.
#[must_use]
pub fn has_any_permission(role: Option<&Role>, module: Module, permissions: &[Permission]) -> bool {
    permissions.iter().any(|p| has_permission(role, module, *p))
}

/// Check if `role` authorizes every one of `permissions` on `module`.
///
/// An empty slice is vacuously satisfied: `true`, even with no role. This is
/// the opposite convention to [`has_any_permission`]; callers should not pass
/// an empty slice to either and expect a meaningful answer.
#[must_use]
pub fn has_all_permissions(
    role: Option<&Role>,
    module: Module,
    permissions: &[Permission],
) -> bool {
    permissions.iter().all(|p| has_permission(role, module, *p))
}

/// Evaluate a single or multi-permission requirement.
///
/// `require_all` selects AND semantics, otherwise OR.
#[must_use]
pub fn authorize(
    role: Option<&Role>,
    module: Module,
    permissions: &[Permission],
    require_all: bool,
) -> bool {
    if require_all {
        has_all_permissions(role, module, permissions)
    } else {
        has_any_permission(role, module, permissions)
    }
}

/// Raw grant set for `module`, empty if `role` is `None`.
///
/// For display and debugging only: it does not expand `admin`, so gating
/// must go through [`has_permission`] and friends.
#[must_use]
pub fn get_module_permissions(role: Option<&Role>, module: Module) -> ModulePermissions {
    role.map(|r| r.grants(module)).unwrap_or_default()
}

/// Authorization queries bound to one role snapshot.
///
/// Usually built from the current session's member. Holds a borrow only, so
/// it is `Copy` and can be created per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionEngine<'a> {
    role: Option<&'a Role>,
}

impl<'a> PermissionEngine<'a> {
    #[must_use]
    pub const fn new(role: Option<&'a Role>) -> Self {
        Self { role }
    }

    /// Engine for a member's denormalized role, or the deny-all engine.
    #[must_use]
    pub fn for_member(member: Option<&'a OrganizationMember>) -> Self {
        Self::new(member.map(|m| &m.role))
    }

    /// The role this engine answers for.
    #[must_use]
    pub const fn role(&self) -> Option<&'a Role> {
        self.role
    }

    #[must_use]
    pub fn has_permission(&self, module: Module, permission: Permission) -> bool {
        has_permission(self.role, module, permission)
    }

    #[must_use]
    pub fn has_any_permission(&self, module: Module, permissions: &[Permission]) -> bool {
        has_any_permission(self.role, module, permissions)
    }

    #[must_use]
    pub fn has_all_permissions(&self, module: Module, permissions: &[Permission]) -> bool {
        has_all_permissions(self.role, module, permissions)
    }

    #[must_use]
    pub fn authorize(&self, module: Module, permissions: &[Permission], require_all: bool) -> bool {
        authorize(self.role, module, permissions, require_all)
    }

    #[must_use]
    pub fn can_view(&self, module: Module) -> bool {
        self.has_permission(module, Permission::View)
    }

    #[must_use]
    pub fn can_create(&self, module: Module) -> bool {
        self.has_permission(module, Permission::Create)
    }

    #[must_use]
    pub fn can_edit(&self, module: Module) -> bool {
        self.has_permission(module, Permission::Edit)
    }

    #[must_use]
    pub fn can_delete(&self, module: Module) -> bool {
        self.has_permission(module, Permission::Delete)
    }

    #[must_use]
    pub fn can_export(&self, module: Module) -> bool {
        self.has_permission(module, Permission::Export)
    }

    /// Whether the role holds `admin` on `module`.
    #[must_use]
    pub fn is_admin(&self, module: Module) -> bool {
        self.has_permission(module, Permission::Admin)
    }

    #[must_use]
    pub fn get_module_permissions(&self, module: Module) -> ModulePermissions {
        get_module_permissions(self.role, module)
    }
}
