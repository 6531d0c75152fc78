//! Permission system types and utilities.
//!
//! Role-based access control: a member's role grants each module a set of
//! permissions, and `admin` on a module implies all the others.
//! - `engine`: pure decision functions over a role snapshot
//! - `presets`: the five system roles seeded for every organization
//! - `gate`: requirements, permission switches and fail-fast checks

pub mod engine;
pub mod gate;
pub mod presets;

pub use engine::{
    authorize, get_module_permissions, has_all_permissions, has_any_permission, has_permission,
    PermissionEngine,
};
pub use gate::{
    first_permitted, require, require_member_permission, AccessRequirement, PermissionCase,
    PermissionError,
};
pub use presets::{system_roles, RolePreset};
