//! Shared Types

pub mod crm;
pub mod organization;
pub mod permissions;
pub mod user;

pub use crm::*;
pub use organization::*;
pub use permissions::*;
pub use user::*;
