//! CRM Server
//!
//! Multi-tenant CRM backend: organizations with role-based access control,
//! teams and invitations, plus contacts and leads scoped to an organization.

pub mod config;
pub mod crm;
pub mod observability;
pub mod organization;
pub mod permissions;
pub mod state;
pub mod store;
