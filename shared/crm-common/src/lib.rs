//! CRM Common Library
//!
//! Shared types used by the backend and by UI-gating consumers: the
//! permission model, organizations, contacts and leads.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
