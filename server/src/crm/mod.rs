//! Contacts and leads.
//!
//! Records are scoped to an organization: lookups through an actor from a
//! different organization report not-found rather than leaking existence.

pub mod contacts;
pub mod leads;
pub mod query;
pub mod types;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::permissions::PermissionError;
use crate::store::StoreError;

pub use contacts::{
    bulk_delete_contacts, contact_stats, contact_tags, create_contact, delete_contact,
    get_contact, list_contacts, update_contact,
};
pub use leads::{
    convert_lead, create_lead, delete_lead, get_lead, lead_stats, leads_by_status, list_leads,
    update_lead, update_lead_status,
};
pub use query::{paginate, ListQuery, Page, SortOrder};
pub use types::*;

/// Window used for the "recent" counters in stats.
pub const RECENT_WINDOW_DAYS: i64 = 30;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Contact not found")]
    ContactNotFound,

    #[error("Lead not found")]
    LeadNotFound,

    #[error("Lead {0} has already been converted")]
    AlreadyConverted(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Permission(#[from] PermissionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Start of the "recent" window relative to `now`.
pub(crate) fn recent_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RECENT_WINDOW_DAYS)
}

/// Trim tags, drop blanks and duplicates, keep order.
pub(crate) fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}
