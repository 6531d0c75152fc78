//! CRM Request, Filter and Response Types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crm_common::{
    Address, Contact, ContactStatus, Lead, LeadSource, LeadStatus, Priority, SocialProfiles,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::query::{contains_ci, search_term, ListQuery};
use crate::organization::types::not_blank;

// ============================================================================
// Contact Requests
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateContactRequest {
    #[validate(
        length(min = 1, max = 100, message = "First name must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub first_name: String,
    #[validate(
        length(min = 1, max = 100, message = "Last name must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    #[validate(length(max = 200, message = "Company must be at most 200 characters"))]
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    pub address: Option<Address>,
    pub status: Option<ContactStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub assigned_to: Option<Uuid>,
    pub source: Option<LeadSource>,
    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,
    pub social_profiles: Option<SocialProfiles>,
    pub custom_fields: Option<Map<String, Value>>,
}

/// Partial contact update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateContactRequest {
    #[validate(
        length(min = 1, max = 100, message = "First name must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Last name must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    #[validate(length(max = 200, message = "Company must be at most 200 characters"))]
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    pub address: Option<Address>,
    pub status: Option<ContactStatus>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<Uuid>,
    pub source: Option<LeadSource>,
    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,
    pub social_profiles: Option<SocialProfiles>,
    pub custom_fields: Option<Map<String, Value>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Lead Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLeadRequest {
    #[validate(
        length(min = 1, max = 200, message = "Name must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Company must be at most 200 characters"))]
    pub company: Option<String>,
    pub job_title: Option<String>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    pub source: LeadSource,
    pub status: Option<LeadStatus>,
    pub priority: Option<Priority>,
    #[validate(range(max = 100, message = "Score must be 0-100"))]
    pub score: Option<u8>,
    #[validate(range(min = 0.0, message = "Estimated value cannot be negative"))]
    pub estimated_value: Option<f64>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    /// Existing contact this lead relates to.
    pub contact_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub custom_fields: Option<Map<String, Value>>,
}

impl CreateLeadRequest {
    /// Minimal request with every optional field unset.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, source: LeadSource) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
            company: None,
            job_title: None,
            website: None,
            source,
            status: None,
            priority: None,
            score: None,
            estimated_value: None,
            currency: None,
            contact_id: None,
            assigned_to: None,
            notes: None,
            tags: Vec::new(),
            custom_fields: None,
        }
    }
}

/// Partial lead update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateLeadRequest {
    #[validate(
        length(min = 1, max = 200, message = "Name must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Company must be at most 200 characters"))]
    pub company: Option<String>,
    pub job_title: Option<String>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    pub priority: Option<Priority>,
    #[validate(range(max = 100, message = "Score must be 0-100"))]
    pub score: Option<u8>,
    #[validate(range(min = 0.0, message = "Estimated value cannot be negative"))]
    pub estimated_value: Option<f64>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    pub contact_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ConvertLeadRequest {
    /// Create a contact from the lead's details.
    pub create_contact: bool,
    /// Overrides applied to the created contact.
    #[validate(nested)]
    pub contact_data: Option<UpdateContactRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedLead {
    pub lead: Lead,
    pub contact: Option<Contact>,
}

// ============================================================================
// Filters and Sorting
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilters {
    /// Matches first name, last name, email or company.
    pub search: Option<String>,
    #[serde(default)]
    pub status: Vec<ContactStatus>,
    /// Contacts carrying any of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assigned_to: Vec<Uuid>,
    #[serde(default)]
    pub source: Vec<LeadSource>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl ContactFilters {
    /// Whether `contact` passes every set filter. Empty lists filter nothing.
    #[must_use]
    pub fn matches(&self, contact: &Contact) -> bool {
        if let Some(term) = search_term(self.search.as_deref()) {
            let hit = contains_ci(Some(&contact.first_name), &term)
                || contains_ci(Some(&contact.last_name), &term)
                || contains_ci(Some(&contact.email), &term)
                || contains_ci(contact.company.as_deref(), &term);
            if !hit {
                return false;
            }
        }
        if !self.status.is_empty() && !self.status.contains(&contact.status) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| contact.tags.contains(t)) {
            return false;
        }
        if !self.assigned_to.is_empty()
            && !contact
                .assigned_to
                .is_some_and(|id| self.assigned_to.contains(&id))
        {
            return false;
        }
        if !self.source.is_empty()
            && !contact.source.is_some_and(|s| self.source.contains(&s))
        {
            return false;
        }
        within(contact.created_at, self.created_from, self.created_to)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadFilters {
    /// Matches name, email or company.
    pub search: Option<String>,
    #[serde(default)]
    pub status: Vec<LeadStatus>,
    #[serde(default)]
    pub source: Vec<LeadSource>,
    #[serde(default)]
    pub priority: Vec<Priority>,
    /// Leads carrying any of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assigned_to: Vec<Uuid>,
    /// Inclusive; an unscored lead counts as 0.
    pub score_min: Option<u8>,
    /// Inclusive; an unscored lead counts as 0.
    pub score_max: Option<u8>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl LeadFilters {
    #[must_use]
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(term) = search_term(self.search.as_deref()) {
            let hit = contains_ci(Some(&lead.name), &term)
                || contains_ci(Some(&lead.email), &term)
                || contains_ci(lead.company.as_deref(), &term);
            if !hit {
                return false;
            }
        }
        if !self.status.is_empty() && !self.status.contains(&lead.status) {
            return false;
        }
        if !self.source.is_empty() && !self.source.contains(&lead.source) {
            return false;
        }
        if !self.priority.is_empty() && !self.priority.contains(&lead.priority) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| lead.tags.contains(t)) {
            return false;
        }
        if !self.assigned_to.is_empty()
            && !lead
                .assigned_to
                .is_some_and(|id| self.assigned_to.contains(&id))
        {
            return false;
        }
        let score = lead.effective_score();
        if self.score_min.is_some_and(|min| score < min) {
            return false;
        }
        if self.score_max.is_some_and(|max| score > max) {
            return false;
        }
        within(lead.created_at, self.created_from, self.created_to)
    }
}

fn within(at: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.is_none_or(|from| at >= from) && to.is_none_or(|to| at <= to)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSortField {
    FirstName,
    LastName,
    Email,
    Company,
    Status,
    #[default]
    CreatedAt,
    UpdatedAt,
    LastContactedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSortField {
    Name,
    Email,
    Company,
    Status,
    Priority,
    Score,
    EstimatedValue,
    #[default]
    CreatedAt,
    UpdatedAt,
}

pub type ContactQuery = ListQuery<ContactFilters, ContactSortField>;
pub type LeadQuery = ListQuery<LeadFilters, LeadSortField>;

// ============================================================================
// Aggregates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_source: BTreeMap<LeadSource, usize>,
    pub by_tag: BTreeMap<String, usize>,
    /// Contacts created in the last 30 days.
    pub recent_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    pub name: String,
    pub usage_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadStats {
    pub total: usize,
    /// Every status is present, zero if unused.
    pub by_status: BTreeMap<LeadStatus, usize>,
    pub by_source: BTreeMap<LeadSource, usize>,
    /// Every priority is present, zero if unused.
    pub by_priority: BTreeMap<Priority, usize>,
    /// Converted leads as a percentage of all leads.
    pub conversion_rate: f64,
    /// Mean over leads that carry a score.
    pub average_score: f64,
    pub total_estimated_value: f64,
    /// Leads created in the last 30 days.
    pub recent_count: usize,
}

/// Kanban board: one column per status, highest score first.
pub type LeadBoard = BTreeMap<LeadStatus, Vec<Lead>>;
