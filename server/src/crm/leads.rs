//! Lead handlers, including the pipeline board and lead conversion.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crm_common::{
    Contact, ContactStatus, Lead, LeadStatus, Module, OrganizationMember, Permission, Priority,
};
use uuid::Uuid;
use validator::Validate;

use super::contacts::{apply_contact_update, ensure_assignee, load_contact};
use super::query::{cmp_text, paginate, Page};
use super::types::{
    ConvertLeadRequest, ConvertedLead, CreateLeadRequest, LeadBoard, LeadQuery, LeadSortField,
    LeadStats, UpdateLeadRequest,
};
use super::{normalize_tags, recent_cutoff, CrmError};
use crate::permissions::require_member_permission;
use crate::state::AppState;

fn require(
    actor: &OrganizationMember,
    module: Module,
    permission: Permission,
) -> Result<(), CrmError> {
    Ok(require_member_permission(
        actor,
        actor.organization_id,
        module,
        permission,
    )?)
}

fn load_lead(state: &AppState, organization_id: Uuid, lead_id: Uuid) -> Result<Lead, CrmError> {
    state
        .store
        .leads()
        .get(lead_id)
        .filter(|l| l.organization_id == organization_id)
        .ok_or(CrmError::LeadNotFound)
}

/// Set the status, stamping `converted_at` on the first move to converted.
fn set_status(lead: &mut Lead, status: LeadStatus, now: DateTime<Utc>) {
    lead.status = status;
    if status == LeadStatus::Converted && lead.converted_at.is_none() {
        lead.converted_at = Some(now);
    }
}

/// Split a display name into first name and the rest.
fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

fn compare(a: &Lead, b: &Lead, field: LeadSortField) -> Ordering {
    match field {
        LeadSortField::Name => cmp_text(Some(&a.name), Some(&b.name)),
        LeadSortField::Email => cmp_text(Some(&a.email), Some(&b.email)),
        LeadSortField::Company => cmp_text(a.company.as_deref(), b.company.as_deref()),
        LeadSortField::Status => a.status.cmp(&b.status),
        LeadSortField::Priority => a.priority.cmp(&b.priority),
        LeadSortField::Score => a.effective_score().cmp(&b.effective_score()),
        LeadSortField::EstimatedValue => a
            .estimated_value
            .unwrap_or(0.0)
            .total_cmp(&b.estimated_value.unwrap_or(0.0)),
        LeadSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        LeadSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

/// Filtered, sorted page of the actor's organization's leads.
///
/// Without `sort_by` the newest leads come first.
#[tracing::instrument(skip(state, actor, query), fields(member_id = %actor.id))]
pub fn list_leads(
    state: &AppState,
    actor: &OrganizationMember,
    query: LeadQuery,
) -> Result<Page<Lead>, CrmError> {
    require(actor, Module::Leads, Permission::View)?;

    let mut leads: Vec<Lead> = state
        .store
        .leads()
        .list_by_organization(actor.organization_id)
        .into_iter()
        .filter(|l| query.filters.matches(l))
        .collect();

    match query.sort_by {
        Some(field) => leads.sort_by(|a, b| query.sort_order.apply(compare(a, b, field))),
        None => leads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
    }

    Ok(paginate(
        leads,
        query.page,
        query.page_size,
        state.config.default_page_size,
    ))
}

#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn get_lead(
    state: &AppState,
    actor: &OrganizationMember,
    lead_id: Uuid,
) -> Result<Lead, CrmError> {
    require(actor, Module::Leads, Permission::View)?;
    load_lead(state, actor.organization_id, lead_id)
}

#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn create_lead(
    state: &AppState,
    actor: &OrganizationMember,
    body: CreateLeadRequest,
) -> Result<Lead, CrmError> {
    require(actor, Module::Leads, Permission::Create)?;
    body.validate()
        .map_err(|e| CrmError::Validation(e.to_string()))?;
    ensure_assignee(state, actor.organization_id, body.assigned_to)?;
    if let Some(contact_id) = body.contact_id {
        load_contact(state, actor.organization_id, contact_id)?;
    }

    let now = Utc::now();
    let mut lead = Lead {
        id: Uuid::now_v7(),
        organization_id: actor.organization_id,
        contact_id: body.contact_id,
        name: body.name.trim().to_string(),
        email: body.email.trim().to_lowercase(),
        phone: body.phone,
        company: body.company,
        job_title: body.job_title,
        website: body.website,
        source: body.source,
        status: LeadStatus::default(),
        score: body.score,
        priority: body.priority.unwrap_or_default(),
        estimated_value: body.estimated_value,
        currency: body
            .currency
            .map_or_else(|| state.config.default_currency.clone(), |c| c.to_uppercase()),
        assigned_to: body.assigned_to,
        notes: body.notes,
        tags: normalize_tags(body.tags),
        custom_fields: body.custom_fields,
        created_by: actor.id,
        created_by_name: Some(actor.full_name()),
        created_at: now,
        updated_at: now,
        converted_at: None,
        converted_to_contact_id: None,
        last_activity_at: None,
    };
    set_status(&mut lead, body.status.unwrap_or_default(), now);

    let lead = state.store.leads().insert(lead)?;
    state.persist()?;
    tracing::info!(
        organization_id = %lead.organization_id,
        lead_id = %lead.id,
        status = ?lead.status,
        "Lead created"
    );

    Ok(lead)
}

#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn update_lead(
    state: &AppState,
    actor: &OrganizationMember,
    lead_id: Uuid,
    body: UpdateLeadRequest,
) -> Result<Lead, CrmError> {
    require(actor, Module::Leads, Permission::Edit)?;
    body.validate()
        .map_err(|e| CrmError::Validation(e.to_string()))?;
    ensure_assignee(state, actor.organization_id, body.assigned_to)?;
    if let Some(contact_id) = body.contact_id {
        load_contact(state, actor.organization_id, contact_id)?;
    }

    let mut lead = load_lead(state, actor.organization_id, lead_id)?;
    let now = Utc::now();

    if let Some(name) = body.name {
        lead.name = name.trim().to_string();
    }
    if let Some(email) = body.email {
        lead.email = email.trim().to_lowercase();
    }
    if body.phone.is_some() {
        lead.phone = body.phone;
    }
    if body.company.is_some() {
        lead.company = body.company;
    }
    if body.job_title.is_some() {
        lead.job_title = body.job_title;
    }
    if body.website.is_some() {
        lead.website = body.website;
    }
    if let Some(source) = body.source {
        lead.source = source;
    }
    if let Some(status) = body.status {
        set_status(&mut lead, status, now);
    }
    if let Some(priority) = body.priority {
        lead.priority = priority;
    }
    if body.score.is_some() {
        lead.score = body.score;
    }
    if body.estimated_value.is_some() {
        lead.estimated_value = body.estimated_value;
    }
    if let Some(currency) = body.currency {
        lead.currency = currency.to_uppercase();
    }
    if body.contact_id.is_some() {
        lead.contact_id = body.contact_id;
    }
    if body.assigned_to.is_some() {
        lead.assigned_to = body.assigned_to;
    }
    if body.notes.is_some() {
        lead.notes = body.notes;
    }
    if let Some(tags) = body.tags {
        lead.tags = normalize_tags(tags);
    }
    if body.custom_fields.is_some() {
        lead.custom_fields = body.custom_fields;
    }
    lead.updated_at = now;
    lead.last_activity_at = Some(now);

    let lead = state.store.leads().update(lead)?;
    state.persist()?;
    tracing::info!(lead_id = %lead.id, "Lead updated");

    Ok(lead)
}

/// Move a lead to another pipeline column.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn update_lead_status(
    state: &AppState,
    actor: &OrganizationMember,
    lead_id: Uuid,
    status: LeadStatus,
) -> Result<Lead, CrmError> {
    require(actor, Module::Leads, Permission::Edit)?;

    let mut lead = load_lead(state, actor.organization_id, lead_id)?;
    let now = Utc::now();
    let previous = lead.status;
    set_status(&mut lead, status, now);
    lead.updated_at = now;
    lead.last_activity_at = Some(now);

    let lead = state.store.leads().update(lead)?;
    state.persist()?;
    tracing::info!(lead_id = %lead.id, from = ?previous, to = ?lead.status, "Lead status changed");

    Ok(lead)
}

#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn delete_lead(
    state: &AppState,
    actor: &OrganizationMember,
    lead_id: Uuid,
) -> Result<Lead, CrmError> {
    require(actor, Module::Leads, Permission::Delete)?;
    let lead = load_lead(state, actor.organization_id, lead_id)?;

    let removed = state.store.leads().remove(lead.id)?;
    state.persist()?;
    tracing::info!(lead_id = %removed.id, "Lead deleted");

    Ok(removed)
}

/// Leads grouped by status for the pipeline board.
///
/// Every status has a column, possibly empty. Columns are ordered by score,
/// highest first, with unscored leads counting as 0.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn leads_by_status(
    state: &AppState,
    actor: &OrganizationMember,
) -> Result<LeadBoard, CrmError> {
    require(actor, Module::Leads, Permission::View)?;

    let mut board: LeadBoard = LeadStatus::ALL
        .into_iter()
        .map(|status| (status, Vec::new()))
        .collect();
    for lead in state.store.leads().list_by_organization(actor.organization_id) {
        board.entry(lead.status).or_default().push(lead);
    }
    for column in board.values_mut() {
        column.sort_by_key(|l| std::cmp::Reverse(l.effective_score()));
    }

    Ok(board)
}

#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn lead_stats(state: &AppState, actor: &OrganizationMember) -> Result<LeadStats, CrmError> {
    require(actor, Module::Leads, Permission::View)?;

    let leads = state.store.leads().list_by_organization(actor.organization_id);
    let cutoff = recent_cutoff(Utc::now());

    let mut by_status: BTreeMap<LeadStatus, usize> =
        LeadStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    let mut by_priority: BTreeMap<Priority, usize> =
        Priority::ALL.into_iter().map(|p| (p, 0)).collect();
    let mut by_source = BTreeMap::new();
    let mut score_sum = 0u64;
    let mut scored = 0u64;
    let mut total_estimated_value = 0.0;

    for lead in &leads {
        *by_status.entry(lead.status).or_insert(0) += 1;
        *by_priority.entry(lead.priority).or_insert(0) += 1;
        *by_source.entry(lead.source).or_insert(0) += 1;
        if let Some(score) = lead.score {
            score_sum += u64::from(score);
            scored += 1;
        }
        total_estimated_value += lead.estimated_value.unwrap_or(0.0);
    }

    let total = leads.len();
    let converted = by_status.get(&LeadStatus::Converted).copied().unwrap_or(0);
    let conversion_rate = if total > 0 {
        converted as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let average_score = if scored > 0 {
        score_sum as f64 / scored as f64
    } else {
        0.0
    };

    Ok(LeadStats {
        total,
        by_status,
        by_source,
        by_priority,
        conversion_rate,
        average_score,
        total_estimated_value,
        recent_count: leads.iter().filter(|l| l.created_at > cutoff).count(),
    })
}

/// Mark a lead converted, optionally creating a contact from it.
///
/// The contact takes the lead's details, with `contact_data` applied on top,
/// and the lead records the new contact's id. Creating a contact also needs
/// `contacts:create`.
#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn convert_lead(
    state: &AppState,
    actor: &OrganizationMember,
    lead_id: Uuid,
    body: ConvertLeadRequest,
) -> Result<ConvertedLead, CrmError> {
    require(actor, Module::Leads, Permission::Edit)?;
    if body.create_contact {
        require(actor, Module::Contacts, Permission::Create)?;
    }
    body.validate()
        .map_err(|e| CrmError::Validation(e.to_string()))?;

    let mut lead = load_lead(state, actor.organization_id, lead_id)?;
    if lead.status == LeadStatus::Converted || lead.converted_to_contact_id.is_some() {
        return Err(CrmError::AlreadyConverted(lead.id));
    }
    let now = Utc::now();

    let contact = if body.create_contact {
        let (first_name, last_name) = split_name(&lead.name);
        let mut contact = Contact {
            id: Uuid::now_v7(),
            organization_id: lead.organization_id,
            first_name,
            last_name,
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            mobile: None,
            company: lead.company.clone(),
            job_title: lead.job_title.clone(),
            department: None,
            website: lead.website.clone(),
            address: None,
            status: ContactStatus::Active,
            tags: lead.tags.clone(),
            assigned_to: lead.assigned_to,
            source: Some(lead.source),
            notes: lead.notes.clone(),
            social_profiles: None,
            custom_fields: lead.custom_fields.clone(),
            created_by: actor.id,
            created_by_name: Some(actor.full_name()),
            created_at: now,
            updated_at: now,
            last_contacted_at: None,
        };
        if let Some(overrides) = body.contact_data {
            ensure_assignee(state, actor.organization_id, overrides.assigned_to)?;
            apply_contact_update(&mut contact, overrides);
        }
        Some(state.store.contacts().insert(contact)?)
    } else {
        None
    };

    set_status(&mut lead, LeadStatus::Converted, now);
    if let Some(contact) = &contact {
        lead.converted_to_contact_id = Some(contact.id);
        lead.contact_id = Some(contact.id);
    }
    lead.updated_at = now;
    lead.last_activity_at = Some(now);

    let lead = state.store.leads().update(lead)?;
    state.persist()?;
    tracing::info!(
        lead_id = %lead.id,
        contact_id = ?lead.converted_to_contact_id,
        "Lead converted"
    );

    Ok(ConvertedLead { lead, contact })
}
