//! Contact handlers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::Utc;
use crm_common::{Contact, ContactStatus, Module, OrganizationMember, Permission};
use uuid::Uuid;
use validator::Validate;

use super::query::{cmp_text, paginate, Page};
use super::types::{
    ContactQuery, ContactSortField, ContactStats, CreateContactRequest, TagUsage,
    UpdateContactRequest,
};
use super::{normalize_tags, recent_cutoff, CrmError};
use crate::permissions::require_member_permission;
use crate::state::AppState;

fn require(actor: &OrganizationMember, permission: Permission) -> Result<(), CrmError> {
    Ok(require_member_permission(
        actor,
        actor.organization_id,
        Module::Contacts,
        permission,
    )?)
}

pub(crate) fn load_contact(
    state: &AppState,
    organization_id: Uuid,
    contact_id: Uuid,
) -> Result<Contact, CrmError> {
    state
        .store
        .contacts()
        .get(contact_id)
        .filter(|c| c.organization_id == organization_id)
        .ok_or(CrmError::ContactNotFound)
}

/// Fail unless `assignee` is `None` or a member of `organization_id`.
pub(crate) fn ensure_assignee(
    state: &AppState,
    organization_id: Uuid,
    assignee: Option<Uuid>,
) -> Result<(), CrmError> {
    let Some(member_id) = assignee else {
        return Ok(());
    };
    let is_member = state
        .store
        .members()
        .get(member_id)
        .is_some_and(|m| m.organization_id == organization_id);
    if is_member {
        Ok(())
    } else {
        Err(CrmError::Validation(
            "Assignee is not a member of this organization".into(),
        ))
    }
}

/// Merge a partial update into `contact`.
pub(crate) fn apply_contact_update(contact: &mut Contact, body: UpdateContactRequest) {
    if let Some(first_name) = body.first_name {
        contact.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = body.last_name {
        contact.last_name = last_name.trim().to_string();
    }
    if let Some(email) = body.email {
        contact.email = email.trim().to_lowercase();
    }
    if body.phone.is_some() {
        contact.phone = body.phone;
    }
    if body.mobile.is_some() {
        contact.mobile = body.mobile;
    }
    if body.company.is_some() {
        contact.company = body.company;
    }
    if body.job_title.is_some() {
        contact.job_title = body.job_title;
    }
    if body.department.is_some() {
        contact.department = body.department;
    }
    if body.website.is_some() {
        contact.website = body.website;
    }
    if body.address.is_some() {
        contact.address = body.address;
    }
    if let Some(status) = body.status {
        contact.status = status;
    }
    if let Some(tags) = body.tags {
        contact.tags = normalize_tags(tags);
    }
    if body.assigned_to.is_some() {
        contact.assigned_to = body.assigned_to;
    }
    if body.source.is_some() {
        contact.source = body.source;
    }
    if body.notes.is_some() {
        contact.notes = body.notes;
    }
    if body.social_profiles.is_some() {
        contact.social_profiles = body.social_profiles;
    }
    if body.custom_fields.is_some() {
        contact.custom_fields = body.custom_fields;
    }
    if body.last_contacted_at.is_some() {
        contact.last_contacted_at = body.last_contacted_at;
    }
}

fn compare(a: &Contact, b: &Contact, field: ContactSortField) -> Ordering {
    match field {
        ContactSortField::FirstName => cmp_text(Some(&a.first_name), Some(&b.first_name)),
        ContactSortField::LastName => cmp_text(Some(&a.last_name), Some(&b.last_name)),
        ContactSortField::Email => cmp_text(Some(&a.email), Some(&b.email)),
        ContactSortField::Company => cmp_text(a.company.as_deref(), b.company.as_deref()),
        ContactSortField::Status => a.status.cmp(&b.status),
        ContactSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        ContactSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        ContactSortField::LastContactedAt => a.last_contacted_at.cmp(&b.last_contacted_at),
    }
}

/// Filtered, sorted page of the actor's organization's contacts.
///
/// Without `sort_by` the newest contacts come first.
#[tracing::instrument(skip(state, actor, query), fields(member_id = %actor.id))]
pub fn list_contacts(
    state: &AppState,
    actor: &OrganizationMember,
    query: ContactQuery,
) -> Result<Page<Contact>, CrmError> {
    require(actor, Permission::View)?;

    let mut contacts: Vec<Contact> = state
        .store
        .contacts()
        .list_by_organization(actor.organization_id)
        .into_iter()
        .filter(|c| query.filters.matches(c))
        .collect();

    match query.sort_by {
        Some(field) => contacts.sort_by(|a, b| query.sort_order.apply(compare(a, b, field))),
        None => contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
    }

    Ok(paginate(
        contacts,
        query.page,
        query.page_size,
        state.config.default_page_size,
    ))
}

#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn get_contact(
    state: &AppState,
    actor: &OrganizationMember,
    contact_id: Uuid,
) -> Result<Contact, CrmError> {
    require(actor, Permission::View)?;
    load_contact(state, actor.organization_id, contact_id)
}

#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn create_contact(
    state: &AppState,
    actor: &OrganizationMember,
    body: CreateContactRequest,
) -> Result<Contact, CrmError> {
    require(actor, Permission::Create)?;
    body.validate()
        .map_err(|e| CrmError::Validation(e.to_string()))?;
    ensure_assignee(state, actor.organization_id, body.assigned_to)?;

    let now = Utc::now();
    let contact = state.store.contacts().insert(Contact {
        id: Uuid::now_v7(),
        organization_id: actor.organization_id,
        first_name: body.first_name.trim().to_string(),
        last_name: body.last_name.trim().to_string(),
        email: body.email.trim().to_lowercase(),
        phone: body.phone,
        mobile: body.mobile,
        company: body.company,
        job_title: body.job_title,
        department: body.department,
        website: body.website,
        address: body.address,
        status: body.status.unwrap_or_default(),
        tags: normalize_tags(body.tags),
        assigned_to: body.assigned_to,
        source: body.source,
        notes: body.notes,
        social_profiles: body.social_profiles,
        custom_fields: body.custom_fields,
        created_by: actor.id,
        created_by_name: Some(actor.full_name()),
        created_at: now,
        updated_at: now,
        last_contacted_at: None,
    })?;

    state.persist()?;
    tracing::info!(
        organization_id = %contact.organization_id,
        contact_id = %contact.id,
        "Contact created"
    );

    Ok(contact)
}

#[tracing::instrument(skip(state, actor, body), fields(member_id = %actor.id))]
pub fn update_contact(
    state: &AppState,
    actor: &OrganizationMember,
    contact_id: Uuid,
    body: UpdateContactRequest,
) -> Result<Contact, CrmError> {
    require(actor, Permission::Edit)?;
    body.validate()
        .map_err(|e| CrmError::Validation(e.to_string()))?;
    ensure_assignee(state, actor.organization_id, body.assigned_to)?;

    let mut contact = load_contact(state, actor.organization_id, contact_id)?;
    apply_contact_update(&mut contact, body);
    contact.updated_at = Utc::now();

    let contact = state.store.contacts().update(contact)?;
    state.persist()?;
    tracing::info!(contact_id = %contact.id, "Contact updated");

    Ok(contact)
}

#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn delete_contact(
    state: &AppState,
    actor: &OrganizationMember,
    contact_id: Uuid,
) -> Result<Contact, CrmError> {
    require(actor, Permission::Delete)?;
    let contact = load_contact(state, actor.organization_id, contact_id)?;

    let removed = state.store.contacts().remove(contact.id)?;
    state.persist()?;
    tracing::info!(contact_id = %removed.id, "Contact deleted");

    Ok(removed)
}

/// Delete every listed contact of the actor's organization.
///
/// Unknown ids and contacts of other organizations are skipped. Returns the
/// number deleted.
#[tracing::instrument(
    skip(state, actor, contact_ids),
    fields(member_id = %actor.id, requested = contact_ids.len())
)]
pub fn bulk_delete_contacts(
    state: &AppState,
    actor: &OrganizationMember,
    contact_ids: &[Uuid],
) -> Result<usize, CrmError> {
    require(actor, Permission::Delete)?;

    let mut deleted = 0;
    for contact_id in contact_ids {
        if load_contact(state, actor.organization_id, *contact_id).is_ok()
            && state.store.contacts().remove(*contact_id).is_ok()
        {
            deleted += 1;
        }
    }

    state.persist()?;
    tracing::info!(deleted, "Contacts bulk deleted");

    Ok(deleted)
}

#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn contact_stats(
    state: &AppState,
    actor: &OrganizationMember,
) -> Result<ContactStats, CrmError> {
    require(actor, Permission::View)?;

    let contacts = state.store.contacts().list_by_organization(actor.organization_id);
    let cutoff = recent_cutoff(Utc::now());

    let mut by_source = BTreeMap::new();
    let mut by_tag = BTreeMap::new();
    for contact in &contacts {
        if let Some(source) = contact.source {
            *by_source.entry(source).or_insert(0) += 1;
        }
        for tag in &contact.tags {
            *by_tag.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    let active = contacts
        .iter()
        .filter(|c| c.status == ContactStatus::Active)
        .count();

    Ok(ContactStats {
        total: contacts.len(),
        active,
        inactive: contacts.len() - active,
        by_source,
        by_tag,
        recent_count: contacts.iter().filter(|c| c.created_at > cutoff).count(),
    })
}

/// Tags in use across the organization's contacts, most used first.
#[tracing::instrument(skip(state, actor), fields(member_id = %actor.id))]
pub fn contact_tags(
    state: &AppState,
    actor: &OrganizationMember,
) -> Result<Vec<TagUsage>, CrmError> {
    require(actor, Permission::View)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for contact in state.store.contacts().list_by_organization(actor.organization_id) {
        for tag in contact.tags {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }

    let mut tags: Vec<TagUsage> = counts
        .into_iter()
        .map(|(name, usage_count)| TagUsage { name, usage_count })
        .collect();
    // BTreeMap order breaks ties by name
    tags.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use crm_common::{LeadSource, UserProfile};

    use super::*;
    use crate::config::Config;
    use crate::crm::query::SortOrder;
    use crate::organization::{
        create_organization, join_organization, CreateOrganizationRequest, CreatedOrganization,
    };

    fn profile(email: &str) -> UserProfile {
        UserProfile {
            id: Uuid::now_v7(),
            email: email.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            avatar_url: None,
        }
    }

    fn setup() -> (AppState, CreatedOrganization) {
        let state = AppState::in_memory(Config::default_for_test());
        let created = create_organization(
            &state,
            &profile("owner@acme.test"),
            CreateOrganizationRequest {
                name: "Acme".into(),
                ..Default::default()
            },
        )
        .unwrap();
        (state, created)
    }

    fn request(first: &str, last: &str, tags: &[&str]) -> CreateContactRequest {
        CreateContactRequest {
            first_name: first.into(),
            last_name: last.into(),
            email: format!("{}@example.test", first.to_lowercase()),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_contact_defaults() {
        let (state, created) = setup();
        let contact =
            create_contact(&state, &created.owner, request("Ada", "Lovelace", &[])).unwrap();

        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.organization_id, created.organization.id);
        assert_eq!(contact.created_by, created.owner.id);
        assert_eq!(contact.created_by_name.as_deref(), Some("Test User"));
    }

    #[test]
    fn test_create_contact_validation() {
        let (state, created) = setup();
        let mut body = request("Ada", "Lovelace", &[]);
        body.email = "not-an-email".into();

        let err = create_contact(&state, &created.owner, body).unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_blank_contact_names_are_rejected() {
        let (state, created) = setup();
        let err =
            create_contact(&state, &created.owner, request("    ", "Lovelace", &[])).unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
        assert!(state.store.contacts().list().is_empty());

        let contact =
            create_contact(&state, &created.owner, request("Ada", "Lovelace", &[])).unwrap();
        let err = update_contact(
            &state,
            &created.owner,
            contact.id,
            UpdateContactRequest {
                last_name: Some("\t".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
        assert_eq!(state.store.contacts().get(contact.id).unwrap().last_name, "Lovelace");
    }

    #[test]
    fn test_create_contact_with_foreign_assignee_fails() {
        let (state, created) = setup();
        let mut body = request("Ada", "Lovelace", &[]);
        body.assigned_to = Some(Uuid::now_v7());

        let err = create_contact(&state, &created.owner, body).unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_list_contacts_sorted_and_paginated() {
        let (state, created) = setup();
        for name in ["Charlie", "alice", "Bob"] {
            create_contact(&state, &created.owner, request(name, "Smith", &[])).unwrap();
        }

        let page = list_contacts(
            &state,
            &created.owner,
            ContactQuery {
                page: Some(1),
                page_size: Some(2),
                sort_by: Some(ContactSortField::FirstName),
                sort_order: SortOrder::Asc,
                ..Default::default()
            },
        )
        .unwrap();

        let names: Vec<_> = page.data.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(names, ["alice", "Bob"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_list_contacts_default_newest_first() {
        let (state, created) = setup();
        let first = create_contact(&state, &created.owner, request("First", "One", &[])).unwrap();
        let second = create_contact(&state, &created.owner, request("Second", "Two", &[])).unwrap();

        let page = list_contacts(&state, &created.owner, ContactQuery::default()).unwrap();
        assert_eq!(page.data[0].id, second.id);
        assert_eq!(page.data[1].id, first.id);
    }

    #[test]
    fn test_viewer_member_cannot_create_but_can_list() {
        let (state, created) = setup();
        let org_id = created.organization.id;
        let viewer_role = state
            .store
            .roles()
            .list_by_organization(org_id)
            .into_iter()
            .find(|r| r.name == "Viewer")
            .unwrap();
        let viewer = join_organization(
            &state,
            org_id,
            &profile("v@acme.test"),
            Some(viewer_role.id),
        )
        .unwrap();

        let err = create_contact(&state, &viewer, request("Ada", "Lovelace", &[])).unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));
        assert!(list_contacts(&state, &viewer, ContactQuery::default()).is_ok());
    }

    #[test]
    fn test_member_cannot_delete() {
        let (state, created) = setup();
        let member =
            join_organization(&state, created.organization.id, &profile("m@acme.test"), None)
                .unwrap();
        let contact = create_contact(&state, &member, request("Ada", "Lovelace", &[])).unwrap();

        let err = delete_contact(&state, &member, contact.id).unwrap_err();
        assert!(matches!(err, CrmError::Permission(_)));
        delete_contact(&state, &created.owner, contact.id).unwrap();
    }

    #[test]
    fn test_contacts_are_scoped_to_organization() {
        let (state, created) = setup();
        let other = create_organization(
            &state,
            &profile("other@else.test"),
            CreateOrganizationRequest {
                name: "Elsewhere".into(),
                ..Default::default()
            },
        )
        .unwrap();
        let contact =
            create_contact(&state, &created.owner, request("Ada", "Lovelace", &[])).unwrap();

        let err = get_contact(&state, &other.owner, contact.id).unwrap_err();
        assert!(matches!(err, CrmError::ContactNotFound));
        assert_eq!(
            list_contacts(&state, &other.owner, ContactQuery::default())
                .unwrap()
                .total,
            0
        );
        assert_eq!(bulk_delete_contacts(&state, &other.owner, &[contact.id]).unwrap(), 0);
    }

    #[test]
    fn test_update_contact_merges_fields() {
        let (state, created) = setup();
        let contact =
            create_contact(&state, &created.owner, request("Ada", "Lovelace", &["VIP"])).unwrap();

        let updated = update_contact(
            &state,
            &created.owner,
            contact.id,
            UpdateContactRequest {
                company: Some("Engines Ltd".into()),
                status: Some(ContactStatus::Inactive),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(updated.first_name, "Ada");
        assert_eq!(updated.tags, vec!["VIP"]);
        assert_eq!(updated.company.as_deref(), Some("Engines Ltd"));
        assert_eq!(updated.status, ContactStatus::Inactive);
        assert!(updated.updated_at >= contact.updated_at);
    }

    #[test]
    fn test_bulk_delete() {
        let (state, created) = setup();
        let a = create_contact(&state, &created.owner, request("A", "A", &[])).unwrap();
        let b = create_contact(&state, &created.owner, request("B", "B", &[])).unwrap();
        create_contact(&state, &created.owner, request("C", "C", &[])).unwrap();

        let deleted =
            bulk_delete_contacts(&state, &created.owner, &[a.id, b.id, Uuid::now_v7()]).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(
            list_contacts(&state, &created.owner, ContactQuery::default())
                .unwrap()
                .total,
            1
        );
    }

    #[test]
    fn test_contact_stats_and_tags() {
        let (state, created) = setup();
        let mut body = request("Ada", "Lovelace", &["VIP", "Enterprise"]);
        body.source = Some(LeadSource::Referral);
        create_contact(&state, &created.owner, body).unwrap();
        let mut body = request("Bob", "Builder", &["VIP"]);
        body.status = Some(ContactStatus::Inactive);
        create_contact(&state, &created.owner, body).unwrap();
        let old = create_contact(&state, &created.owner, request("Old", "Timer", &[])).unwrap();
        let mut old = state.store.contacts().get(old.id).unwrap();
        old.created_at = Utc::now() - Duration::days(45);
        state.store.contacts().update(old).unwrap();

        let stats = contact_stats(&state, &created.owner).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.by_source.get(&LeadSource::Referral), Some(&1));
        assert_eq!(stats.by_tag.get("VIP"), Some(&2));
        assert_eq!(stats.recent_count, 2);

        let tags = contact_tags(&state, &created.owner).unwrap();
        assert_eq!(
            tags,
            vec![
                TagUsage {
                    name: "VIP".into(),
                    usage_count: 2
                },
                TagUsage {
                    name: "Enterprise".into(),
                    usage_count: 1
                },
            ]
        );
    }
}
