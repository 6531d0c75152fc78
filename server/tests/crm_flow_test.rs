//! Contacts and leads through the service layer, gated by preset roles.

mod helpers;

use crm_common::{ContactStatus, LeadSource, LeadStatus, Module, Permission};
use crm_server::config::Config;
use crm_server::crm::{
    bulk_delete_contacts, contact_stats, convert_lead, create_contact, create_lead,
    delete_contact, delete_lead, get_contact, get_lead, lead_stats, leads_by_status,
    list_contacts, list_leads, update_lead_status, ContactFilters, ContactQuery, ConvertLeadRequest,
    CreateContactRequest, CreateLeadRequest, CrmError, LeadQuery, LeadSortField, SortOrder,
};
use crm_server::organization::{create_organization, CreateOrganizationRequest};
use crm_server::permissions::{PermissionError, RolePreset};
use crm_server::state::AppState;
use helpers::{create_org, member_with, profile, test_state};

fn contact(first: &str, last: &str, company: &str) -> CreateContactRequest {
    CreateContactRequest {
        first_name: first.into(),
        last_name: last.into(),
        email: format!("{}@{}.test", first.to_lowercase(), company.to_lowercase()),
        company: Some(company.into()),
        ..Default::default()
    }
}

#[test]
fn test_member_pipeline_workflow() {
    let state = test_state();
    let created = create_org(&state, "Acme");
    let org_id = created.organization.id;
    let rep = member_with(&state, org_id, RolePreset::Member, "rep@acme.test");

    let mut body =
        CreateLeadRequest::new("Jordan Rivera", "jordan@startup.test", LeadSource::Website);
    body.score = Some(70);
    body.assigned_to = Some(rep.id);
    let lead = create_lead(&state, &rep, body).unwrap();
    assert_eq!(lead.created_by, rep.id);

    update_lead_status(&state, &rep, lead.id, LeadStatus::Qualified).unwrap();
    let board = leads_by_status(&state, &rep).unwrap();
    assert_eq!(board[&LeadStatus::Qualified].len(), 1);
    assert!(board[&LeadStatus::New].is_empty());

    let converted = convert_lead(
        &state,
        &rep,
        lead.id,
        ConvertLeadRequest {
            create_contact: true,
            contact_data: None,
        },
    )
    .unwrap();
    let new_contact = converted.contact.unwrap();
    assert_eq!(new_contact.assigned_to, Some(rep.id));
    assert_eq!(get_contact(&state, &rep, new_contact.id).unwrap().email, "jordan@startup.test");

    let stats = lead_stats(&state, &rep).unwrap();
    assert_eq!(stats.by_status[&LeadStatus::Converted], 1);
    assert!((stats.conversion_rate - 100.0).abs() < f64::EPSILON);

    // Members contribute but cannot delete
    let err = delete_lead(&state, &rep, lead.id).unwrap_err();
    assert!(matches!(
        err,
        CrmError::Permission(PermissionError::MissingPermission {
            module: Module::Leads,
            permission: Permission::Delete,
        })
    ));
    let err = delete_contact(&state, &rep, new_contact.id).unwrap_err();
    assert!(matches!(err, CrmError::Permission(_)));

    delete_lead(&state, &created.owner, lead.id).unwrap();
    let err = get_lead(&state, &rep, lead.id).unwrap_err();
    assert!(matches!(err, CrmError::LeadNotFound));
}

#[test]
fn test_viewer_is_read_only() {
    let state = test_state();
    let created = create_org(&state, "Acme");
    let org_id = created.organization.id;
    let viewer = member_with(&state, org_id, RolePreset::Viewer, "v@acme.test");

    create_contact(&state, &created.owner, contact("Ada", "Lovelace", "Engines")).unwrap();

    assert_eq!(
        list_contacts(&state, &viewer, ContactQuery::default())
            .unwrap()
            .total,
        1
    );
    let err = create_contact(&state, &viewer, contact("Alan", "Turing", "Bletchley")).unwrap_err();
    assert!(matches!(err, CrmError::Permission(_)));
    let err = create_lead(
        &state,
        &viewer,
        CreateLeadRequest::new("Grace", "grace@navy.test", LeadSource::Referral),
    )
    .unwrap_err();
    assert!(matches!(err, CrmError::Permission(_)));
}

#[test]
fn test_records_are_scoped_to_the_organization() {
    let state = test_state();
    let acme = create_org(&state, "Acme");
    let globex = create_org(&state, "Globex");

    let c = create_contact(&state, &acme.owner, contact("Ada", "Lovelace", "Engines")).unwrap();
    let l = create_lead(
        &state,
        &acme.owner,
        CreateLeadRequest::new("Grace", "grace@navy.test", LeadSource::Event),
    )
    .unwrap();

    let err = get_contact(&state, &globex.owner, c.id).unwrap_err();
    assert!(matches!(err, CrmError::ContactNotFound));
    let err = get_lead(&state, &globex.owner, l.id).unwrap_err();
    assert!(matches!(err, CrmError::LeadNotFound));

    assert_eq!(bulk_delete_contacts(&state, &globex.owner, &[c.id]).unwrap(), 0);
    assert!(state.store.contacts().get(c.id).is_some());

    assert_eq!(contact_stats(&state, &globex.owner).unwrap().total, 0);
    assert_eq!(
        list_leads(&state, &globex.owner, LeadQuery::default())
            .unwrap()
            .total,
        0
    );

    // Assignees must belong to the same organization
    let mut body = contact("Alan", "Turing", "Bletchley");
    body.assigned_to = Some(globex.owner.id);
    let err = create_contact(&state, &acme.owner, body).unwrap_err();
    assert!(matches!(err, CrmError::Validation(_)));
}

#[test]
fn test_contact_listing_filters_and_pages() {
    let state = test_state();
    let created = create_org(&state, "Acme");

    for (first, last, company) in [
        ("Ada", "Lovelace", "Engines"),
        ("Alan", "Turing", "Bletchley"),
        ("Grace", "Hopper", "Navy"),
        ("Edsger", "Dijkstra", "Eindhoven"),
    ] {
        create_contact(&state, &created.owner, contact(first, last, company)).unwrap();
    }
    let mut inactive = contact("Barbara", "Liskov", "Mit");
    inactive.status = Some(ContactStatus::Inactive);
    create_contact(&state, &created.owner, inactive).unwrap();

    let page = list_contacts(
        &state,
        &created.owner,
        ContactQuery {
            filters: ContactFilters {
                status: vec![ContactStatus::Active],
                ..Default::default()
            },
            sort_by: Some(crm_server::crm::ContactSortField::LastName),
            sort_order: SortOrder::Asc,
            page: Some(2),
            page_size: Some(3),
        },
    )
    .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.total_pages, 2);
    let names: Vec<_> = page.data.iter().map(|c| c.last_name.as_str()).collect();
    assert_eq!(names, ["Turing"]);

    let page = list_contacts(
        &state,
        &created.owner,
        ContactQuery {
            filters: ContactFilters {
                search: Some("NAVY".into()),
                ..Default::default()
            },
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].first_name, "Grace");
}

#[test]
fn test_lead_sorting_by_value() {
    let state = test_state();
    let created = create_org(&state, "Acme");

    for (name, value) in [("Small", Some(100.0)), ("Big", Some(9000.0)), ("Unknown", None)] {
        let mut body = CreateLeadRequest::new(name, "x@prospect.test", LeadSource::Campaign);
        body.estimated_value = value;
        create_lead(&state, &created.owner, body).unwrap();
    }

    let page = list_leads(
        &state,
        &created.owner,
        LeadQuery {
            sort_by: Some(LeadSortField::EstimatedValue),
            sort_order: SortOrder::Desc,
            ..Default::default()
        },
    )
    .unwrap();
    let names: Vec<_> = page.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Big", "Small", "Unknown"]);
}

#[test]
fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default_for_test();
    config.snapshot_path = Some(dir.path().join("crm.json"));

    let (org_id, owner_id, lead_id) = {
        let state = AppState::from_config(config.clone()).unwrap();
        let created = create_organization(
            &state,
            &profile("owner@acme.test"),
            CreateOrganizationRequest {
                name: "Acme".into(),
                ..Default::default()
            },
        )
        .unwrap();
        let lead = create_lead(
            &state,
            &created.owner,
            CreateLeadRequest::new("Grace", "grace@navy.test", LeadSource::Referral),
        )
        .unwrap();
        (created.organization.id, created.owner.id, lead.id)
    };

    let state = AppState::from_config(config).unwrap();
    assert_eq!(state.store.roles().list_by_organization(org_id).len(), 5);
    let owner = state.store.members().get(owner_id).unwrap();
    let lead = get_lead(&state, &owner, lead_id).unwrap();
    assert_eq!(lead.name, "Grace");
}
