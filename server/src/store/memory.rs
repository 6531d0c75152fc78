//! In-memory store backed by `DashMap`.
//!
//! Writes are last-writer-wins per record; there are no transactions across
//! records. When opened with a snapshot path, [`Store::flush`] rewrites the
//! whole snapshot file.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crm_common::{Contact, Invitation, Lead, Organization, OrganizationMember, Role, Team};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::snapshot::Snapshot;
use super::{Collection, Record, Store, StoreError, StoreResult};

/// One concurrently accessible table of records keyed by id.
#[derive(Debug)]
pub struct Table<T> {
    rows: DashMap<Uuid, T>,
}

impl<T: Record> Table<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    fn from_rows(rows: Vec<T>) -> Self {
        let table = Self::new();
        for row in rows {
            table.rows.insert(row.id(), row);
        }
        table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Collection<T> for Table<T> {
    fn get(&self, id: Uuid) -> Option<T> {
        self.rows.get(&id).map(|r| r.value().clone())
    }

    fn list(&self) -> Vec<T> {
        let mut rows: Vec<T> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|r| r.id());
        rows
    }

    fn insert(&self, record: T) -> StoreResult<T> {
        let id = record.id();
        match self.rows.entry(id) {
            Entry::Occupied(_) => Err(StoreError::Conflict { kind: T::KIND, id }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    fn update(&self, record: T) -> StoreResult<T> {
        let id = record.id();
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                *row = record.clone();
                Ok(record)
            }
            None => Err(StoreError::NotFound { kind: T::KIND, id }),
        }
    }

    fn remove(&self, id: Uuid) -> StoreResult<T> {
        self.rows
            .remove(&id)
            .map(|(_, row)| row)
            .ok_or(StoreError::NotFound { kind: T::KIND, id })
    }
}

/// In-process [`Store`] with optional JSON snapshot persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    organizations: Table<Organization>,
    roles: Table<Role>,
    members: Table<OrganizationMember>,
    teams: Table<Team>,
    invitations: Table<Invitation>,
    contacts: Table<Contact>,
    leads: Table<Lead>,
    snapshot_path: Option<PathBuf>,
    flush_lock: Mutex<()>,
}

impl MemoryStore {
    /// Empty store with no backing file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store mirrored to `path`, loading it if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let snapshot = Snapshot::read(&path)?.unwrap_or_default();
        let mut store = Self::from_snapshot(snapshot);
        tracing::info!(
            path = %path.display(),
            organizations = store.organizations.len(),
            "Store opened"
        );
        store.snapshot_path = Some(path);
        Ok(store)
    }

    /// Build a store holding the records of `snapshot`.
    ///
    /// Duplicate ids within a collection keep the last record.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            organizations: Table::from_rows(snapshot.organizations),
            roles: Table::from_rows(snapshot.roles),
            members: Table::from_rows(snapshot.members),
            teams: Table::from_rows(snapshot.teams),
            invitations: Table::from_rows(snapshot.invitations),
            contacts: Table::from_rows(snapshot.contacts),
            leads: Table::from_rows(snapshot.leads),
            snapshot_path: None,
            flush_lock: Mutex::new(()),
        }
    }

    /// Copy every collection into a [`Snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            organizations: self.organizations.list(),
            roles: self.roles.list(),
            members: self.members.list(),
            teams: self.teams.list(),
            invitations: self.invitations.list(),
            contacts: self.contacts.list(),
            leads: self.leads.list(),
        }
    }

    /// Backing file, if any.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

impl Store for MemoryStore {
    fn organizations(&self) -> &dyn Collection<Organization> {
        &self.organizations
    }

    fn roles(&self) -> &dyn Collection<Role> {
        &self.roles
    }

    fn members(&self) -> &dyn Collection<OrganizationMember> {
        &self.members
    }

    fn teams(&self) -> &dyn Collection<Team> {
        &self.teams
    }

    fn invitations(&self) -> &dyn Collection<Invitation> {
        &self.invitations
    }

    fn contacts(&self) -> &dyn Collection<Contact> {
        &self.contacts
    }

    fn leads(&self) -> &dyn Collection<Lead> {
        &self.leads
    }

    fn flush(&self) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.snapshot().write(path)
    }
}
