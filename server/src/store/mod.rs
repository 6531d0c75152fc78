//! Persistence layer.
//!
//! Services never touch global state: they receive a [`Store`], which exposes
//! one typed [`Collection`] per entity. [`MemoryStore`] is the in-process
//! implementation, optionally mirrored to a JSON snapshot file.

pub mod memory;
pub mod snapshot;

use crm_common::{Contact, Invitation, Lead, Organization, OrganizationMember, Role, Team};
use thiserror::Error;
use uuid::Uuid;

pub use memory::{MemoryStore, Table};
pub use snapshot::Snapshot;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("{kind} {id} already exists")]
    Conflict { kind: &'static str, id: Uuid },

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Records
// ============================================================================

/// An entity kept in a [`Collection`].
pub trait Record: Clone + Send + Sync + 'static {
    /// Entity name used in errors and logs.
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    /// Owning organization (an organization owns itself).
    fn organization_id(&self) -> Uuid;
}

macro_rules! impl_record {
    ($ty:ty, $kind:literal, |$r:ident| $org:expr) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn organization_id(&self) -> Uuid {
                let $r = self;
                $org
            }
        }
    };
}

impl_record!(Organization, "organization", |r| r.id);
impl_record!(Role, "role", |r| r.organization_id);
impl_record!(OrganizationMember, "member", |r| r.organization_id);
impl_record!(Team, "team", |r| r.organization_id);
impl_record!(Invitation, "invitation", |r| r.organization_id);
impl_record!(Contact, "contact", |r| r.organization_id);
impl_record!(Lead, "lead", |r| r.organization_id);

// ============================================================================
// Repository Interfaces
// ============================================================================

/// CRUD access to one entity type.
pub trait Collection<T: Record>: Send + Sync {
    fn get(&self, id: Uuid) -> Option<T>;

    /// All records, ordered by id.
    fn list(&self) -> Vec<T>;

    /// Insert a new record. Fails with `Conflict` if the id is taken.
    fn insert(&self, record: T) -> StoreResult<T>;

    /// Replace an existing record. Fails with `NotFound` if absent.
    fn update(&self, record: T) -> StoreResult<T>;

    /// Delete and return a record. Fails with `NotFound` if absent.
    fn remove(&self, id: Uuid) -> StoreResult<T>;

    /// Records owned by `organization_id`, ordered by id.
    fn list_by_organization(&self, organization_id: Uuid) -> Vec<T> {
        self.list()
            .into_iter()
            .filter(|r| r.organization_id() == organization_id)
            .collect()
    }

    /// Fetch a record that must exist.
    fn require(&self, id: Uuid) -> StoreResult<T> {
        self.get(id).ok_or(StoreError::NotFound { kind: T::KIND, id })
    }
}

/// The full set of collections backing the CRM.
pub trait Store: Send + Sync {
    fn organizations(&self) -> &dyn Collection<Organization>;
    fn roles(&self) -> &dyn Collection<Role>;
    fn members(&self) -> &dyn Collection<OrganizationMember>;
    fn teams(&self) -> &dyn Collection<Team>;
    fn invitations(&self) -> &dyn Collection<Invitation>;
    fn contacts(&self) -> &dyn Collection<Contact>;
    fn leads(&self) -> &dyn Collection<Lead>;

    /// Persist pending changes, if the store has a backing file.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}
