//! JSON snapshot of every collection.
//!
//! The snapshot is the on-disk equivalent of the browser storage keys the
//! mock backend used: one array per entity.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crm_common::{Contact, Invitation, Lead, Organization, OrganizationMember, Role, Team};
use serde::{Deserialize, Serialize};

use super::StoreResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub members: Vec<OrganizationMember>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub invitations: Vec<Invitation>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub leads: Vec<Lead>,
}

impl Snapshot {
    /// Read a snapshot, returning `None` if the file does not exist.
    pub fn read(path: &Path) -> StoreResult<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the snapshot, replacing the file atomically.
    pub fn write(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "Snapshot written");
        Ok(())
    }
}
