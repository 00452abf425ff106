//! Routing of a submitted request to its approvers.
//!
//! Wardens are found by an exact match on their `block`. HODs are found via a
//! fixed department table: several departments can share one HOD.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::warn;

use crate::directory::Directory;
use crate::error::PassError;
use crate::model::{PassType, User};

static DEFAULT_HOD_DEPARTMENTS: Lazy<HashMap<String, String>> = Lazy::new(|| {
    [
        ("CSE", "hod-cse"),
        ("CSE(AI&ML)", "hod-cse"),
        ("CSE(DS)", "hod-cse"),
        ("IT", "hod-it"),
        ("ECE", "hod-ece"),
        ("EEE", "hod-eee"),
        ("MECH", "hod-mech"),
        ("CIVIL", "hod-civil"),
    ]
    .into_iter()
    .map(|(d, h)| (d.to_string(), h.to_string()))
    .collect()
});

/// Department name → HOD user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentTable(HashMap<String, String>);

impl Default for DepartmentTable {
    fn default() -> Self {
        Self(DEFAULT_HOD_DEPARTMENTS.clone())
    }
}

impl DepartmentTable {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    /// Parse a JSON object such as `{"CSE": "hod-cse", "IT": "hod-it"}`.
    pub fn from_json(raw: &str) -> Result<Self, PassError> {
        serde_json::from_str(raw)
            .map(Self)
            .map_err(|e| PassError::Config {
                var: "PASS_HOD_DEPARTMENTS".to_string(),
                message: e.to_string(),
            })
    }

    pub fn hod_for(&self, department: &str) -> Option<&str> {
        self.0.get(department).map(String::as_str)
    }

    pub fn departments_of(&self, hod_id: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .0
            .iter()
            .filter(|(_, h)| h.as_str() == hod_id)
            .map(|(d, _)| d.as_str())
            .collect();
        out.sort_unstable();
        out
    }
}

/// First warden whose stored block equals `block` exactly.
pub fn warden_for_block<'a>(wardens: &'a [User], block: &str) -> Option<&'a User> {
    wardens.iter().find(|w| w.block.as_deref() == Some(block))
}

/// HOD for `department` via the table, if that HOD is in the directory.
pub fn hod_for_department<'a>(
    hods: &'a [User],
    table: &DepartmentTable,
    department: &str,
) -> Option<&'a User> {
    let hod_id = table.hod_for(department)?;
    hods.iter().find(|h| h.id == hod_id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub warden: Option<String>,
    pub hod: Option<String>,
}

/// Resolve approvers for a new request. Outings never get a HOD. Missing
/// matches leave the request unassigned.
pub fn resolve(
    directory: &Directory,
    table: &DepartmentTable,
    pass_type: PassType,
    block: &str,
    department: &str,
) -> Assignment {
    let warden = warden_for_block(&directory.wardens, block).map(|w| w.id.clone());
    if warden.is_none() {
        warn!(%block, "no warden for block; request will be unassigned");
    }

    let hod = if pass_type.needs_hod() {
        let hod = hod_for_department(&directory.hods, table, department).map(|h| h.id.clone());
        if hod.is_none() {
            warn!(%department, "no HOD for department; request will be unassigned");
        }
        hod
    } else {
        None
    };

    Assignment { warden, hod }
}
