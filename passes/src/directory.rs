//! Static user directory: the `students`, `warden` and `hod` tables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PassError;
use crate::model::{Role, User};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub students: Vec<User>,
    #[serde(default, rename = "warden", alias = "wardens")]
    pub wardens: Vec<User>,
    #[serde(default, rename = "hod", alias = "hods")]
    pub hods: Vec<User>,
}

impl Directory {
    /// Build from the three tables, stamping each entry with the role its
    /// table implies.
    pub fn from_tables(students: Vec<User>, wardens: Vec<User>, hods: Vec<User>) -> Self {
        let mut dir = Self {
            students,
            wardens,
            hods,
        };
        dir.stamp_roles();
        dir
    }

    /// Parse a YAML seed file of the form `{students: [...], warden: [...], hod: [...]}`.
    pub fn from_yaml_str(raw: &str) -> Result<Self, PassError> {
        let mut dir: Directory =
            serde_yaml::from_str(raw).map_err(|e| PassError::Directory {
                message: e.to_string(),
            })?;
        dir.stamp_roles();
        dir.validate()?;
        Ok(dir)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, PassError> {
        let raw = std::fs::read_to_string(path).map_err(|e| PassError::Directory {
            message: format!("reading {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&raw)
    }

    fn stamp_roles(&mut self) {
        for (users, role) in [
            (&mut self.students, Role::Student),
            (&mut self.wardens, Role::Warden),
            (&mut self.hods, Role::Hod),
        ] {
            for user in users.iter_mut() {
                user.role = role;
            }
        }
    }

    /// Ids must be present and unique across all three tables.
    pub fn validate(&self) -> Result<(), PassError> {
        let mut seen = std::collections::HashSet::new();
        for user in self.all() {
            if user.id.trim().is_empty() {
                return Err(PassError::Directory {
                    message: format!("{} entry '{}' has no id", user.role, user.name),
                });
            }
            if !seen.insert(user.id.as_str()) {
                return Err(PassError::Directory {
                    message: format!("duplicate user id '{}'", user.id),
                });
            }
        }
        Ok(())
    }

    pub fn table(&self, role: Role) -> &[User] {
        match role {
            Role::Student => &self.students,
            Role::Warden => &self.wardens,
            Role::Hod => &self.hods,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &User> {
        self.students
            .iter()
            .chain(self.wardens.iter())
            .chain(self.hods.iter())
    }

    pub fn find(&self, id: &str) -> Option<&User> {
        self.all().find(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.students.len() + self.wardens.len() + self.hods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
