//! Loading and seeding the user tables held in the store.

use passes::directory::Directory;
use passes::layout::sanitize_key;
use passes::{Role, User};
use tracing::{info, warn};

use crate::store::{DocumentStore, StoreError};

fn user_path(role: Role, id: &str) -> String {
    format!("{}/{}", role.table(), sanitize_key(id))
}

async fn load_table<S: DocumentStore + ?Sized>(
    store: &S,
    role: Role,
) -> Result<Vec<User>, StoreError> {
    let mut users = Vec::new();
    for (path, value) in store.list(role.table()).await? {
        match serde_json::from_value::<User>(value) {
            Ok(mut user) => {
                if user.id.is_empty() {
                    user.id = path.rsplit('/').next().unwrap_or_default().to_string();
                }
                users.push(user);
            }
            Err(e) => warn!(%path, error = %e, "skipping unreadable user entry"),
        }
    }
    Ok(users)
}

/// Read the `students`, `warden` and `hod` tables.
pub async fn load_directory<S: DocumentStore + ?Sized>(store: &S) -> Result<Directory, StoreError> {
    let students = load_table(store, Role::Student).await?;
    let wardens = load_table(store, Role::Warden).await?;
    let hods = load_table(store, Role::Hod).await?;
    let dir = Directory::from_tables(students, wardens, hods);
    info!(
        students = dir.students.len(),
        wardens = dir.wardens.len(),
        hods = dir.hods.len(),
        "loaded user directory"
    );
    Ok(dir)
}

/// Write every directory entry to its table. Existing entries with the same
/// id are overwritten.
pub async fn seed_directory<S: DocumentStore + ?Sized>(
    store: &S,
    directory: &Directory,
) -> Result<usize, StoreError> {
    let mut written = 0;
    for user in directory.all() {
        let value = serde_json::to_value(user)?;
        store.set(&user_path(user.role, &user.id), value).await?;
        written += 1;
    }
    info!(written, "seeded user directory");
    Ok(written)
}
