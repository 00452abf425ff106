#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pass_engine::directory::seed_directory;
use pass_engine::store::MemoryStore;
use pass_engine::PassService;
use passes::config::PassesConfig;
use passes::directory::Directory;
use passes::{PassDraft, PassType, User};

pub const SEED: &str = r#"
students:
  - id: s101
    name: Asha
    credential: pw
    department: CSE
    block: A(Boys)
  - id: s202
    name: Bina
    credential: pw
    department: ECE
    block: B(Girls)
  - id: s303
    name: Chetan
    credential: pw
    department: ARCH
    block: C(Boys)
warden:
  - id: w-a
    name: Warden A
    credential: pw
    block: A(Boys)
  - id: w-b
    name: Warden B
    credential: pw
    block: B(Girls)
hod:
  - id: hod-cse
    name: Dr. Rao
    credential: pw
    department: CSE
  - id: hod-ece
    name: Dr. Iyer
    credential: pw
    department: ECE
"#;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
}

pub async fn service() -> (MemoryStore, Arc<PassService<MemoryStore>>) {
    let store = MemoryStore::new();
    let dir = Directory::from_yaml_str(SEED).unwrap();
    seed_directory(&store, &dir).await.unwrap();
    let svc = PassService::from_store(Arc::new(store.clone()), PassesConfig::default())
        .await
        .unwrap();
    (store, Arc::new(svc))
}

pub fn user(svc: &PassService<MemoryStore>, id: &str) -> User {
    svc.directory().find(id).cloned().unwrap()
}

pub fn draft(pass_type: PassType, reason: &str) -> PassDraft {
    PassDraft {
        pass_type,
        reason: reason.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        return_date: match pass_type {
            PassType::Outing => None,
            PassType::HomeVisit => NaiveDate::from_ymd_opt(2026, 10, 22),
        },
        room_number: Some("101".into()),
    }
}
