use chrono::{TimeZone, Utc};
use passes::auth::{self, AuthError, Session};
use passes::directory::Directory;
use passes::Role;

const SEED: &str = r#"
students:
  - id: s101
    name: Asha
    credential: pw-s
    department: CSE
    block: A(Boys)
warden:
  - id: w-a
    name: Warden A
    credential: pw-w
    block: A(Boys)
hod:
  - id: hod-cse
    name: Dr. Rao
    credential: pw-h
    department: CSE
"#;

#[test]
fn each_table_can_log_in() {
    let dir = Directory::from_yaml_str(SEED).unwrap();
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

    let s = auth::login(&dir, "s101", "pw-s", now).unwrap();
    assert_eq!(s.role(), Role::Student);
    assert!(s.user.credential.is_empty());

    assert_eq!(auth::login(&dir, "w-a", "pw-w", now).unwrap().role(), Role::Warden);
    assert_eq!(auth::login(&dir, " hod-cse ", "pw-h", now).unwrap().role(), Role::Hod);
}

#[test]
fn wrong_credential_and_unknown_user_look_the_same() {
    let dir = Directory::from_yaml_str(SEED).unwrap();
    let now = Utc::now();
    let a = auth::login(&dir, "s101", "nope", now).unwrap_err();
    let b = auth::login(&dir, "ghost", "pw-s", now).unwrap_err();
    assert!(matches!(a, AuthError::InvalidCredentials));
    assert_eq!(a.to_string(), b.to_string());
    // credential from another table does not cross over
    assert!(auth::login(&dir, "w-a", "pw-s", now).is_err());
}

#[test]
fn session_persists_without_credential() {
    let dir = Directory::from_yaml_str(SEED).unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("session.json");

    assert!(matches!(Session::load(&path), Err(AuthError::NoSession)));

    let s = auth::login(&dir, "w-a", "pw-w", Utc::now()).unwrap();
    s.save(&path).unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("pw-w"));

    let loaded = Session::load(&path).unwrap();
    assert_eq!(loaded, s);

    Session::clear(&path).unwrap();
    Session::clear(&path).unwrap();
    assert!(matches!(Session::load(&path), Err(AuthError::NoSession)));
}
