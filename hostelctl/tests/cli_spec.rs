use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const USERS: &str = r#"
students:
  - id: s101
    name: Asha
    credential: pw
    department: CSE
    block: A(Boys)
warden:
  - id: w-a
    name: Warden A
    credential: pw
    block: A(Boys)
hod:
  - id: hod-cse
    name: Dr. Rao
    credential: pw
    department: CSE
"#;

fn hostelctl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hostelctl").unwrap();
    cmd.env_remove("HOSTEL_BACKEND")
        .env_remove("HOSTEL_PASSWORD")
        .env("HOSTEL_STORE", dir.join("store.json"))
        .env("HOSTEL_SESSION", dir.join("session.json"));
    cmd
}

fn seeded() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let users = dir.path().join("users.yaml");
    std::fs::write(&users, USERS).unwrap();
    hostelctl(dir.path())
        .arg("seed")
        .arg(&users)
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded 3 users"));
    dir
}

fn login(dir: &Path, user: &str) {
    hostelctl(dir)
        .args(["login", user, "--password", "pw"])
        .assert()
        .success();
}

fn list_json(dir: &Path) -> Vec<Value> {
    let out = hostelctl(dir).args(["list", "--json"]).output().unwrap();
    assert!(out.status.success());
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn given_help_flag_then_all_subcommands_are_listed() {
    let mut cmd = Command::cargo_bin("hostelctl").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("approve-all"))
        .stdout(predicate::str::contains("decline-all"))
        .stdout(predicate::str::contains("sweep"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn given_wrong_password_when_login_then_rejected() {
    let dir = seeded();
    hostelctl(dir.path())
        .args(["login", "s101", "--password", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid username or credential"));
    hostelctl(dir.path())
        .args(["login", "ghost", "--password", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid username or credential"));
}

#[test]
fn given_login_then_whoami_until_logout() {
    let dir = seeded();
    login(dir.path(), "w-a");
    hostelctl(dir.path())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("w-a (warden)"))
        .stdout(predicate::str::contains("block: A(Boys)"));

    hostelctl(dir.path()).arg("logout").assert().success();
    hostelctl(dir.path())
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("hostelctl login"));
}

#[test]
fn given_outing_when_warden_approves_then_student_sees_granted_pass() {
    let dir = seeded();
    login(dir.path(), "s101");
    hostelctl(dir.path())
        .args(["submit", "--type", "outing", "--reason", "market", "--date", "2026-10-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Submitted outing request"))
        .stdout(predicate::str::contains("warden: w-a"));

    let mine = list_json(dir.path());
    assert_eq!(mine.len(), 1);
    let id = mine[0]["id"].as_str().unwrap().to_string();
    assert_eq!(mine[0]["status"], "pending");

    // students cannot approve
    hostelctl(dir.path())
        .args(["approve", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: could not approve request"));

    login(dir.path(), "w-a");
    assert_eq!(list_json(dir.path()).len(), 1);
    hostelctl(dir.path())
        .args(["approve", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now warden_approved"));
    assert!(list_json(dir.path()).is_empty());

    login(dir.path(), "s101");
    let mine = list_json(dir.path());
    assert_eq!(mine[0]["status"], "warden_approved");
    assert!(mine[0]["expiresAt"].is_number());

    hostelctl(dir.path())
        .args(["delete", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("can no longer be deleted"));
}

#[test]
fn given_home_visit_then_hod_acts_before_warden() {
    let dir = seeded();
    login(dir.path(), "s101");
    hostelctl(dir.path())
        .args(["submit", "--type", "home_visit", "--reason", "wedding", "--date", "2026-10-20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("return date"));
    hostelctl(dir.path())
        .args([
            "submit",
            "--type",
            "home_visit",
            "--reason",
            "wedding",
            "--date",
            "2026-10-20",
            "--return-date",
            "2026-10-23",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("HOD: hod-cse"));

    login(dir.path(), "w-a");
    assert!(list_json(dir.path()).is_empty());

    login(dir.path(), "hod-cse");
    hostelctl(dir.path())
        .arg("approve-all")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 request(s) approved"));

    login(dir.path(), "w-a");
    let queue = list_json(dir.path());
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["status"], "hod_approved");
    hostelctl(dir.path())
        .args(["decline-all", "--reason", "exams"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 request(s) declined"));

    hostelctl(dir.path())
        .args(["list", "--history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("declined"));
}

#[test]
fn given_pending_request_then_student_can_withdraw_it() {
    let dir = seeded();
    login(dir.path(), "s101");
    hostelctl(dir.path())
        .args(["submit", "--type", "outing", "--reason", "bank", "--date", "2026-10-20"])
        .assert()
        .success();
    let id = list_json(dir.path())[0]["id"].as_str().unwrap().to_string();

    hostelctl(dir.path())
        .args(["delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"));
    assert!(list_json(dir.path()).is_empty());
}

#[test]
fn given_fresh_store_when_sweep_then_nothing_deleted() {
    let dir = seeded();
    hostelctl(dir.path())
        .arg("sweep")
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted 0"));
}

#[test]
fn given_version_flag_then_prints_package_version() {
    let mut cmd = Command::cargo_bin("hostelctl").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));

    let mut cmd = Command::cargo_bin("hostelctl").unwrap();
    cmd.arg("version").assert().failure();
}
