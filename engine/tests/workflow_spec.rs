mod common;

use chrono::Duration;
use futures_util::StreamExt;
use pass_engine::service::RequestChange;
use pass_engine::{DocumentStore, EngineError};
use passes::layout;
use passes::{PassError, PassStatus, PassType};
use serde_json::json;

use common::{draft, service, t0, user};

#[tokio::test]
async fn outing_routes_to_block_warden() {
    let (_store, svc) = service().await;
    let s = user(&svc, "s101");
    let req = svc.submit(&s, draft(PassType::Outing, "market"), t0()).await.unwrap();

    assert!(!req.id.is_empty());
    assert_eq!(req.status, PassStatus::Pending);
    assert_eq!(req.assigned_warden.as_deref(), Some("w-a"));
    assert!(req.assigned_hod.is_none());

    let wa = user(&svc, "w-a");
    assert_eq!(svc.queue(&wa, t0()).await.unwrap().len(), 1);
    assert!(svc.queue(&user(&svc, "w-b"), t0()).await.unwrap().is_empty());
    assert!(svc.queue(&user(&svc, "hod-cse"), t0()).await.unwrap().is_empty());

    let now = t0() + Duration::minutes(5);
    let done = svc.approve(&wa, &req.id, now).await.unwrap();
    assert_eq!(done.status, PassStatus::WardenApproved);
    assert_eq!(done.expires_at, Some(now + Duration::hours(24)));
    assert!(svc.queue(&wa, now).await.unwrap().is_empty());

    let mine = svc.queue(&s, now).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, PassStatus::WardenApproved);
    assert_eq!(mine[0].warden_approved_by.as_deref(), Some("w-a"));
}

#[tokio::test]
async fn home_visit_needs_hod_before_warden() {
    let (_store, svc) = service().await;
    let s = user(&svc, "s101");
    let wa = user(&svc, "w-a");
    let hod = user(&svc, "hod-cse");
    let req = svc
        .submit(&s, draft(PassType::HomeVisit, "sister's wedding"), t0())
        .await
        .unwrap();
    assert_eq!(req.assigned_hod.as_deref(), Some("hod-cse"));
    assert_eq!(req.assigned_warden.as_deref(), Some("w-a"));

    assert!(svc.queue(&wa, t0()).await.unwrap().is_empty());
    let err = svc.approve(&wa, &req.id, t0()).await.unwrap_err();
    assert!(matches!(err, EngineError::Pass(PassError::Transition(_))));

    assert_eq!(svc.queue(&hod, t0()).await.unwrap().len(), 1);
    let mid = svc.approve(&hod, &req.id, t0()).await.unwrap();
    assert_eq!(mid.status, PassStatus::HodApproved);
    assert!(mid.granted_at.is_none());

    assert!(svc.queue(&hod, t0()).await.unwrap().is_empty());
    assert_eq!(svc.queue(&wa, t0()).await.unwrap().len(), 1);
    let done = svc.approve(&wa, &req.id, t0()).await.unwrap();
    assert_eq!(done.status, PassStatus::WardenApproved);
    assert_eq!(done.hod_approved_by.as_deref(), Some("hod-cse"));
}

#[tokio::test]
async fn approvers_outside_the_route_are_refused() {
    let (_store, svc) = service().await;
    let req = svc
        .submit(&user(&svc, "s101"), draft(PassType::Outing, "dentist"), t0())
        .await
        .unwrap();

    let err = svc.approve(&user(&svc, "w-b"), &req.id, t0()).await.unwrap_err();
    assert!(matches!(err, EngineError::Pass(PassError::Forbidden { .. })));

    let err = svc
        .approve(&user(&svc, "s202"), &req.id, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Pass(_)));

    let err = svc.approve(&user(&svc, "w-a"), "missing", t0()).await.unwrap_err();
    assert!(matches!(err, EngineError::Pass(PassError::NotFound { .. })));
}

#[tokio::test]
async fn decline_is_final() {
    let (_store, svc) = service().await;
    let wa = user(&svc, "w-a");
    let hod = user(&svc, "hod-cse");

    let home = svc
        .submit(&user(&svc, "s101"), draft(PassType::HomeVisit, "home"), t0())
        .await
        .unwrap();
    svc.approve(&hod, &home.id, t0()).await.unwrap();
    let declined = svc
        .decline(&wa, &home.id, Some("exam week".into()), t0())
        .await
        .unwrap();
    assert_eq!(declined.status, PassStatus::Declined);
    assert_eq!(declined.decline_reason.as_deref(), Some("exam week"));

    assert!(svc.approve(&wa, &home.id, t0()).await.is_err());
    assert!(svc.decline(&wa, &home.id, None, t0()).await.is_err());
    assert!(svc.decline(&hod, &home.id, None, t0()).await.is_err());
}

#[tokio::test]
async fn duplicate_submissions_are_debounced() {
    let (_store, svc) = service().await;
    let s = user(&svc, "s101");

    svc.submit(&s, draft(PassType::Outing, "Market run"), t0()).await.unwrap();
    let err = svc
        .submit(&s, draft(PassType::Outing, "market run"), t0() + Duration::seconds(3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Pass(PassError::Duplicate)));

    // different reason is a different submission
    svc.submit(&s, draft(PassType::Outing, "library"), t0() + Duration::seconds(3))
        .await
        .unwrap();
    // window elapsed
    svc.submit(&s, draft(PassType::Outing, "market run"), t0() + Duration::seconds(11))
        .await
        .unwrap();
    assert_eq!(svc.fetch_all(t0() + Duration::minutes(1)).await.unwrap().len(), 3);
}

#[tokio::test]
async fn submission_is_validated() {
    let (_store, svc) = service().await;
    let s = user(&svc, "s101");

    let mut d = draft(PassType::HomeVisit, "home");
    d.return_date = None;
    assert!(svc.submit(&s, d, t0()).await.is_err());

    let mut d = draft(PassType::HomeVisit, "home");
    d.return_date = chrono::NaiveDate::from_ymd_opt(2026, 10, 1);
    assert!(svc.submit(&s, d, t0()).await.is_err());

    assert!(svc.submit(&s, draft(PassType::Outing, "   "), t0()).await.is_err());

    let err = svc
        .submit(&user(&svc, "w-a"), draft(PassType::Outing, "x"), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Pass(PassError::Forbidden { .. })));
}

#[tokio::test]
async fn only_requester_deletes_and_only_while_pending() {
    let (store, svc) = service().await;
    let s = user(&svc, "s101");
    let a = svc.submit(&s, draft(PassType::Outing, "one"), t0()).await.unwrap();
    let b = svc.submit(&s, draft(PassType::Outing, "two"), t0()).await.unwrap();

    assert!(svc.delete_own(&user(&svc, "s202"), &a.id).await.is_err());
    svc.delete_own(&s, &a.id).await.unwrap();
    assert!(store
        .get(&layout::current_path("s101", &a.id))
        .await
        .unwrap()
        .is_none());

    svc.approve(&user(&svc, "w-a"), &b.id, t0()).await.unwrap();
    let err = svc.delete_own(&s, &b.id).await.unwrap_err();
    assert!(err.to_string().contains("can no longer be deleted"));
}

#[tokio::test]
async fn legacy_records_are_read_and_updated_in_place() {
    let (store, svc) = service().await;
    store
        .set(
            &layout::legacy_path("legacy-1"),
            json!({
                "type": "home",
                "studentId": "s202",
                "department": "ECE",
                "block": "B(Girls)",
                "reason": "festival",
                "fromDate": "2026-10-20",
                "status": "pending",
                "createdAt": (t0() - Duration::hours(1)).to_rfc3339(),
            }),
        )
        .await
        .unwrap();

    // unassigned: routed through the department table and the block
    let hod = user(&svc, "hod-ece");
    let queue = svc.queue(&hod, t0()).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, "legacy-1");

    svc.approve(&hod, "legacy-1", t0()).await.unwrap();
    let doc = store.get("passRequests/legacy-1").await.unwrap().unwrap();
    assert_eq!(doc["status"], "hod_approved");
    assert_eq!(doc["type"], "home_visit");
    assert_eq!(store.list("passRequests/s202").await.unwrap().len(), 0);

    assert!(doc.get("studentId").is_none());
    assert!(doc.get("fromDate").is_none());
    assert_eq!(doc["requesterId"], "s202");

    let wb = user(&svc, "w-b");
    assert_eq!(svc.queue(&wb, t0()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn legacy_record_survives_every_stage_and_is_swept() {
    let (store, svc) = service().await;
    let path = layout::legacy_path("legacy-2");
    store
        .set(
            &path,
            json!({
                "type": "homeVisit",
                "studentId": "s101",
                "studentName": "Asha",
                "department": "CSE",
                "block": "A(Boys)",
                "reason": "harvest",
                "fromDate": "2026-10-20",
                "toDate": "2026-10-22",
                "status": "pending",
                "createdAt": t0().timestamp_millis(),
            }),
        )
        .await
        .unwrap();

    let hod = user(&svc, "hod-cse");
    let wa = user(&svc, "w-a");
    svc.approve(&hod, "legacy-2", t0()).await.unwrap();
    assert_eq!(svc.queue(&wa, t0()).await.unwrap().len(), 1);

    let done = svc.approve(&wa, "legacy-2", t0()).await.unwrap();
    assert_eq!(done.status, PassStatus::WardenApproved);
    assert_eq!(done.requester_name.as_deref(), Some("Asha"));

    let all = svc.fetch_all(t0()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, PassStatus::WardenApproved);
    assert_eq!(all[0].hod_approved_by.as_deref(), Some("hod-cse"));

    let mine = svc.queue(&user(&svc, "s101"), t0()).await.unwrap();
    assert_eq!(mine.len(), 1);

    let report = svc.sweep(t0() + Duration::days(4)).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.unreadable, 0);
    assert!(store.get(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn current_layout_wins_over_legacy_copy() {
    let (store, svc) = service().await;
    let base = json!({
        "type": "outing",
        "requesterId": "s101",
        "block": "A(Boys)",
        "createdAt": t0().timestamp_millis(),
    });
    let mut legacy = base.clone();
    legacy["reason"] = json!("old copy");
    let mut current = base;
    current["reason"] = json!("new copy");
    store.set("passRequests/dup-1", legacy).await.unwrap();
    store.set("passRequests/s101/dup-1", current).await.unwrap();

    let all = svc.fetch_all(t0()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].reason, "new copy");
}

#[tokio::test]
async fn unmapped_requests_stay_unassigned() {
    let (_store, svc) = service().await;
    let req = svc
        .submit(&user(&svc, "s303"), draft(PassType::HomeVisit, "home"), t0())
        .await
        .unwrap();
    assert!(req.assigned_hod.is_none());
    assert!(req.assigned_warden.is_none());
    for staff in ["w-a", "w-b", "hod-cse", "hod-ece"] {
        assert!(svc.queue(&user(&svc, staff), t0()).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn bulk_approve_only_touches_actionable_requests() {
    let (_store, svc) = service().await;
    let s = user(&svc, "s101");
    let wa = user(&svc, "w-a");
    svc.submit(&s, draft(PassType::Outing, "a"), t0()).await.unwrap();
    svc.submit(&s, draft(PassType::Outing, "b"), t0()).await.unwrap();
    let home = svc.submit(&s, draft(PassType::HomeVisit, "c"), t0()).await.unwrap();
    // another block's request
    svc.submit(&user(&svc, "s202"), draft(PassType::Outing, "d"), t0())
        .await
        .unwrap();

    let outcomes = svc.approve_all(&wa, t0()).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let home_now = svc.get(&home.id).await.unwrap().unwrap();
    assert_eq!(home_now.request.status, PassStatus::Pending);
    assert_eq!(svc.queue(&user(&svc, "w-b"), t0()).await.unwrap().len(), 1);

    let hod = user(&svc, "hod-cse");
    let declined = svc.decline_all(&hod, Some("closed".into()), t0()).await.unwrap();
    assert_eq!(declined.len(), 1);
    assert!(svc.approve_all(&s, t0()).await.is_err());
}

#[tokio::test]
async fn stale_requests_are_hidden_before_sweep() {
    let (_store, svc) = service().await;
    let s = user(&svc, "s101");
    let req = svc.submit(&s, draft(PassType::Outing, "x"), t0()).await.unwrap();

    let later = t0() + Duration::days(3) + Duration::minutes(1);
    assert!(svc.fetch_all(later).await.unwrap().is_empty());
    assert!(svc.queue(&user(&svc, "w-a"), later).await.unwrap().is_empty());
    assert!(svc.approve(&user(&svc, "w-a"), &req.id, later).await.is_err());
    // still stored until swept
    assert!(svc.get(&req.id).await.unwrap().is_some());
}

#[tokio::test]
async fn history_lists_what_an_approver_touched() {
    let (_store, svc) = service().await;
    let s = user(&svc, "s101");
    let wa = user(&svc, "w-a");
    let a = svc.submit(&s, draft(PassType::Outing, "a"), t0()).await.unwrap();
    svc.submit(&s, draft(PassType::Outing, "b"), t0()).await.unwrap();
    svc.decline(&wa, &a.id, None, t0()).await.unwrap();

    let h = svc.history(&wa, t0()).await.unwrap();
    assert_eq!(h.len(), 1);
    assert_eq!(h[0].id, a.id);
}

#[tokio::test]
async fn subscribers_receive_normalised_changes() {
    let (_store, svc) = service().await;
    let mut changes = svc.subscribe().await.unwrap();
    let s = user(&svc, "s101");
    let req = svc.submit(&s, draft(PassType::Outing, "x"), t0()).await.unwrap();
    svc.delete_own(&s, &req.id).await.unwrap();

    match changes.next().await {
        Some(RequestChange::Upserted(r)) => {
            assert_eq!(r.id, req.id);
            assert_eq!(r.status, PassStatus::Pending);
        }
        other => panic!("unexpected change: {:?}", other),
    }
    assert_eq!(
        changes.next().await,
        Some(RequestChange::Removed { id: req.id.clone() })
    );
}

#[tokio::test]
async fn login_uses_the_loaded_directory() {
    let (_store, svc) = service().await;
    let session = svc.login("hod-ece", "pw", t0()).unwrap();
    assert_eq!(session.user.id, "hod-ece");
    assert!(svc.login("hod-ece", "wrong", t0()).is_err());
}
