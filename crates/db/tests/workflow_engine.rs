use std::sync::Arc;

use challan_core::audit::InMemoryAuditSink;
use challan_core::domain::challan::{ChallanId, Decision, Stage, StageStatus};
use challan_core::errors::{ErrorKind, WorkflowError};
use challan_core::workflow::{ChallanStore, DecideChallan, SubmitChallan, WorkflowEngine};
use challan_db::{connect_with_settings, migrations, DbPool, ReferenceSeed, SqlChallanStore};

async fn seeded_pool(url: &str, max_connections: u32) -> DbPool {
    let pool = connect_with_settings(url, max_connections, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    ReferenceSeed::load(&pool).await.expect("load reference seed");
    pool
}

async fn sql_engine() -> (DbPool, WorkflowEngine) {
    let pool = seeded_pool("sqlite::memory:", 1).await;
    let store: Arc<dyn ChallanStore> = Arc::new(SqlChallanStore::new(pool.clone()));
    (pool, WorkflowEngine::new(store))
}

fn submission(serial: &str) -> SubmitChallan {
    SubmitChallan {
        device_type: "phone".to_string(),
        device_model: "Samsung Galaxy S23".to_string(),
        serial_number: serial.to_string(),
        quantity: 1,
        purpose: "New employee onboarding".to_string(),
        requested_by: "alice_sales".to_string(),
    }
}

fn decision(
    id: ChallanId,
    stage: Stage,
    decision: Decision,
    actor: &str,
    remarks: Option<&str>,
) -> DecideChallan {
    DecideChallan {
        challan_id: id,
        stage,
        decision,
        actor: actor.to_string(),
        remarks: remarks.map(str::to_string),
    }
}

async fn pending_ids(engine: &WorkflowEngine, stage: Stage) -> Vec<ChallanId> {
    engine
        .pending_for(stage)
        .await
        .expect("pending list")
        .into_iter()
        .map(|challan| challan.id)
        .collect()
}

#[tokio::test]
async fn hod_rejection_ends_the_workflow() {
    let (_pool, engine) = sql_engine().await;
    let id = engine.submit(submission("SN-R1")).await.expect("submit");

    assert!(pending_ids(&engine, Stage::Manager).await.contains(&id));

    let after_manager = engine
        .decide(decision(id, Stage::Manager, Decision::Approved, "john_manager", None))
        .await
        .expect("manager approves");
    assert_eq!(after_manager.awaiting_stage(), Some(Stage::Hod));
    assert!(!pending_ids(&engine, Stage::Manager).await.contains(&id));
    assert!(pending_ids(&engine, Stage::Hod).await.contains(&id));

    let rejected = engine
        .decide(decision(id, Stage::Hod, Decision::Rejected, "mike_hod", Some("budget")))
        .await
        .expect("hod rejects");
    assert_eq!(rejected.final_status, StageStatus::Rejected);
    assert_eq!(rejected.remarks.as_deref(), Some("budget"));
    assert!(rejected.final_status_consistent());

    let error = engine
        .decide(decision(id, Stage::ItAdmin, Decision::Approved, "tech_admin", None))
        .await
        .expect_err("it stage is closed after a rejection");
    assert_eq!(error.kind(), ErrorKind::SequenceViolation);

    let snapshot = engine.status_of(id).await.expect("status");
    assert_eq!(snapshot, rejected);
}

#[tokio::test]
async fn full_approval_leaves_no_pending_work() {
    let (_pool, engine) = sql_engine().await;
    let id = engine.submit(submission("SN-R2")).await.expect("submit");

    for (stage, actor) in
        [(Stage::Manager, "john_manager"), (Stage::Hod, "lisa_hod"), (Stage::ItAdmin, "tech_admin")]
    {
        let challan = engine
            .decide(decision(id, stage, Decision::Approved, actor, None))
            .await
            .expect("stage approves");
        assert!(challan.final_status_consistent());
        assert!(challan.stage(stage).decided_at.is_some());
    }

    let approved = engine.status_of(id).await.expect("status");
    assert_eq!(approved.final_status, StageStatus::Approved);
    assert_eq!(approved.awaiting_stage(), None);
    for stage in Stage::ALL {
        assert!(!pending_ids(&engine, stage).await.contains(&id), "{stage} still lists it");
    }
}

#[tokio::test]
async fn hod_cannot_decide_before_manager() {
    let (_pool, engine) = sql_engine().await;
    let id = engine.submit(submission("SN-EARLY")).await.expect("submit");

    let error = engine
        .decide(decision(id, Stage::Hod, Decision::Approved, "mike_hod", None))
        .await
        .expect_err("hod stage is not open yet");

    assert!(matches!(error, WorkflowError::OutOfOrderApproval { stage: Stage::Hod, .. }));
    assert_eq!(engine.status_of(id).await.expect("status").hod.status, StageStatus::Pending);
}

#[tokio::test]
async fn role_mismatch_is_an_authorization_error_in_every_state() {
    let (_pool, engine) = sql_engine().await;
    let fresh = engine.submit(submission("SN-FRESH")).await.expect("submit");
    let closed = engine.submit(submission("SN-CLOSED")).await.expect("submit");
    engine
        .decide(decision(closed, Stage::Manager, Decision::Rejected, "john_manager", None))
        .await
        .expect("manager rejects");

    for id in [fresh, closed] {
        for (stage, actor) in
            [(Stage::Manager, "mike_hod"), (Stage::Hod, "alice_sales"), (Stage::ItAdmin, "lisa_hod")]
        {
            let error = engine
                .decide(decision(id, stage, Decision::Approved, actor, None))
                .await
                .expect_err("wrong role must be refused");
            assert_eq!(error.kind(), ErrorKind::Authorization, "{actor} on {stage}");
        }
    }
}

#[tokio::test]
async fn duplicate_serial_is_a_validation_error_with_one_row() {
    let (pool, engine) = sql_engine().await;
    engine.submit(submission("SN-DUP")).await.expect("first submit");

    let error = engine.submit(submission("SN-DUP")).await.expect_err("second submit fails");
    assert_eq!(error, WorkflowError::DuplicateSerialNumber("SN-DUP".to_string()));
    assert_eq!(error.kind(), ErrorKind::Validation);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM challans WHERE serial_number = ?")
        .bind("SN-DUP")
        .fetch_one(&pool)
        .await
        .expect("count rows");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn submit_validates_inputs_before_touching_the_store() {
    let (pool, engine) = sql_engine().await;

    let mut blank_serial = submission("   ");
    blank_serial.serial_number = "   ".to_string();
    assert_eq!(engine.submit(blank_serial).await, Err(WorkflowError::EmptySerialNumber));

    let mut zero = submission("SN-ZERO");
    zero.quantity = 0;
    assert_eq!(engine.submit(zero).await, Err(WorkflowError::InvalidQuantity(0)));

    let mut no_purpose = submission("SN-NOPURPOSE");
    no_purpose.purpose = " ".to_string();
    assert_eq!(engine.submit(no_purpose).await, Err(WorkflowError::MissingField("purpose")));

    let mut stranger = submission("SN-STRANGER");
    stranger.requested_by = "mallory".to_string();
    let error = engine.submit(stranger).await.expect_err("unknown requester");
    assert_eq!(error, WorkflowError::UnknownRequester("mallory".to_string()));
    assert_eq!(error.kind(), ErrorKind::NotFound);

    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM challans").fetch_one(&pool).await.expect("count");
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn missing_request_is_reported_before_actor_checks() {
    let (_pool, engine) = sql_engine().await;

    let error = engine
        .decide(decision(ChallanId(404), Stage::Manager, Decision::Approved, "nobody", None))
        .await
        .expect_err("no such challan");
    assert_eq!(error, WorkflowError::RequestNotFound(ChallanId(404)));

    let id = engine.submit(submission("SN-ACTOR")).await.expect("submit");
    let error = engine
        .decide(decision(id, Stage::Manager, Decision::Approved, "nobody", None))
        .await
        .expect_err("unknown actor");
    assert_eq!(error, WorkflowError::UnknownActor("nobody".to_string()));
}

#[tokio::test]
async fn status_of_is_stable_without_intervening_decisions() {
    let (_pool, engine) = sql_engine().await;
    let id = engine.submit(submission("SN-IDEM")).await.expect("submit");

    let first = engine.status_of(id).await.expect("status");
    let second = engine.status_of(id).await.expect("status");

    assert_eq!(first, second);
    assert_eq!(first.final_status, StageStatus::Pending);
    assert_eq!(first.awaiting_stage(), Some(Stage::Manager));
}

#[tokio::test]
async fn last_non_blank_remark_wins() {
    let (_pool, engine) = sql_engine().await;
    let id = engine.submit(submission("SN-REMARKS")).await.expect("submit");

    engine
        .decide(decision(id, Stage::Manager, Decision::Approved, "john_manager", Some("ok by ops")))
        .await
        .expect("manager");
    let after_hod = engine
        .decide(decision(id, Stage::Hod, Decision::Approved, "mike_hod", Some("   ")))
        .await
        .expect("hod");
    assert_eq!(after_hod.remarks.as_deref(), Some("ok by ops"));

    let after_it = engine
        .decide(decision(id, Stage::ItAdmin, Decision::Approved, "tech_admin", Some("issued")))
        .await
        .expect("it");
    assert_eq!(after_it.remarks.as_deref(), Some("issued"));
}

#[tokio::test]
async fn listing_and_summary_follow_stage_guards() {
    let (_pool, engine) = sql_engine().await;
    let first = engine.submit(submission("SN-L1")).await.expect("submit");
    let second = engine.submit(submission("SN-L2")).await.expect("submit");
    let mut bobs = submission("SN-L3");
    bobs.requested_by = "bob_marketing".to_string();
    let third = engine.submit(bobs).await.expect("submit");

    engine
        .decide(decision(second, Stage::Manager, Decision::Approved, "john_manager", None))
        .await
        .expect("manager approves");

    let alice = engine.list_for_requester("alice_sales").await.expect("alice's challans");
    assert_eq!(alice.iter().map(|c| c.id).collect::<Vec<_>>(), vec![second, first]);
    assert_eq!(engine.list_for(None).await.expect("all").len(), 3);
    assert_eq!(
        engine.list_for_requester("mallory").await,
        Err(WorkflowError::UnknownRequester("mallory".to_string()))
    );

    let summary = engine.pending_summary().await.expect("summary");
    assert_eq!((summary.manager_pending, summary.hod_pending, summary.it_pending), (2, 1, 0));
    assert_eq!(summary.total_pending, 3);

    let hod_queue = engine.pending_for_actor(Stage::Hod, "lisa_hod").await.expect("hod queue");
    assert_eq!(hod_queue.iter().map(|c| c.id).collect::<Vec<_>>(), vec![second]);
    let refused = engine
        .pending_for_actor(Stage::Hod, "john_manager")
        .await
        .expect_err("manager cannot read the hod queue");
    assert_eq!(refused.kind(), ErrorKind::Authorization);
    assert!(pending_ids(&engine, Stage::Manager).await.contains(&third));
}

#[tokio::test]
async fn audit_sink_sees_applied_and_refused_decisions() {
    let pool = seeded_pool("sqlite::memory:", 1).await;
    let sink = Arc::new(InMemoryAuditSink::default());
    let engine = WorkflowEngine::new(Arc::new(SqlChallanStore::new(pool)))
        .with_audit_sink(sink.clone());

    let id = engine.submit(submission("SN-AUDIT")).await.expect("submit");
    engine
        .decide(decision(id, Stage::Manager, Decision::Approved, "john_manager", None))
        .await
        .expect("manager");
    engine
        .decide(decision(id, Stage::ItAdmin, Decision::Approved, "tech_admin", None))
        .await
        .expect_err("it is not open yet");

    let events = sink.events();
    let types = events.iter().map(|event| event.event_type.as_str()).collect::<Vec<_>>();
    assert_eq!(
        types,
        vec!["challan.submitted", "challan.decision_applied", "challan.decision_refused"]
    );
    assert_eq!(events[1].metadata.get("next_stage").map(String::as_str), Some("hod"));
    assert_eq!(
        events[2].metadata.get("error_kind").map(String::as_str),
        Some("sequence_violation")
    );
    assert!(events.iter().all(|event| event.challan_id == Some(id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decisions_on_one_stage_apply_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let pool = seeded_pool(&url, 4).await;
    let engine = WorkflowEngine::new(Arc::new(SqlChallanStore::new(pool)));
    let id = engine.submit(submission("SN-RACE")).await.expect("submit");

    let contenders = ["john_manager", "sara_director", "john_manager", "sara_director"];
    let handles = contenders
        .iter()
        .enumerate()
        .map(|(index, actor)| {
            let engine = engine.clone();
            let verdict = if index % 2 == 0 { Decision::Approved } else { Decision::Rejected };
            let command = decision(id, Stage::Manager, verdict, actor, None);
            tokio::spawn(async move { engine.decide(command).await })
        })
        .collect::<Vec<_>>();

    let mut applied = 0;
    for handle in handles {
        match handle.await.expect("task joins") {
            Ok(_) => applied += 1,
            Err(error) => assert_eq!(error.kind(), ErrorKind::SequenceViolation, "{error}"),
        }
    }

    assert_eq!(applied, 1);
    let settled = engine.status_of(id).await.expect("status");
    assert_ne!(settled.manager.status, StageStatus::Pending);
    assert!(settled.final_status_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_store_serializes_racing_decisions_too() {
    use challan_core::domain::identity::{Identity, Role};
    use challan_db::InMemoryChallanStore;

    let identity = |username: &str, role: Role| Identity {
        username: username.to_string(),
        full_name: username.to_string(),
        role,
        department: "Operations".to_string(),
    };
    let store = InMemoryChallanStore::with_reference_data(
        [identity("alice_sales", Role::Requester), identity("john_manager", Role::Manager)],
        [],
    );
    let engine = WorkflowEngine::new(Arc::new(store));
    let id = engine.submit(submission("SN-MEM-RACE")).await.expect("submit");

    let handles = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let command = decision(id, Stage::Manager, Decision::Approved, "john_manager", None);
            tokio::spawn(async move { engine.decide(command).await })
        })
        .collect::<Vec<_>>();

    let mut applied = 0;
    for handle in handles {
        if handle.await.expect("task joins").is_ok() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(engine.pending_for(Stage::Hod).await.expect("hod queue").len(), 1);
}
