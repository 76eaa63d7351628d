//! Integration test: store + status + resets working together.
//!
//! Verifies that:
//! 1. The current focus is always the most recently set one.
//! 2. A soft reset empties the dashboard but keeps archives retrievable.
//! 3. A hard reset leaves every kind at zero and can be repeated.
//! 4. "keep only today's tasks" spares threads created today.
//! 5. Kill-by-description matches once, then finds nothing.
//! 6. A broken table stops a soft reset at that step and fails the status.

use chrono::{Duration, Utc};
use mindstate_core::{
    calculate_end_time, ClosureType, EntityKind, LoadLevel, LoopStatus, NewAiOffload, NewArchive,
    NewEmotionalState, NewFocus, NewIdea, NewLoop, NewPrediction, NewTask, NewThread,
    OffloadStatus, PredictionDepth, Priority, QueueType, ResetController, StateError, StateStore,
    StatusAggregator, ThreadMode, ThreadStatus, KEEP_ONLY_TODAY,
};

fn open_store(dir: &tempfile::TempDir) -> StateStore {
    StateStore::open(dir.path().join("mindstate.sqlite")).expect("store should open")
}

fn focus(name: &str) -> NewFocus {
    NewFocus {
        task_name: name.to_string(),
        duration: "25m".to_string(),
        success_criteria: "first draft".to_string(),
    }
}

fn open_loop(description: &str) -> NewLoop {
    NewLoop {
        description: description.to_string(),
        priority: Priority::High,
        queue: QueueType::Action,
        owner: "me".to_string(),
    }
}

fn thread(name: &str, mode: ThreadMode) -> NewThread {
    NewThread {
        name: name.to_string(),
        mode,
        time_scope: "this week".to_string(),
        goal: None,
    }
}

fn populate(store: &StateStore) {
    store.set_focus(focus("quarterly report")).unwrap();
    store.create_loop(open_loop("email follow-up")).unwrap();
    store.create_loop(open_loop("renew passport")).unwrap();
    store.create_thread(thread("launch", ThreadMode::Foreground)).unwrap();
    store
        .create_background_thread("learn piano", "play one song")
        .unwrap();
    store
        .create_task(NewTask {
            description: "file expenses".to_string(),
            category: "admin".to_string(),
            urgency: Priority::Medium,
            importance: Priority::Low,
        })
        .unwrap();
    store
        .create_idea(NewIdea {
            summary: "weekly review template".to_string(),
            storage: "notes app".to_string(),
            action_now: false,
        })
        .unwrap();
    store
        .create_prediction(NewPrediction {
            scenario: "team reorg".to_string(),
            time_horizon: "3 months".to_string(),
            depth: PredictionDepth::Deep,
        })
        .unwrap();
    store
        .create_emotional_state(NewEmotionalState {
            label: "stressed".to_string(),
            source_guess: "deadline".to_string(),
        })
        .unwrap();
    store
        .create_ai_offload(NewAiOffload {
            task_type: "summarize".to_string(),
            scope: "meeting notes".to_string(),
            status: OffloadStatus::Pending,
        })
        .unwrap();
}

#[test]
fn current_focus_tracks_latest_set() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    for name in ["a", "b", "c", "d"] {
        store.set_focus(focus(name)).unwrap();
        assert_eq!(store.current_focus().unwrap().unwrap().task_name, name);
    }
}

#[test]
fn end_time_property() {
    let t = Utc::now();
    assert_eq!(calculate_end_time(t, "25m").unwrap(), t + Duration::minutes(25));
    assert!(matches!(
        calculate_end_time(t, "bogus"),
        Err(StateError::InvalidDuration(_))
    ));
}

#[test]
fn soft_reset_clears_dashboard_and_keeps_archives() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    populate(&store);
    let archive = store
        .create_archive(NewArchive {
            object: "old project".to_string(),
            summary: "wrapped up".to_string(),
            lesson: Some("scope smaller".to_string()),
        })
        .unwrap();

    let before = StatusAggregator::new(&store).status().unwrap();
    assert_eq!(before.current_focus, "quarterly report");
    assert_eq!(before.open_loops_estimate, 2);
    assert_eq!(before.active_predictions, 1);
    assert_eq!(before.emotional_load, LoadLevel::Medium);

    let report = ResetController::new(&store).soft_reset().unwrap();
    assert_eq!(report.focus_cleared, 1);
    assert_eq!(report.loops_closed, 2);
    assert_eq!(report.threads_terminated, 2);
    assert_eq!(report.predictions_stopped, 1);

    let after = StatusAggregator::new(&store).status().unwrap();
    assert!(after.current_focus.is_empty());
    assert!(!after.focus_locked);
    assert!(after.foreground_threads.is_empty());
    assert!(after.background_threads.is_empty());
    assert_eq!(after.open_loops_estimate, 0);
    assert_eq!(after.active_predictions, 0);
    // history is untouched
    assert_eq!(after.pending_tasks, 1);
    assert_eq!(after.captured_ideas, 1);
    assert_eq!(after.emotional_load, LoadLevel::Medium);
    assert_eq!(store.get_archive(&archive.id).unwrap(), Some(archive));
    assert_eq!(store.count(EntityKind::AiOffload).unwrap(), 1);
    assert!(store.list_open_loops(None).unwrap().is_empty());
}

#[test]
fn hard_reset_zeroes_every_kind_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    populate(&store);
    store
        .create_archive(NewArchive {
            object: "x".to_string(),
            summary: "y".to_string(),
            lesson: None,
        })
        .unwrap();
    store
        .create_decompress_session(mindstate_core::NewDecompressSession {
            method: "walk".to_string(),
            duration: "10m".to_string(),
        })
        .unwrap();

    let ctl = ResetController::new(&store);
    assert!(ctl.hard_reset().unwrap().total() > 0);
    for kind in EntityKind::ALL {
        assert_eq!(store.count(kind).unwrap(), 0, "{} should be empty", kind);
    }
    assert_eq!(ctl.hard_reset().unwrap().total(), 0);
    for kind in EntityKind::ALL {
        assert_eq!(store.count(kind).unwrap(), 0, "{} should stay empty", kind);
    }
}

#[test]
fn keep_only_today_spares_todays_threads() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let today = store.create_thread(thread("today", ThreadMode::Foreground)).unwrap();

    assert_eq!(store.terminate_threads_by_rule(KEEP_ONLY_TODAY).unwrap(), 0);
    assert_eq!(
        store.get_thread(&today.id).unwrap().unwrap().status,
        ThreadStatus::Active
    );

    // Seen from tomorrow, the same thread is from a previous day.
    let tomorrow = Utc::now() + Duration::days(1);
    assert_eq!(
        store
            .terminate_threads_by_rule_at(KEEP_ONLY_TODAY, tomorrow)
            .unwrap(),
        1
    );
    assert_eq!(
        store.get_thread(&today.id).unwrap().unwrap().status,
        ThreadStatus::Terminated
    );
}

#[test]
fn kill_email_loop_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let created = store.create_loop(open_loop("email follow-up")).unwrap();

    assert_eq!(store.kill_loops_by_description("email").unwrap(), 1);
    let killed = store.get_loop(&created.id).unwrap().unwrap();
    assert_eq!(killed.status, LoopStatus::Closed);
    assert_eq!(killed.closure_type, Some(ClosureType::Abandoned));
    assert!(killed.closed_at.is_some());

    assert_eq!(store.kill_loops_by_description("email").unwrap(), 0);
}

#[test]
fn close_loop_twice_fails_second_time() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let created = store.create_loop(open_loop("book dentist")).unwrap();

    let closed = store
        .close_loop(&created.id, ClosureType::Done, None)
        .unwrap();
    assert_eq!(closed.status, LoopStatus::Closed);
    assert_eq!(closed.closure_type, Some(ClosureType::Done));

    assert!(matches!(
        store.close_loop(&created.id, ClosureType::Abandoned, None),
        Err(StateError::AlreadyClosed(_))
    ));
    let stored = store.get_loop(&created.id).unwrap().unwrap();
    assert_eq!(stored.closure_type, Some(ClosureType::Done));
}

#[test]
fn concurrent_readers_and_writers_share_one_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(open_store(&dir));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                for j in 0..5 {
                    store
                        .create_loop(open_loop(&format!("loop {}-{}", i, j)))
                        .unwrap();
                    StatusAggregator::new(&store).status().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.count_open_loops().unwrap(), 20);
}

#[test]
fn load_classification_vectors() {
    use mindstate_core::{classify_emotional_load, classify_energy_level};

    assert_eq!(
        classify_emotional_load(["angry", "anxious", "tired", "calm", "calm"]),
        LoadLevel::High
    );
    assert_eq!(
        classify_emotional_load(["tired", "worried", "calm", "calm", "calm"]),
        LoadLevel::Medium
    );
    assert_eq!(classify_emotional_load(Vec::<String>::new()), LoadLevel::Low);

    assert_eq!(classify_energy_level(10, 2, 1), LoadLevel::Medium);
    assert_eq!(classify_energy_level(20, 0, 0), LoadLevel::Low);
}

#[test]
fn storage_failure_stops_soft_reset_and_fails_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.set_focus(focus("write report")).unwrap();
    store.create_loop(open_loop("reply to landlord")).unwrap();
    store
        .create_prediction(NewPrediction {
            scenario: "quarter review".to_string(),
            time_horizon: "3 months".to_string(),
            depth: PredictionDepth::Medium,
        })
        .unwrap();

    let side = rusqlite::Connection::open(store.path()).unwrap();
    side.execute_batch("DROP TABLE threads").unwrap();
    drop(side);

    let err = ResetController::new(&store).soft_reset().unwrap_err();
    assert!(matches!(err, StateError::Persistence(_)), "got {:?}", err);

    // Steps before the threads table stay applied; later ones never ran.
    assert_eq!(store.count(EntityKind::Focus).unwrap(), 0);
    assert_eq!(store.count_open_loops().unwrap(), 0);
    assert_eq!(store.count_running_predictions().unwrap(), 1);

    let status = StatusAggregator::new(&store).status();
    assert!(matches!(status, Err(StateError::Persistence(_))));
}
