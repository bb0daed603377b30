//! End-to-end orchestration tests: the diamond dependency scenario,
//! at-most-once auto-start under concurrency and the failure cascades.

mod common;

use common::{
    seed_mission, seed_todo, CountingLauncher, IsolationCall, RecordingIsolation,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use weaver_core::config::WeaverConfig;
use weaver_core::error::WeaverError;
use weaver_core::events::{EventKind, EventPublisher, TimelineEvent};
use weaver_core::isolation::SessionRegistry;
use weaver_core::models::{TodoDraft, TodoId};
use weaver_core::orchestration::{AutoStartScheduler, OrchestrationCore, StepUpdateRequest};
use weaver_core::state_machine::states::{MissionState, StepType, TodoState};
use weaver_core::state_machine::{MissionEvent, TodoEvent};
use weaver_core::store::{InMemoryStore, StateStore};

struct Harness {
    core: OrchestrationCore,
    store: Arc<InMemoryStore>,
    isolation: Arc<RecordingIsolation>,
    launcher: Arc<CountingLauncher>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let isolation = Arc::new(RecordingIsolation::new());
    let launcher = Arc::new(CountingLauncher::new());
    let core = OrchestrationCore::new(
        WeaverConfig::default(),
        store.clone(),
        isolation.clone(),
        launcher.clone(),
    );
    Harness {
        core,
        store,
        isolation,
        launcher,
    }
}

/// Drive every step of a threading todo to completion, optionally skipping
/// the trailing pipeline stages.
async fn complete_all_steps(core: &OrchestrationCore, todo_id: TodoId, skip_from: Option<StepType>) {
    for step_type in StepType::ORDERED {
        let status = match skip_from {
            Some(from) if step_type >= from => "skipped",
            _ => "completed",
        };
        core.apply_step_update(StepUpdateRequest {
            todo_id,
            step_type: step_type.to_string(),
            status: status.into(),
            output: None,
        })
        .await
        .unwrap();
    }
}

fn diamond_drafts() -> Vec<TodoDraft> {
    vec![
        TodoDraft::new("a"),
        TodoDraft::new("b").depending_on(&[0]),
        TodoDraft::new("c").depending_on(&[0]),
        TodoDraft::new("d").depending_on(&[1, 2]),
    ]
}

#[tokio::test]
async fn test_diamond_weave_end_to_end() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "diamond")
        .await
        .unwrap();

    let todos = h
        .core
        .start_weaving(mission.mission_id, diamond_drafts())
        .await
        .unwrap();
    let (a, b, c, d) = (&todos[0], &todos[1], &todos[2], &todos[3]);

    // Only the dependency-free todo starts immediately.
    assert_eq!(a.status, TodoState::Threading);
    assert_eq!(b.status, TodoState::Pending);
    assert_eq!(c.status, TodoState::Pending);
    assert_eq!(d.status, TodoState::Pending);
    assert_eq!(h.launcher.launch_count(a.todo_id), 1);

    complete_all_steps(&h.core, a.todo_id, None).await;
    assert_eq!(
        h.core.todo(a.todo_id).await.unwrap().status,
        TodoState::Woven
    );

    // B and C were promoted; D still waits on both.
    assert_eq!(
        h.core.todo(b.todo_id).await.unwrap().status,
        TodoState::Threading
    );
    assert_eq!(
        h.core.todo(c.todo_id).await.unwrap().status,
        TodoState::Threading
    );
    assert_eq!(
        h.core.todo(d.todo_id).await.unwrap().status,
        TodoState::Pending
    );
    assert!(h.core.ready_todos(mission.mission_id).await.unwrap().is_empty());

    // Commit of A's isolation strictly precedes creation of B's or C's.
    let calls = h.isolation.calls();
    let commit_a = calls
        .iter()
        .position(|call| *call == IsolationCall::Commit(a.todo_id))
        .expect("commit recorded");
    for dependent in [b.todo_id, c.todo_id] {
        let create = calls
            .iter()
            .position(|call| *call == IsolationCall::Create(dependent))
            .expect("create recorded");
        assert!(commit_a < create, "dependent isolation raced ahead of commit");
    }

    // A mix of completed and skipped steps still weaves.
    complete_all_steps(&h.core, b.todo_id, Some(StepType::Review)).await;
    complete_all_steps(&h.core, c.todo_id, None).await;

    let d_loaded = h.core.todo(d.todo_id).await.unwrap();
    assert_eq!(d_loaded.status, TodoState::Threading);
    assert_eq!(h.launcher.launch_count(d.todo_id), 1);

    complete_all_steps(&h.core, d.todo_id, None).await;

    let mission = h.core.mission(mission.mission_id).await.unwrap();
    assert_eq!(mission.status, MissionState::Woven);
    assert_eq!(mission.progress, 100);
    assert!(mission.completed_at.is_some());
}

#[tokio::test]
async fn test_self_dependency_and_cycle_rejected() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "diamond")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(mission.mission_id, diamond_drafts())
        .await
        .unwrap();
    let (b, d) = (&todos[1], &todos[3]);

    let result = h.core.update_dependencies(d.todo_id, vec![d.todo_id]).await;
    assert!(matches!(result, Err(WeaverError::Validation(_))));

    // D already depends on B; B -> D would close a cycle.
    let result = h.core.update_dependencies(b.todo_id, vec![d.todo_id]).await;
    assert!(matches!(result, Err(WeaverError::Validation(_))));

    // The rejected mutations left the graph untouched.
    let b_loaded = h.core.todo(b.todo_id).await.unwrap();
    assert_eq!(b_loaded.depends_on, vec![todos[0].todo_id]);
}

#[tokio::test]
async fn test_concurrent_completion_promotes_at_most_once() {
    let store = Arc::new(InMemoryStore::new());
    let publisher = EventPublisher::default();
    let isolation = Arc::new(RecordingIsolation::new());
    let launcher = Arc::new(CountingLauncher::new());
    let scheduler = Arc::new(AutoStartScheduler::new(
        store.clone(),
        publisher,
        isolation,
        launcher.clone(),
        Arc::new(SessionRegistry::new()),
    ));

    let mission = seed_mission(&store, true).await;
    store
        .set_mission_status(mission.mission_id, MissionState::Threading)
        .await
        .unwrap();

    let a = seed_todo(&store, &mission, "a", 0).await;
    let b = seed_todo(&store, &mission, "b", 1).await;
    let c = seed_todo(&store, &mission, "c", 2).await;
    store.set_dependencies(b.todo_id, vec![a.todo_id]).await.unwrap();
    store.set_dependencies(c.todo_id, vec![a.todo_id]).await.unwrap();

    // A completes.
    assert!(store
        .compare_and_set_todo_status(a.todo_id, TodoState::Pending, TodoState::Threading)
        .await
        .unwrap());
    assert!(store
        .compare_and_set_todo_status(a.todo_id, TodoState::Threading, TodoState::Woven)
        .await
        .unwrap());

    // N concurrent completion triggers all race over the same dependents.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let scheduler = scheduler.clone();
        let completed = a.todo_id;
        handles.push(tokio::spawn(async move {
            scheduler.on_todo_completed(completed).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.todo(b.todo_id).await.unwrap().status, TodoState::Threading);
    assert_eq!(store.todo(c.todo_id).await.unwrap().status, TodoState::Threading);
    assert_eq!(launcher.launch_count(b.todo_id), 1);
    assert_eq!(launcher.launch_count(c.todo_id), 1);
}

#[tokio::test]
async fn test_auto_start_disabled_only_notifies() {
    let store = Arc::new(InMemoryStore::new());
    let publisher = EventPublisher::default();
    let mut events = publisher.subscribe();
    let isolation = Arc::new(RecordingIsolation::new());
    let launcher = Arc::new(CountingLauncher::new());
    let scheduler = AutoStartScheduler::new(
        store.clone(),
        publisher,
        isolation,
        launcher.clone(),
        Arc::new(SessionRegistry::new()),
    );

    let mission = seed_mission(&store, false).await;
    store
        .set_mission_status(mission.mission_id, MissionState::Threading)
        .await
        .unwrap();
    let a = seed_todo(&store, &mission, "a", 0).await;
    let b = seed_todo(&store, &mission, "b", 1).await;
    store.set_dependencies(b.todo_id, vec![a.todo_id]).await.unwrap();

    store
        .compare_and_set_todo_status(a.todo_id, TodoState::Pending, TodoState::Threading)
        .await
        .unwrap();
    store
        .compare_and_set_todo_status(a.todo_id, TodoState::Threading, TodoState::Woven)
        .await
        .unwrap();
    scheduler.on_todo_completed(a.todo_id).await.unwrap();

    // B stays pending, no worker launched, a ready notification went out.
    assert_eq!(store.todo(b.todo_id).await.unwrap().status, TodoState::Pending);
    assert_eq!(launcher.launch_count(b.todo_id), 0);

    let mut saw_ready = false;
    while let Ok(event) = events.try_recv() {
        if event.topic == EventKind::TodoReady.to_string() {
            let timeline: TimelineEvent = serde_json::from_value(event.payload).unwrap();
            assert!(
                timeline.message.contains("auto-start is disabled"),
                "unexpected reason: {}",
                timeline.message
            );
            saw_ready = true;
        }
    }
    assert!(saw_ready, "expected a todo_ready notification");
}

#[tokio::test]
async fn test_ready_notification_names_non_threading_mission() {
    let store = Arc::new(InMemoryStore::new());
    let publisher = EventPublisher::default();
    let mut events = publisher.subscribe();
    let scheduler = AutoStartScheduler::new(
        store.clone(),
        publisher,
        Arc::new(RecordingIsolation::new()),
        Arc::new(CountingLauncher::new()),
        Arc::new(SessionRegistry::new()),
    );

    // Auto-start is on, but the mission is still in the backlog.
    let mission = seed_mission(&store, true).await;
    let a = seed_todo(&store, &mission, "a", 0).await;

    assert!(!scheduler.try_start(a.todo_id).await.unwrap());
    assert_eq!(store.todo(a.todo_id).await.unwrap().status, TodoState::Pending);

    let mut saw_ready = false;
    while let Ok(event) = events.try_recv() {
        if event.topic == EventKind::TodoReady.to_string() {
            let timeline: TimelineEvent = serde_json::from_value(event.payload).unwrap();
            assert!(
                timeline.message.contains("backlog, not threading"),
                "unexpected reason: {}",
                timeline.message
            );
            saw_ready = true;
        }
    }
    assert!(saw_ready, "expected a todo_ready notification");
}

#[tokio::test]
async fn test_step_failure_tangles_todo_and_reset_recovers() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "failing")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(mission.mission_id, vec![TodoDraft::new("solo")])
        .await
        .unwrap();
    let todo = &todos[0];
    assert_eq!(todo.status, TodoState::Threading);

    h.core
        .apply_step_update(StepUpdateRequest {
            todo_id: todo.todo_id,
            step_type: "analysis".into(),
            status: "completed".into(),
            output: Some("notes".into()),
        })
        .await
        .unwrap();
    h.core
        .apply_step_update(StepUpdateRequest {
            todo_id: todo.todo_id,
            step_type: "implementation".into(),
            status: "failed".into(),
            output: Some("compiler exploded".into()),
        })
        .await
        .unwrap();

    let tangled = h.core.todo(todo.todo_id).await.unwrap();
    assert_eq!(tangled.status, TodoState::Tangled);

    // Explicit reset returns the todo to pending with a fresh pipeline.
    h.core
        .update_todo_status(todo.todo_id, TodoEvent::Reset)
        .await
        .unwrap();
    let reset = h.core.todo(todo.todo_id).await.unwrap();
    assert_eq!(reset.status, TodoState::Pending);
    assert_eq!(reset.current_step, Some(StepType::Analysis));
    let steps = h.core.steps(todo.todo_id).await.unwrap();
    assert!(steps.iter().all(|s| s.started_at.is_none() && s.output.is_none()));
}

#[tokio::test]
async fn test_all_skipped_pipeline_weaves_pending_todo() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "skip-through")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(
            mission.mission_id,
            vec![
                TodoDraft::new("a"),
                TodoDraft::new("b").depending_on(&[0]),
                TodoDraft::new("c").depending_on(&[1]),
            ],
        )
        .await
        .unwrap();
    let (b, c) = (&todos[1], &todos[2]);
    assert_eq!(b.status, TodoState::Pending);

    // Every step of B is skipped without any in-progress report, so B is
    // still pending when its pipeline finishes. It must weave anyway.
    for step_type in StepType::ORDERED {
        h.core
            .apply_step_update(StepUpdateRequest {
                todo_id: b.todo_id,
                step_type: step_type.to_string(),
                status: "skipped".into(),
                output: None,
            })
            .await
            .unwrap();
    }

    assert_eq!(
        h.core.todo(b.todo_id).await.unwrap().status,
        TodoState::Woven
    );
    // B's completion unblocks its dependent as usual.
    assert_eq!(
        h.core.todo(c.todo_id).await.unwrap().status,
        TodoState::Threading
    );
}

#[tokio::test]
async fn test_guard_violations_surface_to_caller() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "guards")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(
            mission.mission_id,
            vec![TodoDraft::new("a"), TodoDraft::new("b").depending_on(&[0])],
        )
        .await
        .unwrap();

    // Weaving cannot start twice.
    let result = h.core.start_weaving(mission.mission_id, vec![]).await;
    assert!(matches!(result, Err(WeaverError::GuardViolation(_))));

    // B's dependency is unmet; a manual start is a guard violation.
    let result = h
        .core
        .update_todo_status(todos[1].todo_id, TodoEvent::Start)
        .await;
    assert!(matches!(result, Err(WeaverError::GuardViolation(_))));

    // Only woven missions archive.
    let result = h
        .core
        .update_mission_status(mission.mission_id, MissionEvent::Archive)
        .await;
    assert!(matches!(result, Err(WeaverError::GuardViolation(_))));
}

#[tokio::test]
async fn test_progress_is_monotone_under_completions() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "progress")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(mission.mission_id, diamond_drafts())
        .await
        .unwrap();

    let mut last_progress = 0u8;
    for todo in &todos {
        // Pending dependents promote as their predecessors weave.
        for step_type in StepType::ORDERED {
            h.core
                .apply_step_update(StepUpdateRequest {
                    todo_id: todo.todo_id,
                    step_type: step_type.to_string(),
                    status: "completed".into(),
                    output: None,
                })
                .await
                .unwrap();
            let progress = h.core.mission(mission.mission_id).await.unwrap().progress;
            assert!(
                progress >= last_progress,
                "progress regressed: {last_progress} -> {progress}"
            );
            last_progress = progress;
        }
    }
    assert_eq!(last_progress, 100);
}

#[tokio::test]
async fn test_commit_failure_does_not_block_dependents() {
    let h = harness();
    h.isolation.fail_commit.store(true, Ordering::SeqCst);

    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "degraded")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(
            mission.mission_id,
            vec![TodoDraft::new("a"), TodoDraft::new("b").depending_on(&[0])],
        )
        .await
        .unwrap();

    complete_all_steps(&h.core, todos[0].todo_id, None).await;

    // Best-effort commit: the dependent still starts.
    assert_eq!(
        h.core.todo(todos[1].todo_id).await.unwrap().status,
        TodoState::Threading
    );
}

#[tokio::test]
async fn test_isolation_create_failure_leaves_todo_threading() {
    let h = harness();
    h.isolation.fail_create.store(true, Ordering::SeqCst);

    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "no-isolation")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(mission.mission_id, vec![TodoDraft::new("solo")])
        .await
        .unwrap();

    // Started without a confirmed isolation; degraded but consistent.
    let todo = h.core.todo(todos[0].todo_id).await.unwrap();
    assert_eq!(todo.status, TodoState::Threading);
    assert!(todo.worktree_path.is_none());
    assert_eq!(h.launcher.launch_count(todo.todo_id), 0);
}

#[tokio::test]
async fn test_sweep_recovers_missed_trigger() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "sweep")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(
            mission.mission_id,
            vec![TodoDraft::new("a"), TodoDraft::new("b").depending_on(&[0])],
        )
        .await
        .unwrap();
    let (a, b) = (&todos[0], &todos[1]);

    // Simulate a lost completion trigger: A is woven directly in the store
    // and no scheduler hook ran.
    h.store
        .compare_and_set_todo_status(a.todo_id, TodoState::Threading, TodoState::Woven)
        .await
        .unwrap();
    assert_eq!(h.core.todo(b.todo_id).await.unwrap().status, TodoState::Pending);

    let started = h.core.start_ready_todos(mission.mission_id).await.unwrap();
    assert_eq!(started, 1);
    assert_eq!(
        h.core.todo(b.todo_id).await.unwrap().status,
        TodoState::Threading
    );
}

#[tokio::test]
async fn test_dependents_query_and_guarded_delete() {
    let h = harness();
    let mission = h
        .core
        .create_mission(uuid::Uuid::new_v4(), "deletion")
        .await
        .unwrap();
    let todos = h
        .core
        .start_weaving(
            mission.mission_id,
            vec![TodoDraft::new("a"), TodoDraft::new("b").depending_on(&[0])],
        )
        .await
        .unwrap();
    let (a, b) = (&todos[0], &todos[1]);

    let dependents = h.core.dependents(a.todo_id).await.unwrap();
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0].todo_id, b.todo_id);

    // A is still referenced as a dependency.
    let result = h.core.delete_todo(a.todo_id).await;
    assert!(matches!(result, Err(WeaverError::Validation(_))));

    h.core.update_dependencies(b.todo_id, vec![]).await.unwrap();
    h.core.delete_todo(a.todo_id).await.unwrap();
    assert!(h.core.todo(a.todo_id).await.is_err());
}
