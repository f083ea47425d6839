mod common;

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use routeflow::backends::persist_assignment;
use routeflow::engine::params::EngineParameters;
use routeflow::engine::{Algorithm, EngineOptions};
use routeflow::events::DomainEvent;
use routeflow::lifecycle::{
    create_optimisation, delete_optimisation, notify_customers, terminate_optimisation,
};
use routeflow::model::log::LogEvent;
use routeflow::model::optimisation::{OptimisationState, RouteOptimisation};
use routeflow::model::{EngineRun, OptimisationLog, TaskStatus};
use routeflow::orchestration::runner::handle_results;
use routeflow::store::Store;
use routeflow::types::{JobStatus, OptimisationType};
use routeflow_test_utils::builders::OptimisationBuilder;
use routeflow_test_utils::fakes::{echo_assignment, InMemoryJobs, RecordingSink, ScriptedOutcome};
use routeflow_test_utils::wait_until;
use serde_json::json;

fn entity(state: OptimisationState) -> RouteOptimisation {
    RouteOptimisation {
        id: 0,
        optimisation_type: OptimisationType::Advanced,
        merchant_id: 1,
        created_by: None,
        day: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        options: serde_json::Value::Null,
        optimisation_options: serde_json::Value::Null,
        state,
        customers_notified: false,
        is_removing_currently: false,
        terminated: false,
        external_source: None,
        api_usage: HashMap::new(),
        log: OptimisationLog::default(),
    }
}

fn with_route(store: &Store, state: OptimisationState, driver: u64, jobs: &[u64]) -> u64 {
    let id = store.insert_optimisation(entity(state));
    let params = EngineParameters::from_options(&json!({
        "jobs": jobs
            .iter()
            .map(|j| json!({"id": j, "delivery": {"lat": 59.9, "lng": 10.7}}))
            .collect::<Vec<_>>(),
        "drivers": [{"id": driver}],
    }))
    .unwrap();
    persist_assignment(store, id, &echo_assignment(&params)).unwrap();
    id
}

#[test]
fn delete_is_idempotent() {
    routeflow_test_utils::init_tracing();
    let store = Store::new();
    let jobs = InMemoryJobs::new();
    let sink = RecordingSink::new();
    let id = with_route(&store, OptimisationState::Completed, 1, &[10, 11]);

    delete_optimisation(&store, &jobs, &sink, id, Some(5), false).unwrap();
    delete_optimisation(&store, &jobs, &sink, id, Some(5), false).unwrap();

    let opt = store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Removed);
    assert!(!opt.is_removing_currently);
    assert_eq!(opt.log.count_event(LogEvent::DeleteOptimisation), 1);
    assert_eq!(
        sink.count(|e| matches!(e, DomainEvent::OptimisationDeleted { .. })),
        1
    );
    assert!(store.routes_for_optimisation(id).is_empty());
    assert_eq!(store.task(id).unwrap().status, TaskStatus::Completed);
}

#[test]
fn delete_with_unassign_returns_pending_jobs_to_the_pool() {
    routeflow_test_utils::init_tracing();
    let store = Store::new();
    let jobs = InMemoryJobs::new();
    let sink = RecordingSink::new();
    let id = with_route(&store, OptimisationState::Running, 1, &[10, 11, 12]);
    jobs.set_status(10, JobStatus::Delivered);
    jobs.set_status(11, JobStatus::Assigned);
    jobs.set_status(12, JobStatus::PickUp);

    delete_optimisation(&store, &jobs, &sink, id, None, true).unwrap();

    let calls = jobs.unassign_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 1);
    // Delivered jobs stay where they are.
    assert_eq!(calls[0].1, vec![11, 12]);
}

#[test]
fn delete_skips_when_removal_already_in_flight() {
    routeflow_test_utils::init_tracing();
    let store = Store::new();
    let jobs = InMemoryJobs::new();
    let sink = RecordingSink::new();
    let id = with_route(&store, OptimisationState::Completed, 1, &[10]);
    store
        .update_optimisation(id, |o| o.is_removing_currently = true)
        .unwrap();

    delete_optimisation(&store, &jobs, &sink, id, None, false).unwrap();

    let opt = store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Completed);
    assert!(opt.is_removing_currently);
    assert!(sink.events().is_empty());
}

#[test]
fn delete_of_running_route_pushes_to_the_driver() {
    routeflow_test_utils::init_tracing();
    let store = Store::new();
    let jobs = InMemoryJobs::new();
    let sink = RecordingSink::new();
    let id = with_route(&store, OptimisationState::Running, 1, &[10]);
    let route = store.routes_for_optimisation(id)[0].id;
    store
        .update_route(route, |r| r.state = routeflow::model::route::RouteState::Running)
        .unwrap();

    delete_optimisation(&store, &jobs, &sink, id, None, false).unwrap();

    assert_eq!(
        sink.count(|e| matches!(e, DomainEvent::RouteRemoved { .. })),
        1
    );
}

#[tokio::test]
async fn terminate_short_circuits_late_fan_in() {
    let h = common::spawn();
    let id = h.store.insert_optimisation(entity(OptimisationState::Optimising));
    // One run still calculating when the merchant terminates.
    let params = EngineParameters::from_options(&json!({
        "jobs": [{"id": 10, "delivery": {"lat": 59.9, "lng": 10.7}}],
        "drivers": [{"id": 1}],
    }))
    .unwrap();
    let run = h.store.insert_engine_run(EngineRun::new(
        0,
        id,
        EngineOptions {
            params: params.clone(),
            algorithm: Algorithm::Default,
        },
    ));

    terminate_optimisation(&h.store, &*h.jobs, &*h.sink, id, Some(9)).unwrap();

    let opt = h.store.optimisation(id).unwrap();
    assert!(opt.terminated);
    assert_eq!(opt.state, OptimisationState::Removed);
    assert!(opt.log.contains_event(LogEvent::TerminateOptimisation));
    assert_eq!(h.store.task(id).unwrap().status, TaskStatus::Completed);

    // The run finishes afterwards; its fan-in must not resurrect the
    // optimisation.
    h.store
        .update_engine_run(run, |r| {
            r.start();
            r.finish(echo_assignment(&params));
        })
        .unwrap();
    handle_results(&h.orch, id).await.unwrap();

    let opt = h.store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Removed);
    assert!(h.store.routes_for_optimisation(id).is_empty());
}

#[tokio::test]
async fn terminate_during_solo_run_discards_the_result() {
    let h = common::spawn();
    h.solver
        .script_for_driver(7, ScriptedOutcome::Delay(Duration::from_millis(300)));
    let new = OptimisationBuilder::solo().with_driver(7).with_job(30).build();
    let id = create_optimisation(&h.orch, new).await.unwrap();

    let store = h.store.clone();
    wait_until(move || {
        store.optimisation(id).unwrap().state == OptimisationState::Optimising
    })
    .await;
    terminate_optimisation(&h.store, &*h.jobs, &*h.sink, id, Some(9)).unwrap();

    // Let the solver finish; its result must be dropped on the floor.
    let store = h.store.clone();
    wait_until(move || {
        store
            .engine_runs_for(id)
            .first()
            .is_some_and(|r| !r.state.is_calculating())
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let opt = h.store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Removed);
    assert!(h.store.routes_for_optimisation(id).is_empty());
    assert!(h.store.task(id).unwrap().is_completed());
}

#[test]
fn terminate_after_completion_is_a_no_op() {
    routeflow_test_utils::init_tracing();
    let store = Store::new();
    let jobs = InMemoryJobs::new();
    let sink = RecordingSink::new();
    let id = with_route(&store, OptimisationState::Completed, 1, &[10]);

    terminate_optimisation(&store, &jobs, &sink, id, None).unwrap();

    let opt = store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Completed);
    assert!(!opt.terminated);
    assert!(sink.events().is_empty());
}

#[test]
fn notify_customers_flips_the_flag_once() {
    routeflow_test_utils::init_tracing();
    let store = Store::new();
    let sink = RecordingSink::new();
    let id = store.insert_optimisation(entity(OptimisationState::Completed));

    assert!(notify_customers(&store, &sink, id, Some(3)).unwrap());
    assert!(!notify_customers(&store, &sink, id, Some(3)).unwrap());

    let opt = store.optimisation(id).unwrap();
    assert!(opt.customers_notified);
    assert_eq!(opt.log.count_event(LogEvent::NotifyCustomers), 1);
    assert_eq!(
        sink.count(|e| matches!(e, DomainEvent::CustomersNotified { .. })),
        1
    );
}
