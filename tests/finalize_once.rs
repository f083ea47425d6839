mod common;

use std::collections::HashMap;

use chrono::NaiveDate;
use routeflow::engine::params::EngineParameters;
use routeflow::engine::{Algorithm, EngineOptions};
use routeflow::model::log::LogEvent;
use routeflow::model::optimisation::{OptimisationState, RouteOptimisation};
use routeflow::model::{EngineRun, OptimisationLog, TaskStatus};
use routeflow::orchestration::runner::handle_results;
use routeflow::types::OptimisationType;
use routeflow_test_utils::fakes::echo_assignment;
use serde_json::json;

fn optimising_entity() -> RouteOptimisation {
    RouteOptimisation {
        id: 0,
        optimisation_type: OptimisationType::Advanced,
        merchant_id: 1,
        created_by: None,
        day: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        options: serde_json::Value::Null,
        optimisation_options: serde_json::Value::Null,
        state: OptimisationState::Optimising,
        customers_notified: false,
        is_removing_currently: false,
        terminated: false,
        external_source: None,
        api_usage: HashMap::new(),
        log: OptimisationLog::default(),
    }
}

fn finished_run(optimisation: u64, driver: u64, jobs: &[u64]) -> EngineRun {
    let params = EngineParameters::from_options(&json!({
        "jobs": jobs
            .iter()
            .map(|j| json!({"id": j, "delivery": {"lat": 59.9, "lng": 10.7}}))
            .collect::<Vec<_>>(),
        "drivers": [{"id": driver}],
    }))
    .unwrap();
    let mut run = EngineRun::new(
        0,
        optimisation,
        EngineOptions {
            params: params.clone(),
            algorithm: Algorithm::Default,
        },
    );
    run.start();
    run.finish(echo_assignment(&params));
    run
}

#[tokio::test]
async fn concurrent_fan_in_finalizes_exactly_once() {
    let h = common::spawn();
    let id = h.store.insert_optimisation(optimising_entity());
    h.store.insert_engine_run(finished_run(id, 1, &[10, 11]));
    h.store.insert_engine_run(finished_run(id, 2, &[20]));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orch = h.orch.clone();
        handles.push(tokio::spawn(
            async move { handle_results(&orch, id).await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let opt = h.store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Completed);
    let completed_entries = opt
        .log
        .entries()
        .iter()
        .filter(|e| e.event == LogEvent::StateChange && e.payload["state"] == "COMPLETED")
        .count();
    assert_eq!(completed_entries, 1);
    // Routes were persisted by the single winning fan-in only.
    assert_eq!(h.store.routes_for_optimisation(id).len(), 2);
    assert_eq!(h.store.task(id).unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn fan_in_waits_for_calculating_runs() {
    let h = common::spawn();
    let id = h.store.insert_optimisation(optimising_entity());
    h.store.insert_engine_run(finished_run(id, 1, &[10]));
    // Second run has not finished yet.
    let params = EngineParameters::from_options(&json!({
        "jobs": [{"id": 20, "delivery": {"lat": 59.9, "lng": 10.7}}],
        "drivers": [{"id": 2}],
    }))
    .unwrap();
    h.store.insert_engine_run(EngineRun::new(
        0,
        id,
        EngineOptions {
            params,
            algorithm: Algorithm::Default,
        },
    ));

    handle_results(&h.orch, id).await.unwrap();

    let opt = h.store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Optimising);
    assert_ne!(h.store.task(id).unwrap().status, TaskStatus::Completed);
}
