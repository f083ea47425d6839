mod common;

use routeflow::lifecycle;
use routeflow::model::log::LogEvent;
use routeflow::model::optimisation::OptimisationState;
use routeflow::orchestration::refresh::run_refresh;
use routeflow::events::DomainEvent;
use routeflow_test_utils::builders::OptimisationBuilder;
use routeflow_test_utils::fakes::ScriptedOutcome;
use routeflow_test_utils::wait_until;

async fn completed_optimisation(h: &common::Harness) -> u64 {
    let new = OptimisationBuilder::advanced()
        .with_drivers([1, 2])
        .with_jobs([10, 11, 12, 13])
        .build();
    let id = lifecycle::create_optimisation(&h.orch, new).await.unwrap();
    let store = h.store.clone();
    wait_until(move || {
        store.optimisation(id).unwrap().state == OptimisationState::Completed
    })
    .await;
    id
}

#[tokio::test]
async fn refresh_replaces_one_route_and_merges_the_log() {
    let h = common::spawn();
    let id = completed_optimisation(&h).await;
    let before: Vec<_> = h.store.routes_for_optimisation(id);
    let old_route = before.iter().find(|r| r.driver_id == 1).unwrap().clone();
    let changed_before = h
        .sink
        .count(|e| matches!(e, DomainEvent::OptimisationChanged { .. }));

    run_refresh(&h.orch, id, 1, Some(4)).await.unwrap();

    let after = h.store.routes_for_optimisation(id);
    assert_eq!(after.len(), before.len());
    let new_route = after.iter().find(|r| r.driver_id == 1).unwrap();
    assert_ne!(new_route.id, old_route.id);
    assert_eq!(new_route.color, old_route.color);

    let opt = h.store.optimisation(id).unwrap();
    // The source stays COMPLETED; the transient's history lands in its log.
    assert_eq!(opt.state, OptimisationState::Completed);
    assert!(opt.log.contains_event(LogEvent::RefreshStateChange));
    assert_eq!(
        h.sink
            .count(|e| matches!(e, DomainEvent::OptimisationChanged { .. })),
        changed_before + 1
    );
}

#[tokio::test]
async fn failed_refresh_leaves_the_source_untouched() {
    let h = common::spawn();
    let id = completed_optimisation(&h).await;
    h.solver
        .script_for_driver(1, ScriptedOutcome::SolverError("refresh broke".into()));
    let routes_before = h.store.routes_for_optimisation(id);
    let changed_before = h
        .sink
        .count(|e| matches!(e, DomainEvent::OptimisationChanged { .. }));

    run_refresh(&h.orch, id, 1, Some(4)).await.unwrap();

    let opt = h.store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Completed);
    assert!(!opt.log.contains_event(LogEvent::RefreshStateChange));
    let routes_after = h.store.routes_for_optimisation(id);
    assert_eq!(
        routes_before.iter().map(|r| r.id).collect::<Vec<_>>(),
        routes_after.iter().map(|r| r.id).collect::<Vec<_>>()
    );
    assert_eq!(
        h.sink
            .count(|e| matches!(e, DomainEvent::OptimisationChanged { .. })),
        changed_before
    );
}

#[tokio::test]
async fn refresh_of_an_unknown_driver_is_absorbed() {
    let h = common::spawn();
    let id = completed_optimisation(&h).await;

    run_refresh(&h.orch, id, 99, None).await.unwrap();

    let opt = h.store.optimisation(id).unwrap();
    assert_eq!(opt.state, OptimisationState::Completed);
    assert!(!opt.log.contains_event(LogEvent::RefreshStateChange));
}
