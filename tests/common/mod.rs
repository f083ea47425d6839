#![allow(dead_code)]

use std::sync::Arc;

use routeflow::config::OrchestratorConfig;
use routeflow::orchestrator::Orchestrator;
use routeflow::store::Store;
use routeflow_test_utils::fakes::{FakeClusterer, FakeSolver, InMemoryJobs, RecordingSink};

pub struct Harness {
    pub store: Arc<Store>,
    pub solver: Arc<FakeSolver>,
    pub jobs: Arc<InMemoryJobs>,
    pub sink: Arc<RecordingSink>,
    pub orch: Arc<Orchestrator>,
}

pub fn spawn() -> Harness {
    spawn_with_config(OrchestratorConfig::default())
}

pub fn spawn_with_config(config: OrchestratorConfig) -> Harness {
    build(config, FakeClusterer::new())
}

pub fn spawn_with_clusterer(clusterer: FakeClusterer) -> Harness {
    build(OrchestratorConfig::default(), clusterer)
}

fn build(config: OrchestratorConfig, clusterer: FakeClusterer) -> Harness {
    routeflow_test_utils::init_tracing();
    let store = Arc::new(Store::new());
    let solver = Arc::new(FakeSolver::new());
    let clusterer = Arc::new(clusterer);
    let jobs = Arc::new(InMemoryJobs::new());
    let sink = Arc::new(RecordingSink::new());
    let (orch, _worker) = Orchestrator::spawn(
        Arc::clone(&store),
        solver.clone(),
        clusterer,
        jobs.clone(),
        sink.clone(),
        config,
    );
    Harness {
        store,
        solver,
        jobs,
        sink,
        orch,
    }
}
