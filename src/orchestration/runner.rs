// src/orchestration/runner.rs

//! The optimisation runners: fan-out of engine runs and the fan-in that
//! finalizes the optimisation exactly once.

use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::backends::backend_for;
use crate::dispatch::WorkItem;
use crate::engine::result::Failure;
use crate::engine::{Clusterer, EngineOptions, EngineParameters};
use crate::errors::{OptimisationError, Result};
use crate::model::log::{progress_stage, LogEvent};
use crate::model::optimisation::OptimisationState;
use crate::model::EngineRun;
use crate::orchestration::combine::combine_engine_run_results;
use crate::orchestrator::Orchestrator;
use crate::store::Store;
use crate::types::{EngineRunId, OptimisationId, OptimisationType};

/// Small optimisations skip clustering and run a single engine run
/// in-place: single-driver types always, multi-driver ones when the
/// clusterer would produce one cluster anyway.
pub fn is_small_optimisation(
    optimisation_type: OptimisationType,
    clusterer: &dyn Clusterer,
    params: &EngineParameters,
) -> bool {
    if optimisation_type == OptimisationType::Solo {
        return true;
    }
    clusterer.estimate(params) <= 1
}

fn log_progress(store: &Store, optimisation: OptimisationId, stage: &str) -> Result<()> {
    store.update_optimisation(optimisation, |opt| {
        opt.log
            .append(LogEvent::Progress, json!({ "stage": stage }));
    })
}

/// Entry point for a created optimisation: validate, cluster, dispatch.
pub async fn run_optimisation(orch: &Orchestrator, optimisation: OptimisationId) -> Result<()> {
    let opt = orch.store.optimisation(optimisation)?;
    if opt.terminated || opt.state == OptimisationState::Removed {
        debug!(optimisation, "skipping run of removed optimisation");
        return Ok(());
    }
    let backend = backend_for(opt.optimisation_type);
    let ctx = orch.backend_ctx();

    log_progress(&orch.store, optimisation, progress_stage::START)?;
    orch.store.update_optimisation(optimisation, |o| {
        o.state_to(OptimisationState::Optimising, None)
    })??;

    let params = match backend.params_for_engine(&ctx, optimisation).and_then(|p| {
        if p.jobs.is_empty() {
            Err(OptimisationError::Validation("no jobs to optimise".into()))
        } else if p.drivers.is_empty() {
            Err(OptimisationError::Validation("no drivers available".into()))
        } else {
            Ok(p)
        }
    }) {
        Ok(params) => params,
        Err(e) => {
            backend.on_fail(&ctx, optimisation, Some(&Failure::classify(&e)))?;
            orch.store.complete_task(optimisation)?;
            return Ok(());
        }
    };

    log_progress(&orch.store, optimisation, progress_stage::CLUSTERING)?;
    if is_small_optimisation(opt.optimisation_type, &*orch.clusterer, &params) {
        run_small(orch, optimisation, params).await
    } else {
        run_advanced(orch, optimisation, params).await
    }
}

/// Small path: one engine run, executed here, finalized here.
async fn run_small(
    orch: &Orchestrator,
    optimisation: OptimisationId,
    params: EngineParameters,
) -> Result<()> {
    let opt = orch.store.optimisation(optimisation)?;
    let backend = backend_for(opt.optimisation_type);
    let ctx = orch.backend_ctx();

    let run_id = orch.store.insert_engine_run(EngineRun::new(
        0,
        optimisation,
        EngineOptions {
            params,
            algorithm: backend.algorithm(),
        },
    ));
    solve_one(orch, run_id).await?;

    // Terminate completes the task, so a solve that outlives it loses the
    // claim here exactly like the fan-in path does.
    if !orch.store.claim_finalize(optimisation)? {
        debug!(optimisation, "finalization already claimed");
        return Ok(());
    }
    let opt = orch.store.optimisation(optimisation)?;
    if opt.terminated {
        backend.on_fail(&ctx, optimisation, None)?;
        return Ok(());
    }

    let run = orch.store.engine_run(run_id)?;
    let applied = match run.result.as_ref().filter(|r| r.is_good()) {
        Some(result) => backend.on_finish(&ctx, optimisation, result),
        None => backend.on_fail(&ctx, optimisation, run.failure.as_ref()),
    };
    if let Err(e) = applied {
        warn!(optimisation, error = %e, "applying results failed");
        orch.store.update_optimisation(optimisation, |o| {
            o.log.append(
                LogEvent::Exception,
                json!({ "code": "post_processing", "message": e.to_string() }),
            );
        })?;
        backend.on_fail(&ctx, optimisation, Some(&Failure::classify(&e)))?;
    }
    log_progress(&orch.store, optimisation, progress_stage::FINISH)?;
    Ok(())
}

/// Advanced path: split into clusters, dispatch one engine run per group.
async fn run_advanced(
    orch: &Orchestrator,
    optimisation: OptimisationId,
    params: EngineParameters,
) -> Result<()> {
    let opt = orch.store.optimisation(optimisation)?;
    let backend = backend_for(opt.optimisation_type);
    let ctx = orch.backend_ctx();

    let (groups, api_usage) = match orch.clusterer.split(params) {
        Ok(split) => split,
        Err(e) => {
            backend.on_fail(&ctx, optimisation, Some(&Failure::classify(&e)))?;
            orch.store.complete_task(optimisation)?;
            return Ok(());
        }
    };
    if !api_usage.is_empty() {
        orch.store.update_optimisation(optimisation, |o| {
            o.log
                .append(LogEvent::ApiUsage, json!({ "stat": api_usage.counters() }));
            api_usage.clone().merge_into(&mut o.api_usage);
        })?;
    }

    log_progress(&orch.store, optimisation, progress_stage::ENGINES_CREATE)?;
    info!(
        optimisation,
        groups = groups.len(),
        "dispatching engine runs"
    );
    let mut run_ids = Vec::with_capacity(groups.len());
    for group in groups {
        let run_id = orch.store.insert_engine_run(EngineRun::new(
            0,
            optimisation,
            EngineOptions {
                params: group,
                algorithm: backend.algorithm(),
            },
        ));
        run_ids.push(run_id);
    }
    // Runs exist before any is dispatched, so an early finisher's fan-in
    // sees the full set and returns early instead of finalizing.
    for run_id in run_ids {
        orch.enqueue(WorkItem::ExecuteEngineRun {
            optimisation,
            engine_run: run_id,
        })
        .await?;
    }
    Ok(())
}

/// Run the solver for one engine run under the soft time limit, recording
/// the outcome on the run.
async fn solve_one(orch: &Orchestrator, engine_run: EngineRunId) -> Result<()> {
    let options = orch
        .store
        .update_engine_run(engine_run, |run| {
            run.start();
            run.options.clone()
        })?;
    let limit = orch.config.soft_time_limit();
    match timeout(limit, orch.solver.solve(options)).await {
        Ok(Ok(result)) => orch
            .store
            .update_engine_run(engine_run, |run| run.finish(result))?,
        Ok(Err(e)) => {
            warn!(engine_run, error = %e, "engine run failed");
            orch.store
                .update_engine_run(engine_run, |run| run.fail(Failure::classify(&e)))?
        }
        Err(_) => {
            warn!(engine_run, ?limit, "engine run hit soft time limit");
            let failure = Failure::classify(&OptimisationError::SoftTimeout(limit));
            orch.store
                .update_engine_run(engine_run, |run| run.fail(failure))?
        }
    }
    Ok(())
}

/// Execute one dispatched engine run. The fan-in continuation is enqueued
/// no matter how the run went; a crashing run must never leave the
/// optimisation hanging.
pub async fn execute_engine_run(
    orch: &Orchestrator,
    optimisation: OptimisationId,
    engine_run: EngineRunId,
) -> Result<()> {
    let solve_outcome = solve_one(orch, engine_run).await;
    let enqueue_outcome = orch.enqueue(WorkItem::HandleResults { optimisation }).await;
    solve_outcome?;
    enqueue_outcome?;
    Ok(())
}

/// Fan-in: combine all runs and finalize the optimisation, at most once.
pub async fn handle_results(orch: &Orchestrator, optimisation: OptimisationId) -> Result<()> {
    let opt = orch.store.optimisation(optimisation)?;
    if orch.store.any_run_calculating(optimisation) && !opt.terminated {
        debug!(optimisation, "runs still calculating, fan-in deferred");
        return Ok(());
    }
    // Conditional task update: whoever loses this claim does nothing.
    if !orch.store.claim_finalize(optimisation)? {
        debug!(optimisation, "finalization already claimed");
        return Ok(());
    }

    let backend = backend_for(opt.optimisation_type);
    let ctx = orch.backend_ctx();
    let opt = orch.store.optimisation(optimisation)?;
    if opt.terminated {
        backend.on_fail(&ctx, optimisation, None)?;
        return Ok(());
    }

    let runs = orch.store.engine_runs_for(optimisation);
    let combined = combine_engine_run_results(&runs);
    if combined.good {
        if let Err(e) = backend.on_finish(&ctx, optimisation, &combined.result) {
            warn!(optimisation, error = %e, "applying results failed");
            orch.store.update_optimisation(optimisation, |o| {
                o.log.append(
                    LogEvent::Exception,
                    json!({ "code": "post_processing", "message": e.to_string() }),
                );
            })?;
            backend.on_fail(&ctx, optimisation, Some(&Failure::classify(&e)))?;
        }
    } else {
        backend.on_fail(&ctx, optimisation, combined.failure.as_ref())?;
    }
    log_progress(&orch.store, optimisation, progress_stage::FINISH)?;
    Ok(())
}
