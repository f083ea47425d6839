// src/orchestration/combine.rs

//! Fan-in: folding N engine runs into one combined result.

use crate::engine::result::{AssignmentResult, Failure, SkippedJob};
use crate::model::{EngineRun, EngineRunState};

/// Outcome of combining all engine runs of an optimisation.
#[derive(Debug, Clone)]
pub struct CombinedResults {
    pub result: AssignmentResult,
    /// Highest-priority failure among failed runs, if any failed.
    pub failure: Option<Failure>,
    /// True when at least one run produced tours.
    pub good: bool,
}

/// Combine per-cluster engine runs.
///
/// A failed run contributes its entire input job set as skipped; the
/// combined result is good as long as any run produced tours. Failed
/// clusters therefore degrade the result instead of discarding it.
pub fn combine_engine_run_results(runs: &[EngineRun]) -> CombinedResults {
    let mut result = AssignmentResult::default();
    let mut failures: Vec<Failure> = Vec::new();

    for run in runs {
        match run.state {
            EngineRunState::Completed => {
                if let Some(run_result) = &run.result {
                    result.tours.extend(run_result.tours.iter().cloned());
                    result.skipped.extend(run_result.skipped.iter().cloned());
                    result
                        .skipped_drivers
                        .extend(run_result.skipped_drivers.iter().copied());
                }
            }
            EngineRunState::Failed | EngineRunState::Created | EngineRunState::Optimising => {
                // Runs still in the calculating set only show up here after
                // termination; treat them like failures.
                let reason = run
                    .failure
                    .as_ref()
                    .map(|f| f.message.clone())
                    .unwrap_or_else(|| "engine run did not complete".to_string());
                for job_id in run.options.params.job_ids() {
                    result.skipped.push(SkippedJob {
                        job_id,
                        reason: reason.clone(),
                    });
                }
                result.skipped_drivers.extend(run.options.params.driver_ids());
                if let Some(failure) = &run.failure {
                    failures.push(failure.clone());
                }
            }
        }
    }

    let good = result.is_good();
    CombinedResults {
        result,
        failure: pick_failure(failures),
        good,
    }
}

/// Pick the failure to surface when several runs failed differently.
/// Validation beats solver errors, which beat timeouts, which beat
/// anything unexpected. Ties keep the earliest run's failure.
pub fn pick_failure(failures: Vec<Failure>) -> Option<Failure> {
    failures
        .into_iter()
        .fold(None, |best: Option<Failure>, candidate| match best {
            Some(best) if best.kind.priority() >= candidate.kind.priority() => Some(best),
            _ => Some(candidate),
        })
}
