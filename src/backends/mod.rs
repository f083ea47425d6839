// src/backends/mod.rs

//! Per-type optimisation behaviour.
//!
//! A backend bundles the hooks that differ between optimisation types:
//! what happens on creation, how engine parameters are derived, which
//! algorithm runs, and how results or failures are applied. The registry
//! resolves a backend statically from the optimisation type.

use std::sync::OnceLock;

use serde_json::json;
use tracing::{error, info};

use crate::engine::result::{AssignmentResult, Failure};
use crate::engine::{Algorithm, EngineParameters};
use crate::errors::Result;
use crate::events::{DomainEvent, EventSink};
use crate::jobs::JobDomain;
use crate::model::log::{progress_stage, LogEvent};
use crate::model::optimisation::OptimisationState;
use crate::model::EngineRunState;
use crate::store::Store;
use crate::types::{MemberId, OptimisationId, OptimisationType};

pub mod persist;

pub use persist::{persist_assignment, replace_driver_route};

/// Collaborators a backend hook may need. Borrowed for the duration of the
/// call; backends themselves are stateless.
pub struct BackendContext<'a> {
    pub store: &'a Store,
    pub jobs: &'a dyn JobDomain,
    pub events: &'a dyn EventSink,
}

pub trait OptimisationBackend: Send + Sync {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Default
    }

    /// Called right after the entity exists. Default moves it into
    /// validation.
    fn on_create(&self, ctx: &BackendContext<'_>, optimisation: OptimisationId) -> Result<()> {
        ctx.store.update_optimisation(optimisation, |opt| {
            opt.state_to(OptimisationState::Validation, opt.created_by)
        })?
    }

    /// Derive the engine input from the optimisation's validated options.
    fn params_for_engine(
        &self,
        ctx: &BackendContext<'_>,
        optimisation: OptimisationId,
    ) -> Result<EngineParameters> {
        let opt = ctx.store.optimisation(optimisation)?;
        EngineParameters::from_options(&opt.optimisation_options)
    }

    /// Apply a good combined result: persist routes and points, then move
    /// the optimisation to `Completed`.
    fn on_finish(
        &self,
        ctx: &BackendContext<'_>,
        optimisation: OptimisationId,
        result: &AssignmentResult,
    ) -> Result<()> {
        ctx.store.update_optimisation(optimisation, |opt| {
            opt.log.append(
                LogEvent::Progress,
                json!({ "stage": progress_stage::ASSIGN }),
            );
        })?;
        persist_assignment(ctx.store, optimisation, result)?;
        ctx.store.update_optimisation(optimisation, |opt| {
            opt.state_to(OptimisationState::Completed, None)
        })??;
        ctx.events
            .emit(DomainEvent::OptimisationChanged { optimisation });
        Ok(())
    }

    /// Apply a failure. On a terminated optimisation this only sweeps
    /// not-yet-started runs into `Failed`; the terminate path already
    /// settled the entity state.
    fn on_fail(
        &self,
        ctx: &BackendContext<'_>,
        optimisation: OptimisationId,
        failure: Option<&Failure>,
    ) -> Result<()> {
        let opt = ctx.store.optimisation(optimisation)?;
        if opt.terminated {
            for run in ctx.store.engine_runs_for(optimisation) {
                if run.state == EngineRunState::Created {
                    ctx.store.update_engine_run(run.id, |r| {
                        r.state = EngineRunState::Failed;
                    })?;
                }
            }
            return Ok(());
        }
        error!(optimisation, failure = ?failure, "optimisation failed");
        ctx.store.update_optimisation(optimisation, |opt| {
            if let Some(failure) = failure {
                opt.log.append(
                    LogEvent::Exception,
                    json!({ "kind": failure.kind, "message": failure.message }),
                );
            }
            opt.state_to(OptimisationState::Failed, None)
        })??;
        ctx.events
            .emit(DomainEvent::OptimisationChanged { optimisation });
        Ok(())
    }

    /// Called by delete once the routes are gone; writes the audit entry.
    fn on_delete(
        &self,
        ctx: &BackendContext<'_>,
        optimisation: OptimisationId,
        initiator: Option<MemberId>,
        unassign: bool,
    ) -> Result<()> {
        ctx.store.update_optimisation(optimisation, |opt| {
            opt.log.append(
                LogEvent::DeleteOptimisation,
                json!({ "initiator": initiator, "unassign": unassign }),
            );
        })
    }

    /// Called by terminate after the flag is set; writes the audit entry.
    fn on_terminate(
        &self,
        ctx: &BackendContext<'_>,
        optimisation: OptimisationId,
        initiator: Option<MemberId>,
    ) -> Result<()> {
        info!(optimisation, ?initiator, "optimisation terminated");
        ctx.store.update_optimisation(optimisation, |opt| {
            opt.log.append(
                LogEvent::TerminateOptimisation,
                json!({ "code": "terminated", "initiator": initiator }),
            );
        })
    }
}

/// Single-driver optimisations: always the small path, default algorithm.
pub struct SoloBackend;

impl OptimisationBackend for SoloBackend {}

/// Multi-driver optimisations; may fan out over clusters.
pub struct AdvancedBackend;

impl OptimisationBackend for AdvancedBackend {}

/// Refresh runs re-route one driver at a time.
pub struct RefreshBackend;

impl OptimisationBackend for RefreshBackend {
    fn algorithm(&self) -> Algorithm {
        Algorithm::OneDriver
    }
}

struct BackendRegistry {
    solo: SoloBackend,
    advanced: AdvancedBackend,
    refresh: RefreshBackend,
}

static REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();

/// Resolve the backend for an optimisation type.
pub fn backend_for(optimisation_type: OptimisationType) -> &'static dyn OptimisationBackend {
    let registry = REGISTRY.get_or_init(|| BackendRegistry {
        solo: SoloBackend,
        advanced: AdvancedBackend,
        refresh: RefreshBackend,
    });
    match optimisation_type {
        OptimisationType::Solo => &registry.solo,
        OptimisationType::Advanced | OptimisationType::PtvExport => &registry.advanced,
        OptimisationType::Refresh => &registry.refresh,
    }
}
