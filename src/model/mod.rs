// src/model/mod.rs

//! Entity layer: optimisations, routes, points, engine runs, tasks, and
//! the structured log they all embed.

pub mod engine_run;
pub mod log;
pub mod optimisation;
pub mod point;
pub mod route;
pub mod task;

pub use engine_run::{EngineRun, EngineRunState};
pub use log::{progress_stage, LogEntry, LogEvent, OptimisationLog};
pub use optimisation::{
    ExternalSource, OptimisationContext, OptimisationState, RouteOptimisation,
    TransientOptimisation,
};
pub use point::{PointKind, PointSubject, RoutePoint};
pub use route::{DriverRoute, RouteColorPicker, RouteState, ROUTE_COLORS};
pub use task::{OptimisationTask, TaskStatus};
