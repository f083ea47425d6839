// src/types.rs

use serde::{Deserialize, Serialize};

/// Entity identifiers. The persistence layer hands these out sequentially;
/// external ids (merchants, members, jobs) come from the surrounding system.
pub type OptimisationId = u64;
pub type EngineRunId = u64;
pub type RouteId = u64;
pub type PointId = u64;
pub type MerchantId = u64;
pub type MemberId = u64;
pub type DriverId = u64;
pub type JobId = u64;
pub type HubId = u64;
pub type LocationId = u64;

/// Correlation id of one dispatched unit of queue work.
pub type CorrelationId = u64;

/// Kind of optimisation, selecting the backend strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimisationType {
    /// Single-driver optimisation; always runs the small path.
    Solo,
    /// Multi-driver optimisation; may fan out over clusters.
    Advanced,
    /// Externally exported optimisation (behaves like `Advanced` here).
    PtvExport,
    /// Disposable context used by the refresh path.
    Refresh,
}

/// Job lifecycle status as reported by the order domain.
///
/// The reactor only cares about two subsets: the "start" set that flips a
/// route/optimisation to RUNNING, and the terminal set used for the
/// possible-finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotAssigned,
    Assigned,
    PickUp,
    PickedUp,
    InProgress,
    WayBack,
    Delivered,
    Failed,
}

impl JobStatus {
    /// Statuses meaning the driver has actively started working the job.
    pub fn is_route_start(self) -> bool {
        matches!(
            self,
            JobStatus::PickUp | JobStatus::PickedUp | JobStatus::InProgress | JobStatus::WayBack
        )
    }

    /// Terminal statuses: the job will not change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Delivered | JobStatus::Failed)
    }
}

/// Why route points are being removed (mirrors the order-domain event that
/// triggered the removal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    Delete,
    Unassign,
}
