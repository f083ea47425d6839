// src/events.rs

//! Outbound domain events.
//!
//! The sink is fire-and-forget: delivery (websockets, webhooks, push) lives
//! outside this crate. Orchestration emits events and moves on.

use tracing::info;

use crate::types::{DriverId, OptimisationId, RouteId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    OptimisationCreated {
        optimisation: OptimisationId,
    },
    OptimisationChanged {
        optimisation: OptimisationId,
    },
    OptimisationDeleted {
        optimisation: OptimisationId,
    },
    /// A driver's route was removed while the day is underway; the driver
    /// app should be told.
    RouteRemoved {
        optimisation: OptimisationId,
        route: RouteId,
        driver: DriverId,
    },
    CustomersNotified {
        optimisation: OptimisationId,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Default sink: structured log lines only.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: DomainEvent) {
        info!(?event, "domain event");
    }
}
