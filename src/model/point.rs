// src/model/point.rs

//! Route points: the ordered stops of a driver route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{HubId, JobId, LocationId, PointId, RouteId};

/// What kind of stop a point is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Hub,
    Pickup,
    Delivery,
    Location,
    Break,
}

/// What entity a point refers to. Break points carry no subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PointSubject {
    Job(JobId),
    Hub(HubId),
    Location(LocationId),
}

impl PointSubject {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            PointSubject::Job(id) => Some(*id),
            _ => None,
        }
    }
}

/// One stop on a driver route.
///
/// `number` is 1-based and gap-free per route; every mutation of the point
/// table must restore that invariant before releasing the table lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePoint {
    pub id: PointId,
    pub route_id: RouteId,
    pub kind: PointKind,
    pub subject: Option<PointSubject>,
    pub number: u32,
    pub service_time_secs: u64,
    pub driving_time_secs: u64,
    pub distance_meters: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Encoded polyline of the leg leading to this point, cached from the
    /// solver output.
    pub path_polyline: Option<String>,
}
