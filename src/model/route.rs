// src/model/route.rs

//! Driver routes and their display colors.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{DriverId, OptimisationId, RouteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteState {
    Created,
    Running,
    Finished,
    Failed,
}

/// One driver's route inside an optimisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRoute {
    pub id: RouteId,
    pub optimisation_id: OptimisationId,
    pub driver_id: DriverId,
    /// Display color, unique within the optimisation.
    pub color: String,
    pub state: RouteState,
    pub total_time_secs: Option<u64>,
    pub driving_time_secs: Option<u64>,
    pub driving_distance_meters: Option<u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Palette of route colors shown on the map. Evenly spaced hues, fixed
/// saturation and lightness.
pub const ROUTE_COLORS: [&str; 72] = [
    "#BF4040", "#BF4A40", "#BF5540", "#BF6040", "#BF6A40", "#BF7540", "#BF8040", "#BF8A40",
    "#BF9540", "#BF9F40", "#BFAA40", "#BFB540", "#BFBF40", "#B5BF40", "#AABF40", "#9FBF40",
    "#95BF40", "#8ABF40", "#7FBF40", "#75BF40", "#6ABF40", "#60BF40", "#55BF40", "#4ABF40",
    "#40BF40", "#3FBE4A", "#40BF55", "#40BF60", "#40BF6A", "#40BF75", "#40BF7F", "#40BF8A",
    "#40BF95", "#40BF9F", "#40BFAA", "#40BFB5", "#40BFBF", "#40B5BF", "#40AABF", "#409FBF",
    "#4095BF", "#408ABF", "#4080BF", "#4075BF", "#406ABF", "#4060BF", "#4055BF", "#404ABF",
    "#4040BF", "#4A40BF", "#5540BF", "#6040BF", "#6A40BF", "#7540BF", "#8040BF", "#8A40BF",
    "#9540BF", "#9F40BF", "#AA40BF", "#B540BF", "#BF40BF", "#BF40B5", "#BF40AA", "#BF409F",
    "#BF4095", "#BF408A", "#BF407F", "#BF4075", "#BF406A", "#BF4060", "#BF4055", "#BF404A",
];

/// Hands out route colors, avoiding ones already used in the optimisation.
///
/// Once the palette is exhausted it falls back to reuse; 72 routes per
/// optimisation is well past any realistic fleet size.
#[derive(Debug)]
pub struct RouteColorPicker {
    remaining: Vec<&'static str>,
}

impl RouteColorPicker {
    pub fn new() -> Self {
        Self {
            remaining: ROUTE_COLORS.to_vec(),
        }
    }

    pub fn pick(&mut self, exclude: &[String]) -> String {
        let mut rng = rand::thread_rng();
        let candidates: Vec<usize> = self
            .remaining
            .iter()
            .enumerate()
            .filter(|(_, c)| !exclude.iter().any(|e| e == **c))
            .map(|(i, _)| i)
            .collect();
        match candidates.choose(&mut rng) {
            Some(&idx) => self.remaining.swap_remove(idx).to_string(),
            None => {
                let idx = rng.gen_range(0..ROUTE_COLORS.len());
                ROUTE_COLORS[idx].to_string()
            }
        }
    }
}

impl Default for RouteColorPicker {
    fn default() -> Self {
        Self::new()
    }
}
