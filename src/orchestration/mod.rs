// src/orchestration/mod.rs

//! Optimisation runners: fan-out, fan-in, and the refresh path.

pub mod combine;
pub mod refresh;
pub mod runner;

pub use combine::{combine_engine_run_results, pick_failure, CombinedResults};
pub use refresh::merge_transient_log;
pub use runner::is_small_optimisation;
