//! Generation pipeline
//!
//! - `graph`: kind dependency graph (cycle detection, levels)
//! - `guard`: per-run duplicate output detection
//! - `store`: per-run committed outputs, read by dependent kinds
//! - `runner`: the level-by-level producer scheduler
//! - `report`: aggregated run result

mod graph;
mod guard;
mod report;
mod runner;
mod store;

pub use graph::KindGraph;
pub use guard::DuplicateGuard;
pub use report::{RunFailure, RunReport};
pub use runner::Pipeline;
pub use store::OutputStore;
