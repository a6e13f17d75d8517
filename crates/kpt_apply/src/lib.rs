//! Dependency-ordered apply: plans a server-side dry-run apply per resource,
//! executes in dependency order, waits for each object to reconcile, prunes
//! anything no longer desired, and reconciles the live inventory.

mod executor;
mod graph;
mod plan;
mod status;

pub use executor::{apply, ApplyConfig, ApplyOutcome};
pub use graph::DependencyGraph;
pub use plan::{Action, PlannedObject, Planner};
pub use status::{compute as compute_status, ReconcileStatus};
