//! Admission policies: whole-task greedy placement and fractional placement
//! with a per-tick backlog.

pub mod fractional;
pub mod whole_task;

pub use fractional::{FractionalScheduler, PendingRequest, Producer};
pub use whole_task::WholeTaskScheduler;

use serde::Serialize;

/// Lifecycle of a placement request.
///
/// Whole-task requests go straight from `Pending` to `Placed`. Splittable
/// requests may sit at `PartiallyPlaced` while some fractions wait in the
/// backlog, and end as `UnassignedAtHorizon` when the trace runs out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlacementState {
    Pending,
    PartiallyPlaced,
    Placed,
    UnassignedAtHorizon,
}

/// A committed whole-task placement.
#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    pub task_id: String,
    pub machine_id: u64,
    pub start_time: u64,
    /// Chosen start minus the original arrival time.
    pub wait_time: u64,
}
