//! Named workload records shared by the trace readers and the schedulers.
//!
//! Raw traces carry positional tuples and stringly-typed keys; readers decode
//! them into these records once, at the load boundary, so replay code never
//! touches raw indices.

use serde::{Deserialize, Serialize};

/// One whole-task placement request parsed from a task trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Trace job id this task belongs to.
    pub j_id: String,
    /// Task id within the job.
    pub t_id: String,
    /// Arrival time.
    pub submit: u64,
    pub duration: u64,
    /// Demand as a fraction of normalized machine capacity.
    pub memory: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl TaskRecord {
    pub fn id(&self) -> String {
        format!("{}/{}", self.j_id, self.t_id)
    }
}

/// One splittable placement request parsed from a request trace.
///
/// Stored as a `(duration, demand)` pair in checkpoint files, with demand in
/// absolute units on the producer scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub duration: u64,
    pub demand: f64,
}

impl RequestRecord {
    pub fn new(duration: u64, demand: f64) -> Self {
        Self { duration, demand }
    }
}

/// A producer machine with its traced usage series.
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub id: String,
    pub usage: Vec<f64>,
}
