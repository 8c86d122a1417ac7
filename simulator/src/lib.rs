#![doc = include_str!("../readme.md")]

pub mod capacity;
pub mod config;
pub mod error;
pub mod metrics;
pub mod parallel_launcher;
pub mod reports;
pub mod scheduler;
pub mod simulation;
pub mod workload;

pub use capacity::{Timeline, UsageSeries};
pub use error::{SimError, SimResult};
pub use metrics::MetricsCollector;
pub use parallel_launcher::ParallelSimulationsLauncher;
pub use scheduler::{FractionalScheduler, PlacementState, WholeTaskScheduler};
pub use simulation::{FractionalSimulation, WholeTaskSimulation};
pub use workload::{RequestRecord, TaskRecord};
