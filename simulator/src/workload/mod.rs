//! Workload loading, synthesis and resolution.

pub mod random;
pub mod records;
pub mod request_trace;
pub mod synthesis;
pub mod task_trace;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::sim_config::WorkloadConfig;
use crate::error::{SimError, SimResult};

pub use records::{ProducerRecord, RequestRecord, TaskRecord};

/// Everything a fractional replay consumes: arrival-bucketed requests plus
/// the producer pool they are placed onto.
#[derive(Debug, Clone)]
pub struct FractionalWorkload {
    pub requests: BTreeMap<u64, Vec<RequestRecord>>,
    pub producers: Vec<ProducerRecord>,
    /// Capacity each producer usage series is measured against.
    pub producer_size: f64,
}

/// Supported workload source types.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub enum WorkloadType {
    Tasks,
    Requests,
    Synthesis,
    Random,
}

impl FromStr for WorkloadType {
    type Err = SimError;

    fn from_str(input: &str) -> Result<WorkloadType, Self::Err> {
        match input.to_lowercase().as_str() {
            "tasks" => Ok(WorkloadType::Tasks),
            "requests" => Ok(WorkloadType::Requests),
            "synthesis" => Ok(WorkloadType::Synthesis),
            "random" => Ok(WorkloadType::Random),
            other => Err(SimError::InvalidConfig(format!(
                "unknown workload type `{}`",
                other
            ))),
        }
    }
}

fn required_options(config: &WorkloadConfig) -> SimResult<&serde_yaml::Value> {
    config.options.as_ref().ok_or_else(|| {
        SimError::InvalidConfig(format!("workload type `{}` requires options", config.r#type))
    })
}

/// Resolves a workload config into a whole-task trace.
pub fn resolve_tasks(config: &WorkloadConfig) -> SimResult<Vec<TaskRecord>> {
    match WorkloadType::from_str(&config.r#type)? {
        WorkloadType::Tasks => {
            task_trace::TaskTraceReader::from_options(required_options(config)?)?.read_tasks()
        }
        WorkloadType::Random => {
            random::RandomWorkloadGenerator::from_options(required_options(config)?)?
                .generate_tasks()
        }
        other => Err(SimError::InvalidConfig(format!(
            "workload type {:?} does not produce whole tasks",
            other
        ))),
    }
}

/// Resolves a workload config into a fractional workload.
pub fn resolve_fractional(config: &WorkloadConfig) -> SimResult<FractionalWorkload> {
    match WorkloadType::from_str(&config.r#type)? {
        WorkloadType::Requests => {
            let reader = request_trace::RequestTraceReader::from_options(required_options(config)?)?;
            Ok(FractionalWorkload {
                requests: reader.read_requests()?,
                producers: reader.read_producers()?,
                producer_size: reader.producer_size,
            })
        }
        WorkloadType::Synthesis => {
            synthesis::RequestSynthesizer::from_options(required_options(config)?)?.synthesize()
        }
        WorkloadType::Random => {
            random::RandomWorkloadGenerator::from_options(required_options(config)?)?
                .generate_fractional()
        }
        other => Err(SimError::InvalidConfig(format!(
            "workload type {:?} does not produce splittable requests",
            other
        ))),
    }
}
