//! Simulation configuration loaded from YAML.

use std::fs::File;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

pub const DEFAULT_LOOKAHEAD_STEP: u64 = 10_000_000;
pub const DEFAULT_MAX_LOOKAHEAD_STEPS: u32 = 1_000;
pub const DEFAULT_SPLIT_FACTOR: u32 = 1;

/// Workload source: a type tag plus reader-specific options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub r#type: String,
    pub options: Option<serde_yaml::Value>,
}

/// Machine pool for whole-task replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachinePoolConfig {
    pub count: usize,
    /// Normalized capacity of every machine, 1.0 when omitted.
    pub capacity: Option<f64>,
    /// Usage every machine starts with, 0.0 when omitted.
    pub seed_usage: Option<f64>,
}

impl MachinePoolConfig {
    pub fn get_capacity(&self) -> f64 {
        self.capacity.unwrap_or(crate::capacity::DEFAULT_CAPACITY)
    }

    pub fn get_seed_usage(&self) -> f64 {
        self.seed_usage.unwrap_or(0.)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How far a whole-task retry jumps forward when no machine has a window.
    pub lookahead_step: Option<u64>,
    /// Retry budget before a task is declared starved.
    pub max_lookahead_steps: Option<u32>,
    /// How many equal fractions a splittable request divides into.
    pub split_factor: Option<u32>,
}

impl SchedulerConfig {
    pub fn get_lookahead_step(&self) -> u64 {
        self.lookahead_step.unwrap_or(DEFAULT_LOOKAHEAD_STEP)
    }

    pub fn get_max_lookahead_steps(&self) -> u32 {
        self.max_lookahead_steps.unwrap_or(DEFAULT_MAX_LOOKAHEAD_STEPS)
    }

    pub fn get_split_factor(&self) -> SimResult<u32> {
        let factor = self.split_factor.unwrap_or(DEFAULT_SPLIT_FACTOR);
        if factor == 0 {
            return Err(SimError::InvalidConfig(
                "split_factor must be at least 1".to_string(),
            ));
        }
        Ok(factor)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Progress log cadence in processed requests.
    pub progress_interval: Option<u64>,
    /// Where distribution reports are written. No reports when omitted.
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub workload: WorkloadConfig,
    pub machines: Option<MachinePoolConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl SimulationConfig {
    pub fn from_file(file_name: &str) -> SimResult<Self> {
        let file = File::open(file_name).map_err(|e| SimError::missing_input(file_name, e))?;
        serde_yaml::from_reader(file)
            .map_err(|e| SimError::InvalidConfig(format!("{}: {}", file_name, e)))
    }

    pub fn get_output_dir(&self) -> Option<String> {
        self.metrics.output_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let yaml = r#"
            workload:
              type: tasks
              options:
                path: traces/tasks.json
                task_limit: 1000
            machines:
              count: 54
              capacity: 1.0
            scheduler:
              lookahead_step: 10000000
              max_lookahead_steps: 100
            metrics:
              progress_interval: 10000
              output_dir: results/run1
        "#;
        let config: SimulationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.workload.r#type, "tasks");
        assert_eq!(config.machines.as_ref().unwrap().count, 54);
        assert_eq!(config.scheduler.get_lookahead_step(), 10_000_000);
        assert_eq!(config.scheduler.get_max_lookahead_steps(), 100);
        assert_eq!(config.get_output_dir().unwrap(), "results/run1");
    }

    #[test]
    fn scheduler_and_metrics_sections_are_optional() {
        let yaml = r#"
            workload:
              type: requests
              options:
                request_path: traces/request.json
                producer_path: traces/producer.json
        "#;
        let config: SimulationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scheduler.get_lookahead_step(), DEFAULT_LOOKAHEAD_STEP);
        assert_eq!(config.scheduler.get_split_factor().unwrap(), 1);
        assert!(config.get_output_dir().is_none());
        assert!(config.machines.is_none());
    }

    #[test]
    fn zero_split_factor_is_rejected() {
        let config = SchedulerConfig {
            lookahead_step: None,
            max_lookahead_steps: None,
            split_factor: Some(0),
        };
        assert!(config.get_split_factor().is_err());
    }
}
