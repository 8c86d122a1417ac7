//! Synthetic workload generator for smoke runs and demos.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::workload::records::{ProducerRecord, RequestRecord, TaskRecord};
use crate::workload::FractionalWorkload;

const DEFAULT_SEED: u64 = 42;
const DEFAULT_PRODUCER_COUNT: usize = 8;
const DEFAULT_PRODUCER_SIZE: f64 = 64.;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Options {
    request_count: u32,
    demand_min: f64,
    demand_max: f64,
    duration_mean: f64,
    duration_dev: f64,
    delay_min: u64,
    delay_max: u64,
    start_time: Option<u64>,
    seed: Option<u64>,
    // Only read when the generator feeds a fractional replay.
    producer_count: Option<usize>,
    producer_size: Option<f64>,
    producer_ticks: Option<usize>,
}

/// Samples placement requests with normally distributed durations and
/// uniformly distributed demands and inter-arrival delays.
///
/// The generator is deterministic for a fixed seed, so demo configs replay
/// identically from run to run.
pub struct RandomWorkloadGenerator {
    options: Options,
    rng: StdRng,
}

impl RandomWorkloadGenerator {
    pub fn from_options(options: &serde_yaml::Value) -> SimResult<Self> {
        let options: Options = serde_yaml::from_value(options.clone())
            .map_err(|e| SimError::InvalidConfig(format!("random workload options: {}", e)))?;
        if options.demand_min <= 0. || options.demand_min > options.demand_max {
            return Err(SimError::InvalidConfig(format!(
                "random workload demand range [{}, {}] is empty or non-positive",
                options.demand_min, options.demand_max
            )));
        }
        if options.delay_min > options.delay_max {
            return Err(SimError::InvalidConfig(format!(
                "random workload delay range [{}, {}] is empty",
                options.delay_min, options.delay_max
            )));
        }
        let rng = StdRng::seed_from_u64(options.seed.unwrap_or(DEFAULT_SEED));
        Ok(Self { options, rng })
    }

    /// Generates a whole-task trace ordered by submit time.
    pub fn generate_tasks(&mut self) -> SimResult<Vec<TaskRecord>> {
        let durations = self.duration_distribution()?;
        let mut tasks = Vec::with_capacity(self.options.request_count as usize);
        let mut time = self.options.start_time.unwrap_or(0);
        for id in 0..self.options.request_count {
            tasks.push(TaskRecord {
                j_id: id.to_string(),
                t_id: "0".to_string(),
                submit: time,
                duration: sample_duration(&durations, &mut self.rng),
                memory: self
                    .rng
                    .gen_range(self.options.demand_min..=self.options.demand_max),
                priority: None,
            });
            time += self
                .rng
                .gen_range(self.options.delay_min..=self.options.delay_max);
        }
        Ok(tasks)
    }

    /// Generates splittable requests bucketed by arrival tick.
    pub fn generate_requests(&mut self) -> SimResult<BTreeMap<u64, Vec<RequestRecord>>> {
        let durations = self.duration_distribution()?;
        let mut requests: BTreeMap<u64, Vec<RequestRecord>> = BTreeMap::new();
        let mut time = self.options.start_time.unwrap_or(0);
        for _ in 0..self.options.request_count {
            let record = RequestRecord::new(
                sample_duration(&durations, &mut self.rng),
                self.rng
                    .gen_range(self.options.demand_min..=self.options.demand_max),
            );
            requests.entry(time).or_default().push(record);
            time += self
                .rng
                .gen_range(self.options.delay_min..=self.options.delay_max);
        }
        Ok(requests)
    }

    /// Generates requests together with idle producers sized to host them,
    /// for self-contained fractional demo runs.
    pub fn generate_fractional(&mut self) -> SimResult<FractionalWorkload> {
        let requests = self.generate_requests()?;
        let horizon = requests
            .iter()
            .flat_map(|(arrival, bucket)| {
                bucket.iter().map(move |r| (arrival + r.duration + 1) as usize)
            })
            .max()
            .unwrap_or(1);
        let ticks = self.options.producer_ticks.unwrap_or(horizon);
        let count = self.options.producer_count.unwrap_or(DEFAULT_PRODUCER_COUNT);
        let producers = (0..count)
            .map(|i| ProducerRecord {
                id: format!("p{:03}", i),
                usage: vec![0.; ticks],
            })
            .collect();
        Ok(FractionalWorkload {
            requests,
            producers,
            producer_size: self.options.producer_size.unwrap_or(DEFAULT_PRODUCER_SIZE),
        })
    }

    fn duration_distribution(&self) -> SimResult<Normal<f64>> {
        Normal::new(self.options.duration_mean, self.options.duration_dev).map_err(|e| {
            SimError::InvalidConfig(format!(
                "random workload duration distribution ({}, {}): {}",
                self.options.duration_mean, self.options.duration_dev, e
            ))
        })
    }
}

fn sample_duration(distribution: &Normal<f64>, rng: &mut StdRng) -> u64 {
    (distribution.sample(rng) as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(seed: Option<u64>) -> serde_yaml::Value {
        serde_yaml::to_value(Options {
            request_count: 50,
            demand_min: 0.1,
            demand_max: 0.5,
            duration_mean: 20.,
            duration_dev: 5.,
            delay_min: 0,
            delay_max: 3,
            start_time: None,
            seed,
            producer_count: None,
            producer_size: None,
            producer_ticks: None,
        })
        .unwrap()
    }

    #[test]
    fn same_seed_generates_identical_traces() {
        let mut a = RandomWorkloadGenerator::from_options(&options(Some(7))).unwrap();
        let mut b = RandomWorkloadGenerator::from_options(&options(Some(7))).unwrap();
        let tasks_a = a.generate_tasks().unwrap();
        let tasks_b = b.generate_tasks().unwrap();
        assert_eq!(tasks_a.len(), tasks_b.len());
        for (x, y) in tasks_a.iter().zip(tasks_b.iter()) {
            assert_eq!(x.submit, y.submit);
            assert_eq!(x.duration, y.duration);
            assert_eq!(x.memory, y.memory);
        }
    }

    #[test]
    fn generated_values_respect_configured_ranges() {
        let mut generator = RandomWorkloadGenerator::from_options(&options(None)).unwrap();
        let tasks = generator.generate_tasks().unwrap();
        assert_eq!(tasks.len(), 50);
        let mut last_submit = 0;
        for task in &tasks {
            assert!(task.duration >= 1);
            assert!(task.memory >= 0.1 && task.memory <= 0.5);
            assert!(task.submit >= last_submit);
            last_submit = task.submit;
        }
    }

    #[test]
    fn empty_demand_range_is_rejected() {
        let bad = |demand_min: f64, demand_max: f64| {
            serde_yaml::to_value(Options {
                request_count: 1,
                demand_min,
                demand_max,
                duration_mean: 20.,
                duration_dev: 5.,
                delay_min: 0,
                delay_max: 3,
                start_time: None,
                seed: None,
                producer_count: None,
                producer_size: None,
                producer_ticks: None,
            })
            .unwrap()
        };
        assert!(RandomWorkloadGenerator::from_options(&bad(0.6, 0.5)).is_err());
        assert!(RandomWorkloadGenerator::from_options(&bad(-0.1, 0.5)).is_err());
    }

    #[test]
    fn requests_bucket_by_arrival_tick() {
        let mut generator = RandomWorkloadGenerator::from_options(&options(Some(3))).unwrap();
        let requests = generator.generate_requests().unwrap();
        let total: usize = requests.values().map(|b| b.len()).sum();
        assert_eq!(total, 50);
        let arrivals: Vec<u64> = requests.keys().copied().collect();
        assert!(arrivals.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn fractional_producers_cover_the_request_horizon() {
        let mut generator = RandomWorkloadGenerator::from_options(&options(Some(11))).unwrap();
        let workload = generator.generate_fractional().unwrap();
        assert_eq!(workload.producers.len(), DEFAULT_PRODUCER_COUNT);
        let ticks = workload.producers[0].usage.len();
        for (arrival, bucket) in &workload.requests {
            for request in bucket {
                assert!(((arrival + request.duration) as usize) < ticks);
            }
        }
    }
}
