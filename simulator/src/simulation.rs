//! Replay drivers wiring workload, scheduler, metrics and reports together.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::config::sim_config::SimulationConfig;
use crate::error::{SimError, SimResult};
use crate::metrics::{percent_assigned, percentile, MetricsCollector};
use crate::reports;
use crate::scheduler::{
    FractionalScheduler, PendingRequest, Placement, WholeTaskScheduler,
};
use crate::workload::{self, FractionalWorkload, RequestRecord, TaskRecord};

const DEFAULT_TASK_PROGRESS_INTERVAL: u64 = 10_000;
const DEFAULT_REQUEST_PROGRESS_INTERVAL: u64 = 1_000;

/// Summary of a whole-task replay.
#[derive(Debug, Clone, Serialize)]
pub struct WholeTaskReport {
    pub processed: u64,
    pub average_wait: f64,
    pub wait_p95: u64,
    pub wait_p99: u64,
}

/// Replays a task trace through the whole-task greedy scheduler.
pub struct WholeTaskSimulation {
    config: SimulationConfig,
    tasks: Vec<TaskRecord>,
    scheduler: WholeTaskScheduler,
    metrics: MetricsCollector,
    placements: Vec<Placement>,
}

impl WholeTaskSimulation {
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        let tasks = workload::resolve_tasks(&config.workload)?;
        let machines = config.machines.as_ref().ok_or_else(|| {
            SimError::InvalidConfig("whole-task replay needs a machines section".to_string())
        })?;
        if machines.count == 0 {
            return Err(SimError::InvalidConfig(
                "machine count must be at least 1".to_string(),
            ));
        }
        let scheduler = WholeTaskScheduler::homogeneous(
            machines.count,
            machines.get_capacity(),
            machines.get_seed_usage(),
            config.scheduler.get_lookahead_step(),
            config.scheduler.get_max_lookahead_steps(),
        );
        let metrics = MetricsCollector::new(
            config
                .metrics
                .progress_interval
                .unwrap_or(DEFAULT_TASK_PROGRESS_INTERVAL),
        );
        Ok(Self {
            config,
            tasks,
            scheduler,
            metrics,
            placements: Vec::new(),
        })
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn get_output_dir(&self) -> Option<String> {
        self.config.get_output_dir()
    }

    pub fn run(&mut self) -> SimResult<WholeTaskReport> {
        let t = Instant::now();
        println!("Simulation Started");

        for idx in 0..self.tasks.len() {
            let placement = self.scheduler.place(&self.tasks[idx])?;
            self.metrics.record_wait(placement.wait_time);
            self.placements.push(placement);
            self.metrics.note_task_processed();
        }

        let elapsed = t.elapsed();
        println!("SIMULATION FINISHED IN: {:?}s", elapsed.as_secs_f64());
        println!("Processed tasks: {}", self.metrics.processed());
        println!(
            "Placement rate: {}/s",
            (self.metrics.processed() as f64 / elapsed.as_secs_f64()) as u64
        );

        let sorted = self.metrics.sorted_wait_times();
        let report = WholeTaskReport {
            processed: self.metrics.processed(),
            average_wait: self.metrics.average_wait(),
            wait_p95: if sorted.is_empty() {
                0
            } else {
                percentile(&sorted, 95)
            },
            wait_p99: if sorted.is_empty() {
                0
            } else {
                percentile(&sorted, 99)
            },
        };
        println!(
            "Average wait time: {:.2}, p95: {}, p99: {}",
            report.average_wait, report.wait_p95, report.wait_p99
        );

        if let Some(dir) = self.config.get_output_dir() {
            self.write_reports(Path::new(&dir), &sorted)?;
        }
        Ok(report)
    }

    fn write_reports(&self, dir: &Path, sorted_waits: &[u64]) -> SimResult<()> {
        fs::create_dir_all(dir).map_err(|e| SimError::report(&dir.to_string_lossy(), e))?;
        reports::write_wait_time_distribution(
            &dir.join(reports::WAIT_TIME_DIST_FILENAME),
            sorted_waits,
        )?;
        let durations: Vec<u64> = self.tasks.iter().map(|t| t.duration).collect();
        reports::write_duration_histogram(
            &dir.join(reports::DURATION_DIST_FILENAME),
            &durations,
            reports::DURATION_BUCKET_WIDTH,
        )?;
        reports::write_machine_ranking(
            &dir.join(reports::MACHINE_RANK_FILENAME),
            &self.machine_ranking(),
        )
    }

    /// Machines ranked by hosted tasks, busiest first.
    fn machine_ranking(&self) -> Vec<(String, u64)> {
        let mut counts = vec![0u64; self.scheduler.machines().len()];
        for placement in &self.placements {
            counts[placement.machine_id as usize] += 1;
        }
        let mut ranking: Vec<(usize, u64)> = counts.into_iter().enumerate().collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranking
            .into_iter()
            .map(|(id, count)| (id.to_string(), count))
            .collect()
    }
}

/// Summary of a fractional replay.
#[derive(Debug, Clone, Serialize)]
pub struct FractionalReport {
    pub submitted: u64,
    pub fully_placed: u64,
    pub unassigned: u64,
    pub percent_assigned: f64,
}

/// Replays a splittable request trace against producer capacity, tick by
/// tick, until the trace horizon.
pub struct FractionalSimulation {
    config: SimulationConfig,
    requests: BTreeMap<u64, Vec<RequestRecord>>,
    scheduler: FractionalScheduler,
    metrics: MetricsCollector,
    unassigned: Vec<PendingRequest>,
}

impl FractionalSimulation {
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        let FractionalWorkload {
            requests,
            producers,
            producer_size,
        } = workload::resolve_fractional(&config.workload)?;
        let scheduler = FractionalScheduler::new(
            config.scheduler.get_split_factor()?,
            producers,
            producer_size,
        )?;
        let metrics = MetricsCollector::new(
            config
                .metrics
                .progress_interval
                .unwrap_or(DEFAULT_REQUEST_PROGRESS_INTERVAL),
        );
        Ok(Self {
            config,
            requests,
            scheduler,
            metrics,
            unassigned: Vec::new(),
        })
    }

    pub fn unassigned(&self) -> &[PendingRequest] {
        &self.unassigned
    }

    pub fn scheduler(&self) -> &FractionalScheduler {
        &self.scheduler
    }

    pub fn get_output_dir(&self) -> Option<String> {
        self.config.get_output_dir()
    }

    /// Ticks past the end of every producer series count as past the
    /// horizon, but arrivals beyond it are still submitted so they show up
    /// in the unassigned tally.
    fn last_tick(&self) -> u64 {
        let last_arrival = self
            .requests
            .keys()
            .next_back()
            .map(|arrival| arrival + 1)
            .unwrap_or(0);
        self.scheduler.horizon().max(last_arrival)
    }

    pub fn run(&mut self) -> SimResult<FractionalReport> {
        let t = Instant::now();
        println!("Simulation Started");

        let last_tick = self.last_tick();
        for tick in 0..last_tick {
            if let Some(bucket) = self.requests.get(&tick) {
                for request in bucket {
                    self.scheduler.submit(request, tick);
                }
            }
            self.scheduler.run_tick(tick);
            self.metrics
                .note_assignment_progress(self.scheduler.submitted(), self.scheduler.pending());
        }
        self.unassigned = self.scheduler.drain_unassigned();

        let elapsed = t.elapsed();
        let report = FractionalReport {
            submitted: self.scheduler.submitted(),
            fully_placed: self.scheduler.fully_placed(),
            unassigned: self.unassigned.len() as u64,
            percent_assigned: percent_assigned(self.scheduler.submitted(), self.unassigned.len()),
        };
        println!("SIMULATION FINISHED IN: {:?}s", elapsed.as_secs_f64());
        println!(
            "out of {} requests, {} requests could not be assigned, {:.2}% was assigned",
            report.submitted, report.unassigned, report.percent_assigned
        );

        if let Some(dir) = self.config.get_output_dir() {
            self.write_reports(Path::new(&dir))?;
        }
        Ok(report)
    }

    fn write_reports(&self, dir: &Path) -> SimResult<()> {
        fs::create_dir_all(dir).map_err(|e| SimError::report(&dir.to_string_lossy(), e))?;
        reports::write_memory_duration_cdf(
            &dir.join(reports::MEMORY_DURATION_DIST_FILENAME),
            &self.requests,
        )?;
        reports::write_arrival_distribution(
            &dir.join(reports::ARRIVAL_DIST_FILENAME),
            &self.requests,
        )?;
        reports::write_machine_ranking(
            &dir.join(reports::MACHINE_RANK_FILENAME),
            &self.scheduler.placement_ranking(),
        )
    }
}
