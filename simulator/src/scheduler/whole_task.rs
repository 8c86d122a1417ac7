//! Whole-task greedy placement with bounded lookahead.

use crate::capacity::Timeline;
use crate::error::{SimError, SimResult};
use crate::scheduler::Placement;
use crate::workload::TaskRecord;

/// Places each task, whole, on the machine offering the earliest feasible
/// capacity window.
///
/// When no machine has a window starting at or after the probe time, the
/// probe jumps forward by `lookahead_step` and the scan repeats, up to
/// `max_lookahead_steps` jumps. A task that exhausts the budget is starved;
/// with a full-window feasibility check that only happens when the demand can
/// never fit, so the budget turns a hang into a diagnosable error.
pub struct WholeTaskScheduler {
    machines: Vec<Timeline>,
    lookahead_step: u64,
    max_lookahead_steps: u32,
}

impl WholeTaskScheduler {
    pub fn new(machines: Vec<Timeline>, lookahead_step: u64, max_lookahead_steps: u32) -> Self {
        Self {
            machines,
            lookahead_step,
            max_lookahead_steps,
        }
    }

    /// Builds a pool of `count` identical machines.
    pub fn homogeneous(
        count: usize,
        capacity: f64,
        seed_usage: f64,
        lookahead_step: u64,
        max_lookahead_steps: u32,
    ) -> Self {
        let machines = (0..count)
            .map(|_| Timeline::with_seed(capacity, seed_usage))
            .collect();
        Self::new(machines, lookahead_step, max_lookahead_steps)
    }

    pub fn machines(&self) -> &[Timeline] {
        &self.machines
    }

    /// Commits `task` to the machine with the earliest window at or after its
    /// submit time. Ties on start time go to the lowest machine id.
    pub fn place(&mut self, task: &TaskRecord) -> SimResult<Placement> {
        let mut from = task.submit;
        let mut attempts = 0u32;
        loop {
            let mut best: Option<(u64, usize)> = None;
            for (id, machine) in self.machines.iter().enumerate() {
                if let Some(start) = machine.find_window(task.memory, from, task.duration) {
                    if best.map_or(true, |(s, _)| start < s) {
                        best = Some((start, id));
                    }
                }
            }
            if let Some((start, id)) = best {
                self.machines[id].apply(task.memory, start, task.duration);
                return Ok(Placement {
                    task_id: task.id(),
                    machine_id: id as u64,
                    start_time: start,
                    wait_time: start - task.submit,
                });
            }
            if attempts >= self.max_lookahead_steps {
                return Err(SimError::SchedulingStarvation {
                    task_id: task.id(),
                    from_time: task.submit,
                    attempts,
                });
            }
            attempts += 1;
            from += self.lookahead_step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, submit: u64, duration: u64, memory: f64) -> TaskRecord {
        TaskRecord {
            j_id: id.to_string(),
            t_id: "0".to_string(),
            submit,
            duration,
            memory,
            priority: None,
        }
    }

    #[test]
    fn concurrent_tasks_spread_over_machines() {
        let mut scheduler = WholeTaskScheduler::homogeneous(2, 1., 0., 10, 0);
        let first = scheduler.place(&task("a", 0, 10, 0.6)).unwrap();
        let second = scheduler.place(&task("b", 0, 10, 0.6)).unwrap();
        assert_eq!(first.machine_id, 0);
        assert_eq!(first.start_time, 0);
        assert_eq!(second.machine_id, 1);
        assert_eq!(second.start_time, 0);
        assert_eq!(second.wait_time, 0);
    }

    #[test]
    fn saturated_machine_delays_the_next_task() {
        let mut scheduler = WholeTaskScheduler::homogeneous(1, 1., 0., 10, 0);
        scheduler.place(&task("a", 0, 10, 0.5)).unwrap();
        scheduler.place(&task("b", 0, 10, 0.5)).unwrap();
        let third = scheduler.place(&task("c", 0, 10, 0.5)).unwrap();
        // Both earlier tasks occupy [0, 10]; capacity frees at t=11.
        assert_eq!(third.start_time, 11);
        assert_eq!(third.wait_time, 11);
    }

    #[test]
    fn earliest_window_wins_across_machines() {
        let mut scheduler = WholeTaskScheduler::homogeneous(2, 1., 0., 10, 0);
        scheduler.place(&task("a", 0, 100, 0.9)).unwrap();
        scheduler.place(&task("b", 0, 10, 0.9)).unwrap();
        // Machine 0 is busy until t=101, machine 1 until t=11.
        let third = scheduler.place(&task("c", 0, 5, 0.5)).unwrap();
        assert_eq!(third.machine_id, 1);
        assert_eq!(third.start_time, 11);
    }

    #[test]
    fn impossible_demand_starves_after_the_budget() {
        let mut scheduler = WholeTaskScheduler::homogeneous(2, 1., 0., 10, 3);
        let err = scheduler.place(&task("a", 5, 10, 1.5)).unwrap_err();
        match err {
            SimError::SchedulingStarvation {
                task_id,
                from_time,
                attempts,
            } => {
                assert_eq!(task_id, "a/0");
                assert_eq!(from_time, 5);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn wait_time_counts_from_the_original_submit() {
        let mut scheduler = WholeTaskScheduler::homogeneous(1, 1., 0., 10, 0);
        scheduler.place(&task("a", 0, 20, 0.8)).unwrap();
        let second = scheduler.place(&task("b", 4, 5, 0.8)).unwrap();
        assert_eq!(second.start_time, 21);
        assert_eq!(second.wait_time, 17);
    }
}
