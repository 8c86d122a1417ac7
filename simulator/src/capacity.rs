//! Machine capacity model.
//!
//! Whole-task replay tracks each machine as a sparse [`Timeline`]: a sorted
//! list of `(time, usage)` breakpoints interpreted as a right-continuous step
//! function. Usage at a query time is the usage of the latest breakpoint at or
//! before it. Fractional replay tracks each producer as a dense per-tick
//! [`UsageSeries`] loaded from a trace.

use serde::Serialize;

/// Default normalized machine capacity for whole-task replay.
pub const DEFAULT_CAPACITY: f64 = 1.0;

/// One point of a machine usage step function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breakpoint {
    pub time: u64,
    pub usage: f64,
}

/// Sparse usage timeline of a single machine.
///
/// Breakpoints are kept sorted with strictly increasing times. The first
/// breakpoint is created at time 0 with the seed usage, so `usage_at` is
/// total on `[0, u64::MAX]`.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    capacity: f64,
    points: Vec<Breakpoint>,
}

impl Timeline {
    pub fn new(capacity: f64) -> Self {
        Self::with_seed(capacity, 0.)
    }

    pub fn with_seed(capacity: f64, seed_usage: f64) -> Self {
        Self {
            capacity,
            points: vec![Breakpoint {
                time: 0,
                usage: seed_usage,
            }],
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.points
    }

    /// Usage in effect at `time`: the usage of the latest breakpoint with
    /// `point.time <= time`.
    pub fn usage_at(&self, time: u64) -> f64 {
        match self.points.partition_point(|p| p.time <= time) {
            0 => 0.,
            idx => self.points[idx - 1].usage,
        }
    }

    /// Earliest start `s >= from` such that `usage(t) + demand <= capacity`
    /// holds for every `t` in `[s, s + duration]`.
    ///
    /// Candidate starts are `from` itself plus every breakpoint after it; the
    /// step function cannot change between breakpoints, so no other start can
    /// be the earliest feasible one. Returns `None` when even the constant
    /// tail past the last breakpoint cannot host the demand.
    pub fn find_window(&self, demand: f64, from: u64, duration: u64) -> Option<u64> {
        if self.window_fits(demand, from, duration) {
            return Some(from);
        }
        let next = self.points.partition_point(|p| p.time <= from);
        for point in &self.points[next..] {
            if self.window_fits(demand, point.time, duration) {
                return Some(point.time);
            }
        }
        None
    }

    /// Raises usage by `demand` over the closed interval
    /// `[start, start + duration]`.
    ///
    /// A breakpoint is materialized at `start` (inheriting the usage in effect
    /// there) before the raise, and one at `start + duration + 1` that keeps
    /// its inherited pre-raise usage, so usage past the interval is untouched.
    pub fn apply(&mut self, demand: f64, start: u64, duration: u64) {
        let end = start + duration;
        self.ensure_breakpoint(start);
        self.ensure_breakpoint(end + 1);
        let lo = self.points.partition_point(|p| p.time < start);
        let hi = self.points.partition_point(|p| p.time <= end);
        for point in &mut self.points[lo..hi] {
            point.usage += demand;
        }
    }

    fn window_fits(&self, demand: f64, start: u64, duration: u64) -> bool {
        let end = start + duration;
        if self.usage_at(start) + demand > self.capacity {
            return false;
        }
        let lo = self.points.partition_point(|p| p.time <= start);
        let hi = self.points.partition_point(|p| p.time <= end);
        self.points[lo..hi]
            .iter()
            .all(|p| p.usage + demand <= self.capacity)
    }

    fn ensure_breakpoint(&mut self, time: u64) {
        if let Err(idx) = self.points.binary_search_by_key(&time, |p| p.time) {
            let usage = if idx == 0 {
                0.
            } else {
                self.points[idx - 1].usage
            };
            self.points.insert(idx, Breakpoint { time, usage });
        }
    }
}

/// Dense per-tick usage of a single producer machine, in absolute units.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSeries {
    capacity: f64,
    ticks: Vec<f64>,
}

impl UsageSeries {
    pub fn new(capacity: f64, ticks: Vec<f64>) -> Self {
        Self { capacity, ticks }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn usage(&self, tick: usize) -> f64 {
        self.ticks[tick]
    }

    /// Checks that `demand` fits under capacity on every tick of
    /// `[tick, tick + duration)` and returns the smallest free headroom
    /// observed over the window. Windows reaching past the end of the series
    /// never fit.
    pub fn fits_window(&self, tick: usize, duration: usize, demand: f64) -> Option<f64> {
        let end = tick + duration;
        if end > self.ticks.len() {
            return None;
        }
        let mut min_free = f64::INFINITY;
        for &usage in &self.ticks[tick..end] {
            let free = self.capacity - usage;
            if free < demand {
                return None;
            }
            min_free = min_free.min(free);
        }
        Some(min_free)
    }

    /// Raises usage by `demand` on every tick of `[tick, tick + duration)`.
    pub fn apply(&mut self, tick: usize, duration: usize, demand: f64) {
        for usage in &mut self.ticks[tick..tick + duration] {
            *usage += demand;
        }
    }
}
