//! Replay metrics: wait time samples, percentiles and progress logging.

/// Nearest-rank percentile of an ascending sorted slice.
///
/// Returns the element at `floor(n * p / 100) - 1`, clamped to the first
/// element, for `p` in `1..=100`. The result is always an element actually
/// present in the slice.
pub fn percentile<T: Copy>(sorted: &[T], p: u8) -> T {
    debug_assert!((1..=100).contains(&p));
    let idx = (sorted.len() * p as usize) / 100;
    sorted[idx.saturating_sub(1)]
}

/// Share of submitted requests no longer pending, in percent.
pub fn percent_assigned(submitted: u64, pending: usize) -> f64 {
    if submitted == 0 {
        return 100.;
    }
    100. - (pending as f64 * 100.) / submitted as f64
}

/// Collects per-task wait times and emits progress lines at a configured
/// cadence.
pub struct MetricsCollector {
    wait_times: Vec<u64>,
    total_wait: u128,
    processed: u64,
    progress_interval: u64,
    next_progress: u64,
}

impl MetricsCollector {
    pub fn new(progress_interval: u64) -> Self {
        Self {
            wait_times: Vec::new(),
            total_wait: 0,
            processed: 0,
            progress_interval,
            next_progress: progress_interval,
        }
    }

    pub fn record_wait(&mut self, wait: u64) {
        self.total_wait += wait as u128;
        self.wait_times.push(wait);
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn wait_times(&self) -> &[u64] {
        &self.wait_times
    }

    pub fn sorted_wait_times(&self) -> Vec<u64> {
        let mut sorted = self.wait_times.clone();
        sorted.sort_unstable();
        sorted
    }

    pub fn average_wait(&self) -> f64 {
        if self.wait_times.is_empty() {
            return 0.;
        }
        self.total_wait as f64 / self.wait_times.len() as f64
    }

    /// Counts one placed task; every `progress_interval` tasks logs the
    /// running average and tail wait times.
    pub fn note_task_processed(&mut self) {
        self.processed += 1;
        if self.progress_interval > 0 && self.processed % self.progress_interval == 0 {
            let sorted = self.sorted_wait_times();
            log::info!(
                "placed {} tasks, avg wait {:.2}, p95 {}, p99 {}",
                self.processed,
                self.average_wait(),
                percentile(&sorted, 95),
                percentile(&sorted, 99),
            );
        }
    }

    /// Logs assignment progress once the submitted count crosses the next
    /// cadence threshold.
    pub fn note_assignment_progress(&mut self, submitted: u64, pending: usize) {
        if self.progress_interval > 0 && submitted > self.next_progress {
            self.next_progress += self.progress_interval;
            log::info!(
                "out of {} requests, {} not assigned yet, {:.2}% assigned",
                submitted,
                pending,
                percent_assigned(submitted, pending),
            );
        }
    }
}
