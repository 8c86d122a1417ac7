//! Reader for whole-task traces.

use std::fs::File;
use std::io::BufReader;

use serde::Deserialize;

use crate::error::{SimError, SimResult};
use crate::workload::records::TaskRecord;

/// Loads placement tasks from a JSON trace file.
///
/// The trace is an array of task objects. Entries that fail to decode are
/// skipped with a warning instead of aborting the whole load.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskTraceReader {
    pub path: String,
    #[serde(default)]
    pub task_limit: Option<usize>,
}

impl TaskTraceReader {
    pub fn from_options(options: &serde_yaml::Value) -> SimResult<Self> {
        serde_yaml::from_value(options.clone())
            .map_err(|e| SimError::InvalidConfig(format!("task trace options: {}", e)))
    }

    /// Reads, validates and sorts the trace by submit time.
    pub fn read_tasks(&self) -> SimResult<Vec<TaskRecord>> {
        let file = File::open(&self.path).map_err(|e| SimError::missing_input(&self.path, e))?;
        let raw: Vec<serde_json::Value> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SimError::malformed_record(&self.path, e))?;

        let mut skipped = 0u64;
        let mut tasks = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<TaskRecord>(value) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    skipped += 1;
                    log::warn!("skipping malformed task in {}: {}", self.path, e);
                }
            }
        }
        if skipped > 0 {
            log::warn!("skipped {} malformed tasks in {}", skipped, self.path);
        }

        tasks.sort_by(|a, b| a.submit.cmp(&b.submit));
        if let Some(limit) = self.task_limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }
}
