//! Simulator error types.

use thiserror::Error;

/// Errors surfaced by trace loading, configuration and replay.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("missing input file {path}: {source}")]
    MissingInput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path}: {reason}")]
    MalformedRecord { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "scheduling starvation for task {task_id}: no capacity window within \
         {attempts} lookahead steps from t={from_time}"
    )]
    SchedulingStarvation {
        task_id: String,
        from_time: u64,
        attempts: u32,
    },

    #[error("failed to write report {path}: {reason}")]
    Report { path: String, reason: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub fn missing_input(path: &str, source: std::io::Error) -> Self {
        SimError::MissingInput {
            path: path.to_string(),
            source,
        }
    }

    pub fn malformed_record(path: &str, reason: impl ToString) -> Self {
        SimError::MalformedRecord {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn report(path: &str, reason: impl ToString) -> Self {
        SimError::Report {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
