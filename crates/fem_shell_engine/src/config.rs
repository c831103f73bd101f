use std::time::Duration;

use serde::{Deserialize, Serialize};

/// External solver command line. The input path is appended as the last
/// argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub program: String,
    pub args: Vec<String>,
    /// How long one unit of work waits for solver output.
    pub poll_interval_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["PyFEM.py".to_string()],
            poll_interval_ms: 50,
        }
    }
}

impl SolverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// `None` makes job channels unbounded.
    pub channel_capacity: Option<usize>,
    /// Longest a capture waits for room before dropping a fragment.
    pub send_timeout_ms: u64,
    /// Longest shutdown waits for a running job after aborting it.
    pub shutdown_grace_ms: u64,
    /// Bind the process-wide diagnostic output to each job's sink.
    pub redirect_diagnostics: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: Some(1024),
            send_timeout_ms: 250,
            shutdown_grace_ms: 5_000,
            redirect_diagnostics: true,
        }
    }
}

impl RunnerConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
