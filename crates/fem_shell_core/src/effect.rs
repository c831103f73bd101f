use std::path::PathBuf;

/// Work the platform layer performs on behalf of [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start a solver job against `input`.
    StartJob { input: PathBuf },
    /// Ask the running job to stop at its next safe point.
    AbortJob { job_id: crate::JobId },
    /// Write the rendered log to `path`.
    SaveLog { path: PathBuf, contents: String },
}
