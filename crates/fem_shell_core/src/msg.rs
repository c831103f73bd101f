use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User picked an input file.
    InputLoaded(PathBuf),
    /// User clicked Execute.
    ExecuteRequested,
    /// User clicked Abort.
    AbortRequested,
    /// User asked to save the log to a file.
    SaveLogRequested(PathBuf),
    /// User asked for a summary of the loaded input and current job.
    StatusRequested,
    /// Free-form line from the shell itself (command hints, save results).
    Notice(String),
    /// The job runner accepted a start request.
    JobAccepted { job_id: crate::JobId },
    /// The job runner refused a start request.
    JobRejected { reason: String },
    /// Engine lifecycle: the job's thread is running.
    JobStarted { job_id: crate::JobId },
    /// Engine output fragment for a job.
    JobOutput {
        job_id: crate::JobId,
        seq: u64,
        origin: crate::Origin,
        text: String,
    },
    /// Engine lifecycle: the job reached a terminal status.
    JobFinished {
        job_id: crate::JobId,
        status: crate::JobStatus,
    },
    /// Engine lifecycle: no further messages for the job.
    StreamClosed { job_id: crate::JobId },
    /// Idle tick from the event loop.
    Tick,
}
