use std::fmt;
use std::path::PathBuf;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Aborted
        )
    }

    /// Whether `self -> next` is a legal transition.
    /// Statuses only move forward: Pending, Running, then one terminal state.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        match self {
            JobStatus::Pending => next == JobStatus::Running,
            JobStatus::Running => next.is_terminal(),
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Aborted => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Stdout,
    Stderr,
    /// Synthesized by the runner: fault descriptions, relay warnings.
    Runner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMessage {
    pub job_id: JobId,
    /// Starts at 0 for every job and increases by one per delivered message.
    pub seq: u64,
    pub origin: Origin,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Started { job_id: JobId, input: PathBuf },
    Output(OutputMessage),
    Finished { job_id: JobId, status: JobStatus },
    /// Always the last event of a job's channel.
    StreamClosed { job_id: JobId },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Started { job_id, .. }
            | JobEvent::Finished { job_id, .. }
            | JobEvent::StreamClosed { job_id } => *job_id,
            JobEvent::Output(message) => message.job_id,
        }
    }
}
