use std::path::PathBuf;

use crate::{JobId, JobStatus, LogLine};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub input: Option<PathBuf>,
    pub job: Option<JobView>,
    pub start_pending: bool,
    pub lines: Vec<LogLine>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub stream_closed: bool,
}
