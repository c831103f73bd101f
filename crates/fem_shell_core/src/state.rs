use std::fmt;
use std::path::{Path, PathBuf};

use crate::lines::{LineAssembler, LogLine, Origin};
use crate::view_model::{AppViewModel, JobView};

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

/// The viewer's knowledge of the current job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrackedJob {
    pub(crate) job_id: JobId,
    pub(crate) status: JobStatus,
    pub(crate) last_seq: Option<u64>,
    pub(crate) stream_closed: bool,
    pub(crate) abort_requested: bool,
}

impl TrackedJob {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Running,
            last_seq: None,
            stream_closed: false,
            abort_requested: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    input: Option<PathBuf>,
    job: Option<TrackedJob>,
    start_pending: bool,
    lines: Vec<LogLine>,
    assembler: LineAssembler,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            input: self.input.clone(),
            job: self.job.as_ref().map(|job| JobView {
                job_id: job.job_id,
                status: job.status,
                stream_closed: job.stream_closed,
            }),
            start_pending: self.start_pending,
            lines: self.lines.clone(),
            dirty: self.dirty,
        }
    }

    /// Appended lines; never reordered or removed.
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// True while a job is running or a start request is in flight.
    pub fn is_busy(&self) -> bool {
        self.start_pending
            || self
                .job
                .as_ref()
                .is_some_and(|job| !job.status.is_terminal())
    }

    /// Rendered log text, one display line per line.
    pub fn log_text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(&line.display());
            text.push('\n');
        }
        text
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_input(&mut self, input: PathBuf) {
        self.input = Some(input);
        self.mark_dirty();
    }

    /// Appends a whole line after any unfinished job output.
    pub(crate) fn push_line(&mut self, line: LogLine) {
        let tails = self.assembler.flush();
        self.lines.extend(tails);
        self.lines.push(line);
        self.mark_dirty();
    }

    pub(crate) fn notice(&mut self, text: impl Into<String>) {
        self.push_line(LogLine::runner(text));
    }

    pub(crate) fn set_start_pending(&mut self, pending: bool) {
        self.start_pending = pending;
        self.mark_dirty();
    }

    pub(crate) fn job(&self) -> Option<&TrackedJob> {
        self.job.as_ref()
    }

    /// The tracked job if `job_id` is the current one.
    pub(crate) fn current_job_mut(&mut self, job_id: JobId) -> Option<&mut TrackedJob> {
        self.job.as_mut().filter(|job| job.job_id == job_id)
    }

    pub(crate) fn track_job(&mut self, job_id: JobId) {
        self.job = Some(TrackedJob::new(job_id));
        self.assembler = LineAssembler::new();
        self.start_pending = false;
        self.mark_dirty();
    }

    pub(crate) fn append_fragment(&mut self, origin: Origin, text: &str) {
        let completed = self.assembler.push(origin, text);
        if !completed.is_empty() {
            self.lines.extend(completed);
            self.mark_dirty();
        }
    }

    pub(crate) fn flush_fragments(&mut self) {
        let tails = self.assembler.flush();
        if !tails.is_empty() {
            self.lines.extend(tails);
            self.mark_dirty();
        }
    }
}
