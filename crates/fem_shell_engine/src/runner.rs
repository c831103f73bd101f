//! Runs one computation at a time on a background thread.
//!
//! The job thread drives the computation unit by unit, checking the job's
//! cancellation token between units, and always finishes with the same
//! teardown: release the diagnostic redirection, flush the sink, publish the
//! terminal status, then send `Finished` and `StreamClosed`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use shell_logging::{shell_debug, shell_error, shell_info, shell_warn};
use thiserror::Error;

use crate::channel::{message_channel, EventReceiver, EventSender};
use crate::{
    CancellationToken, ComputationError, ComputationFactory, JobContext, JobEvent, JobId,
    JobStatus, OutputSink, RedirectionBinding, RunnerConfig, Step,
};

#[derive(Debug, Error)]
pub enum StartError {
    #[error("no input file loaded")]
    InvalidInput,
    #[error("job {0} is still running")]
    JobAlreadyRunning(JobId),
    #[error("failed to spawn job thread: {0}")]
    Spawn(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("job {0} is not the current job")]
    UnknownJob(JobId),
    #[error("job {0} already has a subscriber")]
    AlreadySubscribed(JobId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShutdownError {
    #[error("job {job_id} did not stop within {grace:?}")]
    GraceExpired { job_id: JobId, grace: Duration },
}

/// Shared view of one job. Only the job thread changes its status.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    input: Arc<PathBuf>,
    status: Arc<Mutex<JobStatus>>,
    cancel: CancellationToken,
}

impl JobHandle {
    fn new(id: JobId, input: PathBuf) -> Self {
        Self {
            id,
            input: Arc::new(input),
            status: Arc::new(Mutex::new(JobStatus::Pending)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn status(&self) -> JobStatus {
        *self.lock_status()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Records a cancellation request. A no-op once the job is terminal.
    pub fn abort(&self) {
        if self.is_finished() {
            shell_debug!("abort for finished job {} ignored", self.id);
            return;
        }
        self.cancel.cancel();
    }

    pub fn abort_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn advance(&self, next: JobStatus) -> bool {
        let mut status = self.lock_status();
        if status.can_advance_to(next) {
            *status = next;
            true
        } else {
            shell_warn!("job {} refused transition {} -> {}", self.id, *status, next);
            false
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, JobStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct ActiveJob {
    handle: JobHandle,
    receiver: Option<EventReceiver>,
    thread: Option<JoinHandle<()>>,
    done_rx: mpsc::Receiver<()>,
}

impl ActiveJob {
    /// Waits until the job thread has exited, then joins it.
    fn wait_until(&mut self, deadline: Instant) -> bool {
        if self.thread.is_none() {
            return true;
        }
        let timeout = deadline.saturating_duration_since(Instant::now());
        match self.done_rx.recv_timeout(timeout) {
            // A disconnect means the thread is gone without signalling.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                shell_error!("job {} thread panicked during teardown", self.handle.id());
            }
        }
    }
}

pub struct JobRunner {
    factory: Arc<dyn ComputationFactory>,
    config: RunnerConfig,
    next_id: JobId,
    current: Option<ActiveJob>,
    // Jobs whose threads outlived a shutdown grace period.
    retired: Vec<ActiveJob>,
}

impl JobRunner {
    pub fn new(factory: Arc<dyn ComputationFactory>, config: RunnerConfig) -> Self {
        Self {
            factory,
            config,
            next_id: 1,
            current: None,
            retired: Vec::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// The most recently started job, running or not.
    pub fn current(&self) -> Option<&JobHandle> {
        self.current.as_ref().map(|active| &active.handle)
    }

    pub fn is_running(&self) -> bool {
        self.current().is_some_and(|job| !job.is_finished())
    }

    /// Starts a job for `input` and returns immediately.
    ///
    /// The job's channel already holds `Started` when this returns; take it
    /// with [`JobRunner::subscribe`] right away, since a full bounded channel
    /// without a consumer makes the job drop its output. If the previous job
    /// is finished but its thread is still delivering its last events, this
    /// waits for that thread first.
    pub fn start(&mut self, input: &Path) -> Result<JobHandle, StartError> {
        if input.as_os_str().is_empty() {
            return Err(StartError::InvalidInput);
        }
        if let Some(job) = self.current() {
            if !job.is_finished() {
                return Err(StartError::JobAlreadyRunning(job.id()));
            }
        }
        self.wait_for_previous()?;

        let id = self.next_id;
        self.next_id += 1;
        let handle = JobHandle::new(id, input.to_path_buf());
        let (tx, receiver) = message_channel(self.config.channel_capacity);
        let sink = OutputSink::new(id, tx.clone(), self.config.send_timeout());

        // Fresh channel with room for at least one event: cannot block.
        let _ = tx.send(JobEvent::Started {
            job_id: id,
            input: input.to_path_buf(),
        });
        handle.advance(JobStatus::Running);

        let binding = if self.config.redirect_diagnostics {
            match RedirectionBinding::bind(sink.clone()) {
                Ok(binding) => Some(binding),
                Err(err) => {
                    shell_warn!("job {id}: {err}");
                    sink.notice(&format!("diagnostic output is not captured: {err}"));
                    None
                }
            }
        } else {
            None
        };

        let (done_tx, done_rx) = mpsc::channel();
        let job = handle.clone();
        let factory = Arc::clone(&self.factory);
        let spawned = thread::Builder::new()
            .name(format!("fem-job-{id}"))
            .spawn(move || run_job(job, factory, sink, tx, binding, done_tx));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                // The closure (and with it the binding) was dropped by spawn.
                handle.advance(JobStatus::Failed);
                shell_error!("could not spawn thread for job {id}: {err}");
                return Err(StartError::Spawn(err.to_string()));
            }
        };

        shell_info!("started job {id} for {}", input.display());
        self.current = Some(ActiveJob {
            handle: handle.clone(),
            receiver: Some(receiver),
            thread: Some(thread),
            done_rx,
        });
        Ok(handle)
    }

    /// Registers the sole consumer of a job's events.
    pub fn subscribe(&mut self, job_id: JobId) -> Result<EventReceiver, SubscribeError> {
        let active = self
            .current
            .as_mut()
            .filter(|active| active.handle.id() == job_id)
            .ok_or(SubscribeError::UnknownJob(job_id))?;
        active
            .receiver
            .take()
            .ok_or(SubscribeError::AlreadySubscribed(job_id))
    }

    /// Asks the current job to stop at its next safe point. A no-op when
    /// nothing is running.
    pub fn abort(&self) {
        if let Some(job) = self.current() {
            job.abort();
        }
    }

    /// Like [`JobRunner::abort`], but only if `job_id` is the current job.
    pub fn abort_job(&self, job_id: JobId) {
        match self.current() {
            Some(job) if job.id() == job_id => job.abort(),
            _ => shell_debug!("abort for unknown job {job_id} ignored"),
        }
    }

    /// Aborts any running job and waits up to `grace` for every job thread
    /// to exit.
    pub fn shutdown(&mut self, grace: Duration) -> Result<(), ShutdownError> {
        self.abort();
        let deadline = Instant::now() + grace;

        let mut pending = std::mem::take(&mut self.retired);
        pending.extend(self.current.take());
        for active in &mut pending {
            // Nobody will read an unclaimed channel; let sends fail fast.
            active.receiver = None;
        }

        let mut stuck = None;
        for mut active in pending {
            if !active.wait_until(deadline) {
                shell_error!(
                    "job {} still running after {:?}",
                    active.handle.id(),
                    grace
                );
                stuck.get_or_insert(active.handle.id());
                self.retired.push(active);
            }
        }

        match stuck {
            Some(job_id) => Err(ShutdownError::GraceExpired { job_id, grace }),
            None => Ok(()),
        }
    }

    /// Waits up to the shutdown grace for earlier job threads to exit, so at
    /// most one job thread is ever alive. A finished job may still be sending
    /// its final markers; an unclaimed channel is dropped so they cannot block.
    fn wait_for_previous(&mut self) -> Result<(), StartError> {
        let deadline = Instant::now() + self.config.shutdown_grace();
        for active in self.retired.iter_mut().chain(self.current.as_mut()) {
            active.receiver = None;
            if !active.wait_until(deadline) {
                shell_warn!("job {} has not exited yet", active.handle.id());
                return Err(StartError::JobAlreadyRunning(active.handle.id()));
            }
        }
        self.retired.clear();
        Ok(())
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown(self.config.shutdown_grace()) {
            shell_error!("job runner dropped with a live job: {err}");
        }
    }
}

fn run_job(
    job: JobHandle,
    factory: Arc<dyn ComputationFactory>,
    sink: OutputSink,
    tx: EventSender,
    mut binding: Option<RedirectionBinding>,
    done_tx: mpsc::Sender<()>,
) {
    shell_logging::set_job_context(Some(job.id()));
    let status = drive(&job, factory.as_ref(), &sink);

    if let Some(binding) = binding.as_mut() {
        binding.unbind();
    }
    sink.close();
    let dropped = sink.dropped();
    if dropped > 0 {
        shell_warn!("{dropped} output fragment(s) were dropped");
    }

    job.advance(status);
    let _ = tx.send(JobEvent::Finished {
        job_id: job.id(),
        status,
    });
    let _ = tx.send(JobEvent::StreamClosed { job_id: job.id() });
    shell_info!("job {status}");

    let _ = done_tx.send(());
    shell_logging::set_job_context(None);
}

/// Runs the computation loop and its teardown; returns the terminal status.
fn drive(job: &JobHandle, factory: &dyn ComputationFactory, sink: &OutputSink) -> JobStatus {
    let ctx = JobContext {
        job_id: job.id(),
        input: job.input(),
        sink,
        cancel: &job.cancel,
    };

    let created = panic::catch_unwind(AssertUnwindSafe(|| factory.create(job.input())));
    let mut computation = match settle(created) {
        Ok(computation) => computation,
        Err(fault) => {
            report_fault(sink, &fault);
            return JobStatus::Failed;
        }
    };

    let mut status = loop {
        if job.cancel.is_cancelled() {
            break JobStatus::Aborted;
        }
        let stepped = panic::catch_unwind(AssertUnwindSafe(|| computation.step(&ctx)));
        match settle(stepped) {
            Ok(Step::Continue) => {}
            Ok(Step::Done) => break JobStatus::Succeeded,
            Err(fault) => {
                report_fault(sink, &fault);
                break JobStatus::Failed;
            }
        }
    };

    let finished = panic::catch_unwind(AssertUnwindSafe(|| computation.finish(&ctx)));
    if let Err(fault) = settle(finished) {
        report_fault(sink, &format!("during teardown: {fault}"));
        if status == JobStatus::Succeeded {
            status = JobStatus::Failed;
        }
    }
    if panic::catch_unwind(AssertUnwindSafe(move || drop(computation))).is_err() {
        shell_error!("computation panicked while being dropped");
    }

    if status == JobStatus::Aborted {
        sink.notice("job aborted");
    }
    status
}

fn settle<T>(result: thread::Result<Result<T, ComputationError>>) -> Result<T, String> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn report_fault(sink: &OutputSink, fault: &str) {
    shell_error!("computation fault: {fault}");
    sink.notice(&format!("computation fault: {fault}"));
}
