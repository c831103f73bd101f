use std::path::Path;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use fem_shell_core::{Effect, JobId, Msg, INPUT_REQUIRED_NOTICE};
use fem_shell_engine::{
    write_atomically, EventReceiver, JobEvent, JobRunner, ShutdownError, StartError,
};
use shell_logging::{shell_debug, shell_error, shell_info, shell_warn};

use super::app::ShellEvent;

/// Carries out viewer effects against the job runner and the filesystem.
pub(crate) struct EffectRunner {
    runner: JobRunner,
    events_tx: mpsc::Sender<ShellEvent>,
    relays: Vec<JoinHandle<()>>,
}

impl EffectRunner {
    pub(crate) fn new(runner: JobRunner, events_tx: mpsc::Sender<ShellEvent>) -> Self {
        Self {
            runner,
            events_tx,
            relays: Vec::new(),
        }
    }

    /// Runs one effect; immediate outcomes come back as messages, job events
    /// arrive later through the event channel.
    pub(crate) fn run(&mut self, effect: Effect) -> Vec<Msg> {
        match effect {
            Effect::StartJob { input } => self.start_job(&input),
            Effect::AbortJob { job_id } => {
                shell_info!("Abort requested for job {}", job_id);
                self.runner.abort_job(job_id);
                Vec::new()
            }
            Effect::SaveLog { path, contents } => vec![save_log(&path, &contents)],
        }
    }

    fn start_job(&mut self, input: &Path) -> Vec<Msg> {
        self.reap_relays();
        let handle = match self.runner.start(input) {
            Ok(handle) => handle,
            Err(StartError::InvalidInput) => {
                return vec![Msg::JobRejected {
                    reason: INPUT_REQUIRED_NOTICE.to_string(),
                }];
            }
            Err(err) => {
                shell_warn!("Could not start job for {:?}: {}", input, err);
                return vec![Msg::JobRejected {
                    reason: format!("Could not start the solver: {err}"),
                }];
            }
        };

        self.follow(handle.id())
    }

    /// Relays the job's events to the viewer. A job whose events cannot reach
    /// the viewer is aborted and reported as rejected.
    fn follow(&mut self, job_id: JobId) -> Vec<Msg> {
        let followed = self
            .runner
            .subscribe(job_id)
            .map_err(|err| err.to_string())
            .and_then(|receiver| {
                self.spawn_relay(job_id, receiver)
                    .map_err(|err| err.to_string())
            });
        match followed {
            Ok(relay) => {
                self.relays.push(relay);
                vec![Msg::JobAccepted { job_id }]
            }
            Err(err) => {
                shell_error!("Cannot follow job {}: {}", job_id, err);
                self.runner.abort_job(job_id);
                vec![Msg::JobRejected {
                    reason: format!("Could not follow the solver's output: {err}"),
                }]
            }
        }
    }

    /// Forwards a job's events into the viewer loop until its stream closes.
    fn spawn_relay(
        &self,
        job_id: JobId,
        receiver: EventReceiver,
    ) -> std::io::Result<JoinHandle<()>> {
        let events_tx = self.events_tx.clone();
        thread::Builder::new()
            .name(format!("fem-relay-{job_id}"))
            .spawn(move || {
                for event in receiver {
                    if events_tx.send(ShellEvent::Msg(map_event(event))).is_err() {
                        shell_debug!("Viewer gone; relay for job {} stops", job_id);
                        return;
                    }
                }
                shell_debug!("Relay for job {} drained", job_id);
            })
    }

    fn reap_relays(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.relays)
            .into_iter()
            .partition(JoinHandle::is_finished);
        self.relays = running;
        for relay in finished {
            let _ = relay.join();
        }
    }

    /// Aborts any running job, waits up to `grace`, then waits for relays of
    /// the jobs that did stop.
    pub(crate) fn shutdown(&mut self, grace: Duration) -> Result<(), ShutdownError> {
        let result = self.runner.shutdown(grace);
        if result.is_ok() {
            for relay in self.relays.drain(..) {
                let _ = relay.join();
            }
        } else {
            self.reap_relays();
        }
        result
    }
}

fn map_event(event: JobEvent) -> Msg {
    match event {
        JobEvent::Started { job_id, .. } => Msg::JobStarted { job_id },
        JobEvent::Output(message) => Msg::JobOutput {
            job_id: message.job_id,
            seq: message.seq,
            origin: map_origin(message.origin),
            text: message.text,
        },
        JobEvent::Finished { job_id, status } => Msg::JobFinished {
            job_id,
            status: map_status(status),
        },
        JobEvent::StreamClosed { job_id } => Msg::StreamClosed { job_id },
    }
}

fn map_origin(origin: fem_shell_engine::Origin) -> fem_shell_core::Origin {
    match origin {
        fem_shell_engine::Origin::Stdout => fem_shell_core::Origin::Stdout,
        fem_shell_engine::Origin::Stderr => fem_shell_core::Origin::Stderr,
        fem_shell_engine::Origin::Runner => fem_shell_core::Origin::Runner,
    }
}

fn map_status(status: fem_shell_engine::JobStatus) -> fem_shell_core::JobStatus {
    match status {
        fem_shell_engine::JobStatus::Pending => fem_shell_core::JobStatus::Pending,
        fem_shell_engine::JobStatus::Running => fem_shell_core::JobStatus::Running,
        fem_shell_engine::JobStatus::Succeeded => fem_shell_core::JobStatus::Succeeded,
        fem_shell_engine::JobStatus::Failed => fem_shell_core::JobStatus::Failed,
        fem_shell_engine::JobStatus::Aborted => fem_shell_core::JobStatus::Aborted,
    }
}

fn save_log(path: &Path, contents: &str) -> Msg {
    let document = format!(
        "# fem_shell log saved {}\n{}",
        Local::now().to_rfc3339(),
        contents
    );
    match write_atomically(path, &document) {
        Ok(written) => {
            shell_info!("Saved log to {:?}", written);
            Msg::Notice(format!("Saved log to {}", path.display()))
        }
        Err(err) => {
            shell_warn!("Could not save log to {:?}: {}", path, err);
            Msg::Notice(format!("Could not save log to {}: {err}", path.display()))
        }
    }
}
