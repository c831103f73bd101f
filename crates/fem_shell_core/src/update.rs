use crate::{AppState, Effect, JobStatus, Msg};

/// Rendered when Execute is requested before any input was loaded.
pub const INPUT_REQUIRED_NOTICE: &str = "Please load an input file first.";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputLoaded(path) => {
            // Only an empty path is rejected; the solver interprets the file.
            if path.as_os_str().is_empty() {
                return (state, Vec::new());
            }
            state.notice(format!("Loaded file: {}", path.display()));
            state.set_input(path);
            Vec::new()
        }
        Msg::ExecuteRequested => {
            let Some(input) = state.input().map(ToOwned::to_owned) else {
                state.notice(INPUT_REQUIRED_NOTICE);
                return (state, Vec::new());
            };
            if state.is_busy() {
                state.notice("A job is already running; abort it before starting another.");
                return (state, Vec::new());
            }
            state.notice(format!("Executing solver on {}...", input.display()));
            state.set_start_pending(true);
            vec![Effect::StartJob { input }]
        }
        Msg::AbortRequested => {
            let job_id = match state.job() {
                Some(job) if !job.status.is_terminal() && !job.abort_requested => job.job_id,
                // Nothing running or already asked: aborting is a no-op.
                _ => return (state, Vec::new()),
            };
            if let Some(job) = state.current_job_mut(job_id) {
                job.abort_requested = true;
            }
            state.notice("Abort requested; waiting for the solver to stop...");
            vec![Effect::AbortJob { job_id }]
        }
        Msg::SaveLogRequested(path) => {
            if path.as_os_str().is_empty() {
                state.notice("Please choose a file to save the log to.");
                return (state, Vec::new());
            }
            vec![Effect::SaveLog {
                contents: state.log_text(),
                path,
            }]
        }
        Msg::StatusRequested => {
            let input_line = match state.input() {
                Some(path) => format!("Input: {}", path.display()),
                None => "Input: none loaded".to_string(),
            };
            let job_line = match state.job() {
                Some(job) => format!("Job {}: {}", job.job_id, job.status),
                None if state.is_busy() => "Job: starting".to_string(),
                None => "Job: none has run yet".to_string(),
            };
            state.notice(input_line);
            state.notice(job_line);
            Vec::new()
        }
        Msg::Notice(text) => {
            state.notice(text);
            Vec::new()
        }
        Msg::JobAccepted { job_id } => {
            state.track_job(job_id);
            Vec::new()
        }
        Msg::JobRejected { reason } => {
            state.set_start_pending(false);
            state.notice(reason);
            Vec::new()
        }
        Msg::JobStarted { job_id } => {
            if state.current_job_mut(job_id).is_some() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::JobOutput {
            job_id,
            seq,
            origin,
            text,
        } => {
            let accepted = match state.current_job_mut(job_id) {
                Some(job) if !job.stream_closed => {
                    let fresh = job.last_seq.is_none_or(|last| seq > last);
                    if fresh {
                        job.last_seq = Some(seq);
                    }
                    fresh
                }
                // Stale job or closed stream.
                _ => false,
            };
            if accepted {
                state.append_fragment(origin, &text);
            }
            Vec::new()
        }
        Msg::JobFinished { job_id, status } => {
            let finished = match state.current_job_mut(job_id) {
                Some(job) if status.is_terminal() && !job.status.is_terminal() => {
                    job.status = status;
                    true
                }
                _ => false,
            };
            if finished {
                state.flush_fragments();
                state.notice(finish_notice(status));
            }
            Vec::new()
        }
        Msg::StreamClosed { job_id } => {
            let closed = match state.current_job_mut(job_id) {
                Some(job) if !job.stream_closed => {
                    job.stream_closed = true;
                    true
                }
                _ => false,
            };
            if closed {
                state.flush_fragments();
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::Tick => Vec::new(),
    };

    (state, effects)
}

fn finish_notice(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Succeeded => "Solver finished.",
        JobStatus::Failed => "Solver failed.",
        JobStatus::Aborted => "Solver aborted.",
        JobStatus::Pending | JobStatus::Running => "Solver stopped.",
    }
}
