use std::path::PathBuf;

use fem_shell_core::{update, AppState, Effect, JobStatus, LogLine, Msg, Origin};
use pretty_assertions::assert_eq;

fn running_job(job_id: u64) -> AppState {
    let (state, _) = update(AppState::new(), Msg::InputLoaded(PathBuf::from("model.pro")));
    let (state, _) = update(state, Msg::ExecuteRequested);
    let (state, _) = update(state, Msg::JobAccepted { job_id });
    let (state, _) = update(state, Msg::JobStarted { job_id });
    state
}

fn output(job_id: u64, seq: u64, text: &str) -> Msg {
    Msg::JobOutput {
        job_id,
        seq,
        origin: Origin::Stdout,
        text: text.to_string(),
    }
}

fn job_lines(state: &AppState) -> Vec<LogLine> {
    state
        .lines()
        .iter()
        .filter(|line| line.origin != Origin::Runner)
        .cloned()
        .collect()
}

#[test]
fn two_steps_render_in_order_and_job_succeeds() {
    let state = running_job(1);
    let (state, _) = update(state, output(1, 0, "step 1\n"));
    let (state, _) = update(state, output(1, 1, "step 2\n"));
    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 1,
            status: JobStatus::Succeeded,
        },
    );
    let (state, _) = update(state, Msg::StreamClosed { job_id: 1 });

    assert_eq!(
        job_lines(&state),
        vec![
            LogLine::new(Origin::Stdout, "step 1"),
            LogLine::new(Origin::Stdout, "step 2"),
        ]
    );
    let job = state.view().job.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert!(job.stream_closed);
    assert!(!state.is_busy());
    assert_eq!(state.lines().last(), Some(&LogLine::runner("Solver finished.")));
}

#[test]
fn duplicate_and_stale_sequence_numbers_are_dropped() {
    let state = running_job(1);
    let (state, _) = update(state, output(1, 0, "a\n"));
    let (state, _) = update(state, output(1, 0, "a\n"));
    let (state, _) = update(state, output(1, 1, "b\n"));

    assert_eq!(
        job_lines(&state),
        vec![
            LogLine::new(Origin::Stdout, "a"),
            LogLine::new(Origin::Stdout, "b"),
        ]
    );
}

#[test]
fn output_from_other_jobs_is_ignored() {
    let state = running_job(2);
    let (state, _) = update(state, output(1, 0, "leftover\n"));

    assert!(job_lines(&state).is_empty());
}

#[test]
fn unfinished_tail_is_flushed_when_job_finishes() {
    let state = running_job(1);
    let (state, _) = update(state, output(1, 0, "no newline"));
    assert!(job_lines(&state).is_empty());

    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 1,
            status: JobStatus::Failed,
        },
    );

    assert_eq!(
        job_lines(&state),
        vec![LogLine::new(Origin::Stdout, "no newline")]
    );
    assert_eq!(state.lines().last(), Some(&LogLine::runner("Solver failed.")));
}

#[test]
fn nothing_is_rendered_after_stream_closed() {
    let state = running_job(1);
    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 1,
            status: JobStatus::Succeeded,
        },
    );
    let (state, _) = update(state, Msg::StreamClosed { job_id: 1 });
    let before = state.lines().len();
    let (state, _) = update(state, output(1, 5, "late\n"));

    assert_eq!(state.lines().len(), before);
}

#[test]
fn terminal_status_is_not_overwritten() {
    let state = running_job(1);
    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 1,
            status: JobStatus::Aborted,
        },
    );
    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 1,
            status: JobStatus::Succeeded,
        },
    );

    assert_eq!(state.view().job.unwrap().status, JobStatus::Aborted);
}

#[test]
fn abort_emits_effect_once_and_is_noop_after_finish() {
    let state = running_job(3);
    let (state, effects) = update(state, Msg::AbortRequested);
    assert_eq!(effects, vec![Effect::AbortJob { job_id: 3 }]);

    let (state, effects) = update(state, Msg::AbortRequested);
    assert!(effects.is_empty());

    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 3,
            status: JobStatus::Aborted,
        },
    );
    let (next, effects) = update(state.clone(), Msg::AbortRequested);
    assert!(effects.is_empty());
    assert_eq!(next, state);
    assert_eq!(next.lines().last(), Some(&LogLine::runner("Solver aborted.")));
}

#[test]
fn new_job_after_finish_starts_with_fresh_sequence() {
    let state = running_job(1);
    let (state, _) = update(state, output(1, 0, "first\n"));
    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 1,
            status: JobStatus::Succeeded,
        },
    );
    let (state, _) = update(state, Msg::StreamClosed { job_id: 1 });

    let (state, effects) = update(state, Msg::ExecuteRequested);
    assert_eq!(effects.len(), 1);
    let (state, _) = update(state, Msg::JobAccepted { job_id: 2 });
    let (state, _) = update(state, output(2, 0, "second\n"));

    assert_eq!(
        job_lines(&state),
        vec![
            LogLine::new(Origin::Stdout, "first"),
            LogLine::new(Origin::Stdout, "second"),
        ]
    );
}

#[test]
fn mixed_origins_render_in_arrival_order() {
    let fragments = [
        (Origin::Stdout, "progress 50%"),
        (Origin::Stderr, "warning: mesh\n"),
        (Origin::Runner, "computation fault: boom\n"),
    ];
    let mut state = running_job(1);
    for (seq, (origin, text)) in fragments.into_iter().enumerate() {
        (state, _) = update(
            state,
            Msg::JobOutput {
                job_id: 1,
                seq: seq as u64,
                origin,
                text: text.to_string(),
            },
        );
    }
    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 1,
            status: JobStatus::Failed,
        },
    );

    let rendered: Vec<String> = state
        .lines()
        .iter()
        .skip(2)
        .map(LogLine::display)
        .collect();
    assert_eq!(
        rendered,
        vec![
            "progress 50%",
            "! warning: mesh",
            "-- computation fault: boom",
            "-- Solver failed.",
        ]
    );
}

#[test]
fn shell_notice_follows_pending_job_output() {
    let state = running_job(1);
    let (state, _) = update(state, output(1, 0, "iterating"));
    let (state, _) = update(state, Msg::AbortRequested);

    let rendered: Vec<String> = state.lines().iter().skip(2).map(LogLine::display).collect();
    assert_eq!(
        rendered,
        vec![
            "iterating",
            "-- Abort requested; waiting for the solver to stop...",
        ]
    );
}
