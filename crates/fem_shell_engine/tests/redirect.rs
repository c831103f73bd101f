use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fem_shell_engine::{
    bound_job, diag_eprintln, diag_println, diag_stdout, message_channel, JobEvent, Origin,
    OutputSink, RedirectError, RedirectionBinding,
};
use pretty_assertions::assert_eq;

// The binding is process-wide; tests in this file take turns.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sink(job_id: u64) -> (OutputSink, fem_shell_engine::EventReceiver) {
    let (tx, rx) = message_channel(None);
    (OutputSink::new(job_id, tx, Duration::from_millis(10)), rx)
}

fn texts(events: Vec<JobEvent>) -> Vec<(Origin, String)> {
    events
        .into_iter()
        .filter_map(|event| match event {
            JobEvent::Output(message) => Some((message.origin, message.text)),
            _ => None,
        })
        .collect()
}

#[test]
fn bound_sink_captures_diagnostic_output() {
    let _serial = serial();
    let (sink, mut rx) = sink(1);
    let binding = RedirectionBinding::bind(sink).unwrap();
    assert_eq!(bound_job(), Some(1));

    diag_println!("residual {}", 0.5);
    diag_eprintln!("warning");
    write!(diag_stdout(), "partial").unwrap();
    drop(binding);

    assert_eq!(
        texts(rx.drain()),
        vec![
            (Origin::Stdout, "residual 0.5\n".to_string()),
            (Origin::Stderr, "warning\n".to_string()),
            (Origin::Stdout, "partial".to_string()),
        ]
    );
    assert_eq!(bound_job(), None);
}

#[test]
fn only_one_binding_at_a_time() {
    let _serial = serial();
    let (first, _rx1) = sink(1);
    let (second, _rx2) = sink(2);

    let _binding = RedirectionBinding::bind(first).unwrap();
    let err = RedirectionBinding::bind(second).unwrap_err();
    assert_eq!(err, RedirectError::AlreadyBound { job_id: 1 });
}

#[test]
fn unbind_is_idempotent_and_restores_default() {
    let _serial = serial();
    let (sink, mut rx) = sink(3);
    let mut binding = RedirectionBinding::bind(sink).unwrap();

    binding.unbind();
    binding.unbind();
    assert!(!binding.is_bound());
    assert_eq!(bound_job(), None);

    diag_println!("goes to the real stdout");
    assert!(texts(rx.drain()).is_empty());
    drop(binding);
}

#[test]
fn stale_binding_does_not_release_a_newer_one() {
    let _serial = serial();
    let (old_sink, _old_rx) = sink(4);
    let (new_sink, mut new_rx) = sink(5);

    let mut old = RedirectionBinding::bind(old_sink).unwrap();
    old.unbind();
    let new = RedirectionBinding::bind(new_sink).unwrap();
    drop(old);

    assert_eq!(bound_job(), Some(5));
    diag_println!("still captured");
    assert_eq!(
        texts(new_rx.drain()),
        vec![(Origin::Stdout, "still captured\n".to_string())]
    );
    drop(new);
}

#[test]
fn binding_is_released_when_a_thread_unwinds() {
    let _serial = serial();
    let (sink, _rx) = sink(6);

    let result = std::thread::spawn(move || {
        let _binding = RedirectionBinding::bind(sink).unwrap();
        panic!("solver blew up");
    })
    .join();

    assert!(result.is_err());
    assert_eq!(bound_job(), None);
}
