use std::time::Duration;

use fem_shell_engine::{message_channel, JobEvent, JobStatus, Origin, OutputMessage, SendError};
use pretty_assertions::assert_eq;

fn output(seq: u64, text: &str) -> JobEvent {
    JobEvent::Output(OutputMessage {
        job_id: 1,
        seq,
        origin: Origin::Stdout,
        text: text.to_string(),
    })
}

#[test]
fn events_arrive_in_send_order() {
    let (tx, mut rx) = message_channel(None);
    for seq in 0..100 {
        tx.send(output(seq, "x")).unwrap();
    }

    let seqs: Vec<u64> = rx
        .drain()
        .into_iter()
        .map(|event| match event {
            JobEvent::Output(message) => message.seq,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(seqs, (0..100).collect::<Vec<_>>());
}

#[test]
fn nothing_is_yielded_after_stream_closed() {
    let (tx, mut rx) = message_channel(Some(8));
    tx.send(JobEvent::Finished {
        job_id: 1,
        status: JobStatus::Succeeded,
    })
    .unwrap();
    tx.send(JobEvent::StreamClosed { job_id: 1 }).unwrap();
    tx.send(output(9, "late")).unwrap();

    assert_eq!(
        rx.drain(),
        vec![
            JobEvent::Finished {
                job_id: 1,
                status: JobStatus::Succeeded,
            },
            JobEvent::StreamClosed { job_id: 1 },
        ]
    );
    assert!(rx.is_closed());
    assert_eq!(rx.try_recv(), None);
    assert_eq!(rx.recv(), None);
}

#[test]
fn try_recv_does_not_block_on_empty_channel() {
    let (_tx, mut rx) = message_channel(Some(1));
    assert_eq!(rx.try_recv(), None);
    assert_eq!(rx.recv_timeout(Duration::from_millis(5)), None);
    assert!(!rx.is_closed());
}

#[test]
fn dropping_every_sender_closes_the_receiver() {
    let (tx, mut rx) = message_channel(Some(4));
    tx.send(output(0, "only")).unwrap();
    drop(tx);

    assert_eq!(rx.recv(), Some(output(0, "only")));
    assert_eq!(rx.recv(), None);
    assert!(rx.is_closed());
}

#[test]
fn bounded_send_timeout_reports_full() {
    let (tx, mut rx) = message_channel(Some(1));
    tx.send_timeout(output(0, "a"), Duration::from_millis(5))
        .unwrap();

    let result = tx.send_timeout(output(1, "b"), Duration::from_millis(5));
    assert_eq!(result, Err(SendError::Full));
    assert_eq!(rx.drain(), vec![output(0, "a")]);
}

#[test]
fn send_reports_missing_consumer() {
    let (tx, rx) = message_channel(Some(1));
    drop(rx);

    assert_eq!(tx.send(output(0, "a")), Err(SendError::Disconnected));
    assert_eq!(
        tx.send_timeout(output(0, "a"), Duration::from_millis(1)),
        Err(SendError::Disconnected)
    );
}

#[test]
fn receiver_iterates_until_stream_closed() {
    let (tx, rx) = message_channel(Some(2));
    let producer = std::thread::spawn(move || {
        for seq in 0..10 {
            tx.send(output(seq, "chunk")).unwrap();
        }
        tx.send(JobEvent::StreamClosed { job_id: 1 }).unwrap();
    });

    let events: Vec<JobEvent> = rx.collect();
    producer.join().unwrap();

    assert_eq!(events.len(), 11);
    assert_eq!(events.last(), Some(&JobEvent::StreamClosed { job_id: 1 }));
}
