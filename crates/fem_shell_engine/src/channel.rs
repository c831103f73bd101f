//! Ordered single-consumer conduit from one job to its viewer.
//!
//! Every job gets a fresh channel, so events can never leak from one job into
//! the next job's viewer. The receiver treats [`JobEvent::StreamClosed`] as the
//! end of the stream: nothing is yielded after it.

use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::JobEvent;

const MIN_BACKOFF: Duration = Duration::from_micros(50);
const MAX_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("message channel is full")]
    Full,
    #[error("message channel has no consumer")]
    Disconnected,
}

/// Creates a job channel. `None` makes it unbounded.
pub fn message_channel(capacity: Option<usize>) -> (EventSender, EventReceiver) {
    let (tx, rx) = match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::sync_channel(capacity.max(1));
            (SenderKind::Bounded(tx), rx)
        }
        None => {
            let (tx, rx) = mpsc::channel();
            (SenderKind::Unbounded(tx), rx)
        }
    };
    (
        EventSender { tx },
        EventReceiver { rx, closed: false },
    )
}

#[derive(Debug, Clone)]
enum SenderKind {
    Bounded(mpsc::SyncSender<JobEvent>),
    Unbounded(mpsc::Sender<JobEvent>),
}

/// Producer half; cloned into the job's output sink and its runner thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: SenderKind,
}

impl EventSender {
    /// Queues `event`, waiting for room as long as it takes.
    pub fn send(&self, event: JobEvent) -> Result<(), SendError> {
        match &self.tx {
            SenderKind::Bounded(tx) => tx.send(event),
            SenderKind::Unbounded(tx) => tx.send(event),
        }
        .map_err(|_| SendError::Disconnected)
    }

    /// Queues `event`, waiting at most `timeout` for room. On
    /// [`SendError::Full`] the event has been discarded.
    pub fn send_timeout(&self, event: JobEvent, timeout: Duration) -> Result<(), SendError> {
        let tx = match &self.tx {
            SenderKind::Bounded(tx) => tx,
            SenderKind::Unbounded(_) => return self.send(event),
        };

        let deadline = Instant::now() + timeout;
        let mut backoff = MIN_BACKOFF;
        let mut event = event;
        loop {
            match tx.try_send(event) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(SendError::Disconnected),
                Err(TrySendError::Full(returned)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(SendError::Full);
                    }
                    thread::sleep(backoff.min(deadline - now));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    event = returned;
                }
            }
        }
    }
}

/// Consumer half. Exactly one exists per job.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<JobEvent>,
    closed: bool,
}

impl EventReceiver {
    /// Next event if one is queued; never blocks.
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        if self.closed {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Blocks until the next event; `None` once the stream is closed.
    pub fn recv(&mut self) -> Option<JobEvent> {
        if self.closed {
            return None;
        }
        match self.rx.recv() {
            Ok(event) => Some(self.observe(event)),
            Err(_) => {
                self.closed = true;
                None
            }
        }
    }

    /// Blocks for at most `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<JobEvent> {
        if self.closed {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(self.observe(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Everything queued right now, in order.
    pub fn drain(&mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// True after `StreamClosed` was yielded or every producer went away.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn observe(&mut self, event: JobEvent) -> JobEvent {
        if matches!(event, JobEvent::StreamClosed { .. }) {
            self.closed = true;
        }
        event
    }
}

impl Iterator for EventReceiver {
    type Item = JobEvent;

    fn next(&mut self) -> Option<JobEvent> {
        self.recv()
    }
}
