//! Capture point for everything a computation prints.
//!
//! Backpressure policy: a capture waits at most `send_timeout` for room in a
//! bounded channel. If there is still none the fragment is dropped and
//! counted; one warning message carrying the count is queued ahead of the next
//! fragment that gets through, or at flush time. Sequence numbers are only
//! consumed by delivered messages, so the viewer always sees `0, 1, 2, ...`.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use shell_logging::{shell_debug, shell_warn};

use crate::channel::{EventSender, SendError};
use crate::{JobEvent, JobId, Origin, OutputMessage};

#[derive(Debug, Clone)]
pub struct OutputSink {
    inner: Arc<SinkInner>,
}

#[derive(Debug)]
struct SinkInner {
    job_id: JobId,
    tx: EventSender,
    send_timeout: Duration,
    // Held across sends so sequence numbers match queue order.
    state: Mutex<SinkState>,
}

#[derive(Debug, Default)]
struct SinkState {
    next_seq: u64,
    unreported_drops: u64,
    total_drops: u64,
    disconnected: bool,
    closed: bool,
}

impl OutputSink {
    pub fn new(job_id: JobId, tx: EventSender, send_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                job_id,
                tx,
                send_timeout,
                state: Mutex::new(SinkState::default()),
            }),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.inner.job_id
    }

    /// Relays one fragment. Never fails and never blocks longer than the
    /// configured send timeout (twice, when a drop warning is pending).
    pub fn capture(&self, origin: Origin, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut state = self.lock();
        if state.closed || state.disconnected {
            return;
        }

        if state.unreported_drops > 0 {
            let warning = drop_warning(state.unreported_drops);
            match self.deliver(&mut state, Origin::Runner, warning, false) {
                Ok(()) => state.unreported_drops = 0,
                Err(_) => {
                    self.record_drop(&mut state);
                    return;
                }
            }
        }

        if self
            .deliver(&mut state, origin, text.to_string(), false)
            .is_err()
        {
            self.record_drop(&mut state);
        }
    }

    /// Relays a line synthesized by the runner.
    pub fn notice(&self, text: &str) {
        self.capture(Origin::Runner, &format!("{text}\n"));
    }

    /// Queues the pending drop warning, waiting for room as long as needed.
    pub fn flush(&self) {
        let mut state = self.lock();
        if state.closed || state.disconnected || state.unreported_drops == 0 {
            return;
        }
        let warning = drop_warning(state.unreported_drops);
        if self
            .deliver(&mut state, Origin::Runner, warning, true)
            .is_ok()
        {
            state.unreported_drops = 0;
        }
    }

    /// Flushes, then discards every later capture. Clones held by stray
    /// threads of the computation become inert.
    pub fn close(&self) {
        self.flush();
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Fragments discarded by backpressure over the sink's lifetime.
    pub fn dropped(&self) -> u64 {
        self.lock().total_drops
    }

    /// An `io::Write` adapter that captures into this sink.
    pub fn writer(&self, origin: Origin) -> SinkWriter {
        SinkWriter {
            sink: self.clone(),
            origin,
            pending: Vec::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(
        &self,
        state: &mut SinkState,
        origin: Origin,
        text: String,
        blocking: bool,
    ) -> Result<(), SendError> {
        let event = JobEvent::Output(OutputMessage {
            job_id: self.inner.job_id,
            seq: state.next_seq,
            origin,
            text,
        });
        let result = if blocking {
            self.inner.tx.send(event)
        } else {
            self.inner.tx.send_timeout(event, self.inner.send_timeout)
        };
        match result {
            Ok(()) => {
                state.next_seq += 1;
                Ok(())
            }
            Err(SendError::Disconnected) => {
                shell_debug!("viewer went away; discarding further output");
                state.disconnected = true;
                Err(SendError::Disconnected)
            }
            Err(SendError::Full) => Err(SendError::Full),
        }
    }

    fn record_drop(&self, state: &mut SinkState) {
        if state.disconnected {
            return;
        }
        if state.unreported_drops == 0 {
            shell_warn!(
                "message channel full for {:?}; dropping output",
                self.inner.send_timeout
            );
        }
        state.unreported_drops += 1;
        state.total_drops += 1;
    }
}

fn drop_warning(count: u64) -> String {
    format!("[{count} output fragment(s) dropped: viewer is not keeping up]\n")
}

/// `io::Write` front for an [`OutputSink`].
///
/// Bytes are decoded as UTF-8. An incomplete multi-byte sequence at the end of
/// a write is held back until the next write completes it.
#[derive(Debug)]
pub struct SinkWriter {
    sink: OutputSink,
    origin: Origin,
    pending: Vec<u8>,
}

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete trailing sequence: keep it for the next write.
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                self.sink.capture(self.origin, &text);
                return Ok(buf.len());
            }
        };
        let rest = self.pending.split_off(valid);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        self.sink.capture(self.origin, &text);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.sink.capture(self.origin, &text);
        }
    }
}
