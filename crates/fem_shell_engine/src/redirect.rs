//! Process-wide diagnostic output destination.
//!
//! Computations that take an [`OutputSink`] write to it directly. Code that
//! cannot be handed a sink prints through [`diag_stdout`], [`diag_stderr`] or
//! the `diag_print!` family instead; while a [`RedirectionBinding`] is active
//! that output is captured by the bound sink, otherwise it goes to the real
//! standard streams. At most one binding exists at a time.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::{JobId, Origin, OutputSink};

static ACTIVE: Mutex<Option<Binding>> = Mutex::new(None);
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Binding {
    token: u64,
    sink: OutputSink,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("diagnostic output is already redirected to job {job_id}")]
    AlreadyBound { job_id: JobId },
}

/// Exclusive claim on the diagnostic output destination.
///
/// Dropping the binding restores the real standard streams, so every exit
/// path of a job (including unwinding) releases it.
#[derive(Debug)]
pub struct RedirectionBinding {
    token: u64,
    job_id: JobId,
    bound: bool,
}

impl RedirectionBinding {
    /// Routes diagnostic output to `sink` until the binding is released.
    pub fn bind(sink: OutputSink) -> Result<Self, RedirectError> {
        let mut active = lock_active();
        if let Some(existing) = active.as_ref() {
            return Err(RedirectError::AlreadyBound {
                job_id: existing.sink.job_id(),
            });
        }
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let job_id = sink.job_id();
        *active = Some(Binding { token, sink });
        Ok(Self {
            token,
            job_id,
            bound: true,
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Restores the real standard streams. Calling it again is a no-op.
    pub fn unbind(&mut self) {
        if !self.bound {
            return;
        }
        self.bound = false;
        let mut active = lock_active();
        if active.as_ref().is_some_and(|b| b.token == self.token) {
            *active = None;
        }
    }
}

impl Drop for RedirectionBinding {
    fn drop(&mut self) {
        self.unbind();
    }
}

/// Job whose sink currently owns diagnostic output, if any.
pub fn bound_job() -> Option<JobId> {
    lock_active().as_ref().map(|b| b.sink.job_id())
}

fn lock_active() -> MutexGuard<'static, Option<Binding>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn current_sink() -> Option<OutputSink> {
    lock_active().as_ref().map(|b| b.sink.clone())
}

/// Writes `text` to the diagnostic destination for `origin`.
/// Never fails: if the real stream is unavailable the text is lost.
pub fn write_diagnostic(origin: Origin, text: &str) {
    // Clone out of the lock so a slow capture never blocks unbinding.
    if let Some(sink) = current_sink() {
        sink.capture(origin, text);
        return;
    }
    let _ = match origin {
        Origin::Stderr => io::stderr().lock().write_all(text.as_bytes()),
        Origin::Stdout | Origin::Runner => io::stdout().lock().write_all(text.as_bytes()),
    };
}

/// Diagnostic standard output; see the module docs.
pub fn diag_stdout() -> DiagWriter {
    DiagWriter {
        origin: Origin::Stdout,
    }
}

/// Diagnostic standard error; see the module docs.
pub fn diag_stderr() -> DiagWriter {
    DiagWriter {
        origin: Origin::Stderr,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagWriter {
    origin: Origin,
}

impl Write for DiagWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        write_diagnostic(self.origin, &String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `print!` to the diagnostic destination.
#[macro_export]
macro_rules! diag_print {
    ($($arg:tt)*) => {
        $crate::write_diagnostic($crate::Origin::Stdout, &format!($($arg)*))
    };
}

/// `println!` to the diagnostic destination.
#[macro_export]
macro_rules! diag_println {
    () => {
        $crate::write_diagnostic($crate::Origin::Stdout, "\n")
    };
    ($($arg:tt)*) => {
        $crate::write_diagnostic($crate::Origin::Stdout, &format!("{}\n", format_args!($($arg)*)))
    };
}

/// `eprintln!` to the diagnostic destination.
#[macro_export]
macro_rules! diag_eprintln {
    () => {
        $crate::write_diagnostic($crate::Origin::Stderr, "\n")
    };
    ($($arg:tt)*) => {
        $crate::write_diagnostic($crate::Origin::Stderr, &format!("{}\n", format_args!($($arg)*)))
    };
}
