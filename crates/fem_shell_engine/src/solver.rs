//! The default computation: an external solver process.
//!
//! One unit of work waits up to the poll interval for the next chunk the
//! solver wrote to either pipe (solve step) and relays it (output step). The
//! solver stays active until both pipes reach end of file.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use shell_logging::{shell_debug, shell_info, shell_warn};

use crate::{
    Computation, ComputationError, ComputationFactory, JobContext, Origin, SolverConfig, Step,
};

const READ_CHUNK: usize = 4096;

#[derive(Debug)]
enum Chunk {
    Text(Origin, String),
    Eof,
}

#[derive(Debug, Clone, Default)]
pub struct ExternalSolverFactory {
    config: SolverConfig,
}

impl ExternalSolverFactory {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl ComputationFactory for ExternalSolverFactory {
    fn create(&self, input: &Path) -> Result<Box<dyn Computation>, ComputationError> {
        Ok(Box::new(ExternalSolver::spawn(&self.config, input)?))
    }
}

#[derive(Debug)]
pub struct ExternalSolver {
    child: Child,
    chunks: mpsc::Receiver<Chunk>,
    readers: Vec<JoinHandle<()>>,
    open_pipes: usize,
    poll_interval: Duration,
    exit: Option<ExitStatus>,
}

impl ExternalSolver {
    pub fn spawn(config: &SolverConfig, input: &Path) -> Result<Self, ComputationError> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ComputationError::Launch(format!("{}: {err}", config.program)))?;
        shell_info!(
            "spawned solver pid={} program={} input={}",
            child.id(),
            config.program,
            input.display()
        );

        let (tx, chunks) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Err(err) = start_readers(&mut child, &mut readers, tx) {
            shell_warn!("no pipe readers for solver pid={}: {err}", child.id());
            if let Err(wait_err) = stop_child(&mut child, readers) {
                shell_warn!("could not reap solver: {wait_err}");
            }
            return Err(err);
        }

        Ok(Self {
            child,
            chunks,
            open_pipes: readers.len(),
            readers,
            poll_interval: config.poll_interval(),
            exit: None,
        })
    }

    fn reap(&mut self) -> Result<ExitStatus, ComputationError> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self.child.wait()?;
        self.exit = Some(status);
        Ok(status)
    }
}

impl Computation for ExternalSolver {
    fn step(&mut self, ctx: &JobContext<'_>) -> Result<Step, ComputationError> {
        if self.open_pipes == 0 {
            let status = self.reap()?;
            shell_info!("solver exited with {status}");
            return if status.success() {
                Ok(Step::Done)
            } else {
                Err(ComputationError::ExitStatus(status.to_string()))
            };
        }

        match self.chunks.recv_timeout(self.poll_interval) {
            Ok(Chunk::Text(origin, text)) => ctx.sink.capture(origin, &text),
            Ok(Chunk::Eof) => self.open_pipes -= 1,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.open_pipes = 0,
        }
        Ok(Step::Continue)
    }

    fn finish(&mut self, ctx: &JobContext<'_>) -> Result<(), ComputationError> {
        if self.exit.is_none() {
            match self.child.try_wait()? {
                Some(status) => self.exit = Some(status),
                None => {
                    shell_warn!("stopping solver pid={}", self.child.id());
                    if let Err(err) = self.child.kill() {
                        // Already exited between try_wait and kill.
                        shell_debug!("kill failed: {err}");
                    }
                    self.reap()?;
                }
            }
        }

        // Pipes close with the process; readers end on their own.
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
        // Relay whatever arrived after the last unit.
        while let Ok(chunk) = self.chunks.try_recv() {
            if let Chunk::Text(origin, text) = chunk {
                ctx.sink.capture(origin, &text);
            }
        }
        Ok(())
    }
}

fn start_readers(
    child: &mut Child,
    readers: &mut Vec<JoinHandle<()>>,
    tx: mpsc::Sender<Chunk>,
) -> Result<(), ComputationError> {
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, Origin::Stdout, tx.clone())?);
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, Origin::Stderr, tx)?);
    }
    Ok(())
}

/// Kills and reaps a solver that will not be driven, then joins its readers.
fn stop_child(child: &mut Child, readers: Vec<JoinHandle<()>>) -> io::Result<ExitStatus> {
    if let Err(err) = child.kill() {
        shell_debug!("kill failed: {err}");
    }
    let status = child.wait();
    for reader in readers {
        let _ = reader.join();
    }
    status
}

fn spawn_reader<R>(
    mut pipe: R,
    origin: Origin,
    tx: mpsc::Sender<Chunk>,
) -> Result<JoinHandle<()>, ComputationError>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("fem-solver-{origin:?}").to_lowercase())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            let mut carry: Vec<u8> = Vec::new();
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        carry.extend_from_slice(&buf[..n]);
                        let text = take_utf8(&mut carry);
                        if !text.is_empty() && tx.send(Chunk::Text(origin, text)).is_err() {
                            return;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        shell_debug!("{origin:?} pipe read failed: {err}");
                        break;
                    }
                }
            }
            if !carry.is_empty() {
                let text = String::from_utf8_lossy(&carry).into_owned();
                let _ = tx.send(Chunk::Text(origin, text));
            }
            let _ = tx.send(Chunk::Eof);
        })
        .map_err(ComputationError::from)
}

/// Decodes the longest valid prefix of `carry`, keeping an incomplete
/// trailing sequence for the next read.
fn take_utf8(carry: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(carry) {
        Ok(_) => carry.len(),
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        Err(_) => carry.len(),
    };
    let rest = carry.split_off(valid);
    let text = String::from_utf8_lossy(carry).into_owned();
    *carry = rest;
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_multibyte_sequence_is_carried_over() {
        let bytes = "σ=1".as_bytes();
        let mut carry = bytes[..1].to_vec();
        assert_eq!(take_utf8(&mut carry), "");
        assert_eq!(carry.len(), 1);

        carry.extend_from_slice(&bytes[1..]);
        assert_eq!(take_utf8(&mut carry), "σ=1");
        assert!(carry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn abandoned_solver_is_killed_and_reaped() {
        let mut child = Command::new("sh")
            .args(["-c", "exec sleep 30"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let (tx, chunks) = mpsc::channel();
        let stdout = child.stdout.take().unwrap();
        let reader = spawn_reader(stdout, Origin::Stdout, tx).unwrap();

        let begun = std::time::Instant::now();
        let status = stop_child(&mut child, vec![reader]).unwrap();

        assert!(!status.success());
        assert!(begun.elapsed() < Duration::from_secs(10));
        assert!(matches!(chunks.try_recv(), Ok(Chunk::Eof)));
        assert!(child.try_wait().unwrap().is_some());
    }
}
