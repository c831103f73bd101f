//! FEM shell engine: background job execution and output relay.
mod cancel;
mod channel;
mod computation;
mod config;
mod persist;
mod redirect;
mod runner;
mod sink;
mod solver;
mod types;

pub use cancel::CancellationToken;
pub use channel::{message_channel, EventReceiver, EventSender, SendError};
pub use computation::{Computation, ComputationError, ComputationFactory, JobContext, Step};
pub use config::{RunnerConfig, SolverConfig};
pub use persist::{ensure_dir, write_atomically, PersistError};
pub use redirect::{
    bound_job, diag_stderr, diag_stdout, write_diagnostic, DiagWriter, RedirectError,
    RedirectionBinding,
};
pub use runner::{JobHandle, JobRunner, ShutdownError, StartError, SubscribeError};
pub use sink::{OutputSink, SinkWriter};
pub use solver::{ExternalSolver, ExternalSolverFactory};
pub use types::{JobEvent, JobId, JobStatus, Origin, OutputMessage};
