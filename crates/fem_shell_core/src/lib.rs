//! FEM shell core: pure viewer state machine and view-model helpers.
mod effect;
mod lines;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use lines::{LineAssembler, LogLine, Origin};
pub use msg::Msg;
pub use state::{AppState, JobId, JobStatus};
pub use update::{update, INPUT_REQUIRED_NOTICE};
pub use view_model::{AppViewModel, JobView};
