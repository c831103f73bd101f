use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fem_shell_engine::{write_atomically, RunnerConfig, SolverConfig};
use serde::{Deserialize, Serialize};
use shell_logging::{shell_error, shell_info, shell_warn};
use thiserror::Error;

use super::logging::{LogDestination, DEFAULT_LOG_FILE};

pub(crate) const CONFIG_FILENAME: &str = "fem_shell.ron";
const STATE_FILENAME: &str = ".fem_shell_state.ron";

/// User-editable settings, read from `fem_shell.ron` when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ShellConfig {
    pub(crate) solver: SolverConfig,
    pub(crate) runner: RunnerConfig,
    /// Idle wake-up interval of the viewer loop.
    pub(crate) tick_ms: u64,
    pub(crate) log_destination: LogDestination,
    pub(crate) log_file: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            runner: RunnerConfig::default(),
            tick_ms: 75,
            log_destination: LogDestination::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ShellConfig {
    pub(crate) fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config from {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Reads the config file; a missing or malformed file yields defaults.
/// Runs before the logger exists, so the problem is handed back for logging.
pub(crate) fn load_config(path: &Path) -> (ShellConfig, Option<ConfigError>) {
    match read_config(path) {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (ShellConfig::default(), Some(err)),
    }
}

fn read_config(path: &Path) -> Result<Option<ShellConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    ron::from_str(&content)
        .map(Some)
        .map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SessionState {
    last_input: Option<PathBuf>,
}

/// The input loaded when the shell last exited, if any.
pub(crate) fn load_last_input(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            shell_warn!("Failed to read session state from {:?}: {}", path, err);
            return None;
        }
    };

    match ron::from_str::<SessionState>(&content) {
        Ok(state) => {
            shell_info!("Loaded session state from {:?}", path);
            state.last_input
        }
        Err(err) => {
            shell_warn!("Failed to parse session state from {:?}: {}", path, err);
            None
        }
    }
}

pub(crate) fn save_last_input(dir: &Path, input: Option<&Path>) {
    let state = SessionState {
        last_input: input.map(Path::to_path_buf),
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&state, pretty) {
        Ok(text) => text,
        Err(err) => {
            shell_error!("Failed to serialize session state: {}", err);
            return;
        }
    };

    if let Err(err) = write_atomically(&dir.join(STATE_FILENAME), &content) {
        shell_error!("Failed to write session state to {:?}: {}", dir, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_config_gives_defaults_silently() {
        let temp = TempDir::new().unwrap();
        let (config, problem) = load_config(&temp.path().join(CONFIG_FILENAME));

        assert_eq!(config, ShellConfig::default());
        assert!(problem.is_none());
    }

    #[test]
    fn partial_config_overrides_only_given_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(solver: (program: "python3", args: ["pyfem/PyFEM.py"]), tick_ms: 20, log_destination: Both)"#,
        )
        .unwrap();

        let (config, problem) = load_config(&path);
        assert!(problem.is_none());
        assert_eq!(config.solver.program, "python3");
        assert_eq!(config.solver.args, vec!["pyfem/PyFEM.py".to_string()]);
        assert_eq!(config.tick(), Duration::from_millis(20));
        assert_eq!(config.log_destination, LogDestination::Both);
        assert_eq!(config.runner, RunnerConfig::default());
    }

    #[test]
    fn malformed_config_reports_problem() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "(tick_ms: \"fast\")").unwrap();

        let (config, problem) = load_config(&path);
        assert_eq!(config, ShellConfig::default());
        assert!(matches!(problem, Some(ConfigError::Parse { .. })));
    }

    #[test]
    fn last_input_survives_restart() {
        let temp = TempDir::new().unwrap();
        assert_eq!(load_last_input(temp.path()), None);

        save_last_input(temp.path(), Some(Path::new("models/beam.pro")));
        assert_eq!(
            load_last_input(temp.path()),
            Some(PathBuf::from("models/beam.pro"))
        );

        save_last_input(temp.path(), None);
        assert_eq!(load_last_input(temp.path()), None);
    }
}
