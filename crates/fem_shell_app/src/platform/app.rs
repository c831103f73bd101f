use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use fem_shell_core::{update, AppState, Msg};
use fem_shell_engine::{ExternalSolverFactory, JobRunner};
use log::LevelFilter;
use shell_logging::{shell_debug, shell_error, shell_info, shell_warn};

use super::effects::EffectRunner;
use super::logging;
use super::persistence::{self, CONFIG_FILENAME};
use super::ui::commands;
use super::ui::constants::APP_TITLE;
use super::ui::render::{render_new_lines, LogView, TerminalLogView};

/// Everything the viewer loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellEvent {
    Msg(Msg),
    Quit,
}

pub fn run_app() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("could not determine the working directory")?;
    let (config, config_problem) = persistence::load_config(&cwd.join(CONFIG_FILENAME));
    logging::initialize(config.log_destination, LevelFilter::Info, &config.log_file);
    if let Some(problem) = config_problem {
        shell_warn!("{}; using defaults", problem);
    }
    shell_info!("{} starting in {:?}", APP_TITLE, cwd);

    let (events_tx, events_rx) = mpsc::channel();
    let factory = Arc::new(ExternalSolverFactory::new(config.solver.clone()));
    let runner = JobRunner::new(factory, config.runner.clone());
    let effects = EffectRunner::new(runner, events_tx.clone());
    let mut controller = ViewerController::new(effects, TerminalLogView, events_rx);

    controller.dispatch(Msg::Notice(format!(
        "{APP_TITLE}: type `help` for a list of commands."
    )));
    let initial_input = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| persistence::load_last_input(&cwd));
    if let Some(input) = initial_input {
        controller.dispatch(Msg::InputLoaded(input));
    }
    controller.render();

    spawn_command_reader(events_tx).context("could not start the command reader")?;
    controller.run(config.tick());

    let last_input = controller.finish(config.runner.shutdown_grace());
    persistence::save_last_input(&cwd, last_input.as_deref());
    shell_info!("{} exiting", APP_TITLE);
    Ok(())
}

/// Reads commands from stdin until `quit` or end of input.
fn spawn_command_reader(events_tx: mpsc::Sender<ShellEvent>) -> io::Result<()> {
    thread::Builder::new()
        .name("fem-commands".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        shell_warn!("Reading commands failed: {}", err);
                        break;
                    }
                };
                for event in commands::into_events(commands::parse(&line)) {
                    let quit = event == ShellEvent::Quit;
                    if events_tx.send(event).is_err() || quit {
                        return;
                    }
                }
            }
            shell_debug!("Command input closed");
            let _ = events_tx.send(ShellEvent::Quit);
        })
        .map(|_| ())
}

/// Owns the viewer state and drives it from the event channel.
pub(crate) struct ViewerController<V: LogView> {
    state: AppState,
    effects: EffectRunner,
    view: V,
    rendered: usize,
    events_rx: mpsc::Receiver<ShellEvent>,
    queue: VecDeque<Msg>,
}

impl<V: LogView> ViewerController<V> {
    pub(crate) fn new(
        effects: EffectRunner,
        view: V,
        events_rx: mpsc::Receiver<ShellEvent>,
    ) -> Self {
        Self {
            state: AppState::new(),
            effects,
            view,
            rendered: 0,
            events_rx,
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn run(&mut self, tick: Duration) {
        while self.step(tick) {}
    }

    /// Waits up to `timeout` for an event, then handles everything already
    /// queued. Returns false once the shell should quit.
    pub(crate) fn step(&mut self, timeout: Duration) -> bool {
        let keep_running = match self.events_rx.recv_timeout(timeout) {
            Ok(event) => self.handle(event),
            Err(RecvTimeoutError::Timeout) => {
                self.dispatch(Msg::Tick);
                true
            }
            Err(RecvTimeoutError::Disconnected) => false,
        };

        let keep_running = keep_running && self.drain_ready();
        self.render();
        keep_running
    }

    fn drain_ready(&mut self) -> bool {
        while let Ok(event) = self.events_rx.try_recv() {
            if !self.handle(event) {
                return false;
            }
        }
        true
    }

    fn handle(&mut self, event: ShellEvent) -> bool {
        match event {
            ShellEvent::Msg(msg) => {
                self.dispatch(msg);
                true
            }
            ShellEvent::Quit => false,
        }
    }

    /// Applies `msg` and every message its effects produce, in order.
    pub(crate) fn dispatch(&mut self, msg: Msg) {
        self.queue.push_back(msg);
        while let Some(msg) = self.queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                let replies = self.effects.run(effect);
                self.queue.extend(replies);
            }
        }
    }

    pub(crate) fn render(&mut self) {
        if self.state.consume_dirty() {
            self.rendered = render_new_lines(&mut self.view, self.state.lines(), self.rendered);
        }
    }

    /// Aborts any running job, waits up to `grace` for it, shows what it
    /// delivered meanwhile and returns the loaded input.
    pub(crate) fn finish(mut self, grace: Duration) -> Option<PathBuf> {
        if let Err(err) = self.effects.shutdown(grace) {
            shell_error!("Shutdown incomplete: {}", err);
            self.dispatch(Msg::Notice(format!("{err}; exiting anyway.")));
        }
        while let Ok(event) = self.events_rx.try_recv() {
            if let ShellEvent::Msg(msg) = event {
                self.dispatch(msg);
            }
        }
        self.render();
        self.state.input().map(Path::to_path_buf)
    }

    #[cfg(test)]
    fn state(&self) -> &AppState {
        &self.state
    }
}
