use std::io::{self, Write};

use fem_shell_core::LogLine;

/// The log surface: lines are only ever appended.
pub(crate) trait LogView {
    fn append(&mut self, line: &LogLine);
}

/// Prints each line to the terminal as it arrives.
#[derive(Debug, Default)]
pub(crate) struct TerminalLogView;

impl LogView for TerminalLogView {
    fn append(&mut self, line: &LogLine) {
        let mut out = io::stdout().lock();
        // A closed stdout must not take the shell down.
        let _ = writeln!(out, "{}", line.display());
        let _ = out.flush();
    }
}

/// Renders lines `[rendered..]` of `lines` and returns the new cursor.
pub(crate) fn render_new_lines(view: &mut dyn LogView, lines: &[LogLine], rendered: usize) -> usize {
    for line in lines.iter().skip(rendered) {
        view.append(line);
    }
    lines.len().max(rendered)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Keeps rendered lines for assertions.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct RecordingLogView {
        pub(crate) lines: Vec<String>,
    }

    impl LogView for RecordingLogView {
        fn append(&mut self, line: &LogLine) {
            self.lines.push(line.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingLogView;
    use super::*;
    use fem_shell_core::Origin;

    #[test]
    fn only_unrendered_lines_are_appended() {
        let lines = vec![
            LogLine::runner("Loaded file: model.pro"),
            LogLine::new(Origin::Stdout, "step 1"),
            LogLine::new(Origin::Stderr, "warning"),
        ];
        let mut view = RecordingLogView::default();

        let cursor = render_new_lines(&mut view, &lines[..1], 0);
        let cursor = render_new_lines(&mut view, &lines, cursor);
        let cursor = render_new_lines(&mut view, &lines, cursor);

        assert_eq!(cursor, 3);
        assert_eq!(
            view.lines,
            vec!["-- Loaded file: model.pro", "step 1", "! warning"]
        );
    }
}
