/// Where a piece of log text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The computation's standard output.
    Stdout,
    /// The computation's standard error.
    Stderr,
    /// Text synthesized by the shell or the job runner.
    Runner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub origin: Origin,
    pub text: String,
}

impl LogLine {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
        }
    }

    pub fn runner(text: impl Into<String>) -> Self {
        Self::new(Origin::Runner, text)
    }

    /// Line as it appears in the viewer and in saved logs.
    pub fn display(&self) -> String {
        match self.origin {
            Origin::Stdout => self.text.clone(),
            Origin::Stderr => format!("! {}", self.text),
            Origin::Runner => format!("-- {}", self.text),
        }
    }
}

/// Turns output fragments into complete display lines.
///
/// At most one unfinished line is held at a time. A fragment from another
/// origin first completes the pending one, so lines come out in the order
/// their fragments arrived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineAssembler {
    pending: Option<LogLine>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `fragment` and returns every line it completes, in order.
    pub fn push(&mut self, origin: Origin, fragment: &str) -> Vec<LogLine> {
        let mut completed = Vec::new();
        if fragment.is_empty() {
            return completed;
        }
        if self.pending.as_ref().is_some_and(|line| line.origin != origin) {
            completed.extend(self.flush());
        }

        let mut rest = fragment;
        while let Some(pos) = rest.find('\n') {
            let mut line = self
                .pending
                .take()
                .unwrap_or_else(|| LogLine::new(origin, String::new()));
            line.text.push_str(&rest[..pos]);
            if line.text.ends_with('\r') {
                line.text.pop();
            }
            completed.push(line);
            rest = &rest[pos + 1..];
        }
        if !rest.is_empty() {
            self.pending
                .get_or_insert_with(|| LogLine::new(origin, String::new()))
                .text
                .push_str(rest);
        }
        completed
    }

    /// Emits the unfinished line, if any.
    pub fn flush(&mut self) -> Vec<LogLine> {
        self.pending.take().into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}
