//! Build progress reporting.
//!
//! Reports observable progress during `kb build` so users see which agent is
//! being processed, how many PDFs have been extracted, and how far embedding
//! has got. Progress is emitted on **stderr** so stdout remains parseable for
//! scripts.

use std::io::Write;

/// A single progress event for an index build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildProgressEvent {
    /// Walking the agent's PDF directory. Total unknown.
    Discovering { agent: String },
    /// n of total PDFs extracted and chunked.
    Extracting { agent: String, n: u64, total: u64 },
    /// n of total passages embedded.
    Embedding { agent: String, n: u64, total: u64 },
}

/// Reports build progress. Called from rayon workers, hence `Sync`.
pub trait BuildProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress on stderr: "build maaya  embedding  1,234 / 5,000 passages".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = match &event {
            BuildProgressEvent::Discovering { agent } => {
                format!("build {}  discovering...\n", agent)
            }
            BuildProgressEvent::Extracting { agent, n, total } => format!(
                "build {}  extracting  {} / {} pdfs\n",
                agent,
                format_number(*n),
                format_number(*total)
            ),
            BuildProgressEvent::Embedding { agent, n, total } => format!(
                "build {}  embedding  {} / {} passages\n",
                agent,
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        let obj = match &event {
            BuildProgressEvent::Discovering { agent } => serde_json::json!({
                "event": "progress",
                "agent": agent,
                "phase": "discovering"
            }),
            BuildProgressEvent::Extracting { agent, n, total } => serde_json::json!({
                "event": "progress",
                "agent": agent,
                "phase": "extracting",
                "n": n,
                "total": total
            }),
            BuildProgressEvent::Embedding { agent, n, total } => serde_json::json!({
                "event": "progress",
                "agent": agent,
                "phase": "embedding",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value; `auto` defers to [`ProgressMode::default_for_tty`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::default_for_tty()),
            "off" | "none" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
