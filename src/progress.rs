//! Run progress reporting.
//!
//! Reports what a generation run is doing so users see how many symbols
//! were found, which one is being documented, and how the run ended.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use crate::orchestrator::RunSummary;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    Indexed {
        files: usize,
        skipped: usize,
        symbols: usize,
    },
    Embedded {
        count: usize,
    },
    SymbolStarted {
        n: usize,
        total: usize,
        qualname: String,
    },
    /// `outcome` is `created`, `appended`, `replaced` or `failed`.
    SymbolFinished {
        n: usize,
        total: usize,
        qualname: String,
        outcome: String,
        error: Option<String>,
    },
    RunFinished {
        summary: RunSummary,
    },
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: `[  3/120] pkg.mod.Foo.bar  replaced`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Indexed {
                files,
                skipped,
                symbols,
            } => {
                if *skipped > 0 {
                    format!(
                        "indexed {} files ({} skipped), {} symbols\n",
                        format_number(*files as u64),
                        format_number(*skipped as u64),
                        format_number(*symbols as u64)
                    )
                } else {
                    format!(
                        "indexed {} files, {} symbols\n",
                        format_number(*files as u64),
                        format_number(*symbols as u64)
                    )
                }
            }
            ProgressEvent::Embedded { count } => {
                format!("embedded {} symbols\n", format_number(*count as u64))
            }
            ProgressEvent::SymbolStarted { n, total, qualname } => {
                let width = total.to_string().len();
                format!("[{:>width$}/{}] {}  generating...\n", n, total, qualname)
            }
            ProgressEvent::SymbolFinished {
                n,
                total,
                qualname,
                outcome,
                error,
            } => {
                let width = total.to_string().len();
                match error {
                    Some(error) => format!(
                        "[{:>width$}/{}] {}  {}: {}\n",
                        n, total, qualname, outcome, error
                    ),
                    None => format!("[{:>width$}/{}] {}  {}\n", n, total, qualname, outcome),
                }
            }
            ProgressEvent::RunFinished { summary } => format!(
                "{}: {} created, {} appended, {} replaced, {} unchanged, {} failed\n",
                if summary.interrupted {
                    "interrupted"
                } else {
                    "done"
                },
                summary.created,
                summary.appended,
                summary.replaced,
                summary.unchanged,
                summary.failed
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Indexed {
                files,
                skipped,
                symbols,
            } => serde_json::json!({
                "event": "indexed",
                "files": files,
                "skipped": skipped,
                "symbols": symbols
            }),
            ProgressEvent::Embedded { count } => serde_json::json!({
                "event": "embedded",
                "count": count
            }),
            ProgressEvent::SymbolStarted { n, total, qualname } => serde_json::json!({
                "event": "symbol_started",
                "n": n,
                "total": total,
                "qualname": qualname
            }),
            ProgressEvent::SymbolFinished {
                n,
                total,
                qualname,
                outcome,
                error,
            } => serde_json::json!({
                "event": "symbol_finished",
                "n": n,
                "total": total,
                "qualname": qualname,
                "outcome": outcome,
                "error": error
            }),
            ProgressEvent::RunFinished { summary } => serde_json::json!({
                "event": "run_finished",
                "summary": summary
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
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

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
