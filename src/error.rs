//! Per-symbol failure taxonomy.
//!
//! A [`TaskError`] fails one generation task and nothing else; the worker
//! pool records it and moves on. Run-wide failures (missing root, embedding
//! backend unreachable) stay plain `anyhow` errors and abort the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// The symbol's source span could not be read.
    #[error("cannot read source for {symbol}: {error:#}")]
    Source {
        symbol: String,
        error: anyhow::Error,
    },

    #[error("model call failed for {symbol}: {error:#}")]
    ModelCall {
        symbol: String,
        error: anyhow::Error,
    },

    #[error("token budget exhausted before {symbol} ({used}/{limit} tokens used)")]
    Budget { symbol: String, used: u64, limit: u64 },

    /// The document write failed; the file on disk is unchanged.
    #[error("cannot write section for {symbol} to {path}: {error:#}")]
    Merge {
        symbol: String,
        path: String,
        error: anyhow::Error,
    },

    /// The task panicked or was cancelled by the runtime.
    #[error("generation task for {symbol} aborted: {message}")]
    Aborted { symbol: String, message: String },
}

impl TaskError {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Source { symbol, .. }
            | Self::ModelCall { symbol, .. }
            | Self::Budget { symbol, .. }
            | Self::Merge { symbol, .. }
            | Self::Aborted { symbol, .. } => symbol,
        }
    }

    /// Short machine-readable category for progress output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Source { .. } => "source",
            Self::ModelCall { .. } => "model_call",
            Self::Budget { .. } => "budget",
            Self::Merge { .. } => "merge",
            Self::Aborted { .. } => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_symbol() {
        let err = TaskError::ModelCall {
            symbol: "pkg.mod.f".into(),
            error: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(err.to_string(), "model call failed for pkg.mod.f: connection refused");
        assert_eq!(err.symbol(), "pkg.mod.f");
        assert_eq!(err.kind(), "model_call");
    }
}
