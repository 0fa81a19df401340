//! Generation Worker Pool.
//!
//! [`Generator::generate`] documents one symbol:
//!
//! ```text
//! read span ─▶ retrieve context ─▶ analysis ─▶ existing section ─▶ docs ─▶ merge
//!                (errors → empty)    direct or
//!                                    reasoning loop
//! ```
//!
//! [`GenerationPool::run`] fans that out over every non-module symbol. With
//! one worker, symbols run strictly in order; with more, each symbol is a
//! spawned task gated by a semaphore and completes in any order. A failed
//! task is reported and never affects its siblings.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use agentic_docs_core::models::Symbol;

use crate::agent::{LoopOutcome, ReasoningLoop};
use crate::budget::BudgetExhausted;
use crate::error::TaskError;
use crate::llm::LanguageModel;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::prompts;
use crate::retriever::{format_context, ContextRetriever};
use crate::tools::ToolRegistry;
use crate::writer::{MarkdownWriter, WriteOutcome};

/// Everything one generation task needs. Shared read-only by all workers.
pub struct Generator {
    pub retriever: Arc<ContextRetriever>,
    pub model: Arc<dyn LanguageModel>,
    pub tools: Arc<ToolRegistry>,
    pub writer: Arc<MarkdownWriter>,
    /// Neighbors retrieved per symbol.
    pub k: usize,
    pub agentic: bool,
    pub max_steps: usize,
}

impl Generator {
    pub async fn generate(&self, symbol: &Symbol) -> Result<WriteOutcome, TaskError> {
        let file_text = tokio::fs::read_to_string(&symbol.file)
            .await
            .map_err(|e| TaskError::Source {
                symbol: symbol.qualname.clone(),
                error: e.into(),
            })?;
        let code = symbol.span_text(&file_text);

        let neighbors = match self.retriever.retrieve(symbol, self.k).await {
            Ok(neighbors) => neighbors,
            Err(e) => {
                tracing::warn!(symbol = %symbol.qualname, error = %e, "retrieval failed; continuing without context");
                Vec::new()
            }
        };
        let context = format_context(&neighbors);

        let analysis = self.analyze(symbol, &code, &context).await?;

        let target = self.writer.target_path(Path::new(&symbol.file));
        let merge_error = |error: anyhow::Error| TaskError::Merge {
            symbol: symbol.qualname.clone(),
            path: target.display().to_string(),
            error,
        };

        let existing = self
            .writer
            .read_section(&target, &symbol.symbol_id)
            .await
            .map_err(merge_error)?;
        let existing_body = existing.as_ref().map(|s| s.body()).unwrap_or("");

        let output = self
            .model
            .complete(&prompts::docs_expert(&analysis, existing_body))
            .await
            .map_err(|e| model_error(symbol, e))?;
        let docs = prompts::strip_markdown_fence(&output);
        if docs.is_empty() {
            return Err(TaskError::ModelCall {
                symbol: symbol.qualname.clone(),
                error: anyhow::anyhow!("model returned empty documentation"),
            });
        }

        self.writer
            .write_section(&target, &symbol.symbol_id, docs, &symbol.content_hash)
            .await
            .map_err(|e| TaskError::Merge {
                symbol: symbol.qualname.clone(),
                path: target.display().to_string(),
                error: e,
            })
    }

    async fn analyze(&self, symbol: &Symbol, code: &str, context: &str) -> Result<String, TaskError> {
        if self.agentic {
            let subject = prompts::agent_subject(&symbol.qualname, code, context);
            let transcript = ReasoningLoop::new(self.model.as_ref(), &self.tools, self.max_steps)
                .run(&subject)
                .await
                .map_err(|e| model_error(symbol, e))?;
            tracing::debug!(
                symbol = %symbol.qualname,
                steps = transcript.steps,
                tool_calls = transcript.tool_calls.len(),
                "reasoning loop finished"
            );
            match transcript.outcome {
                LoopOutcome::Final(answer) => return Ok(answer),
                LoopOutcome::Exhausted => {
                    tracing::warn!(symbol = %symbol.qualname, "reasoning loop exhausted; falling back to direct analysis");
                }
            }
        }

        self.model
            .complete(&prompts::code_expert(code, context))
            .await
            .map_err(|e| model_error(symbol, e))
    }
}

fn model_error(symbol: &Symbol, error: anyhow::Error) -> TaskError {
    match error.downcast_ref::<BudgetExhausted>() {
        Some(exhausted) => TaskError::Budget {
            symbol: symbol.qualname.clone(),
            used: exhausted.used,
            limit: exhausted.limit,
        },
        None => TaskError::ModelCall {
            symbol: symbol.qualname.clone(),
            error,
        },
    }
}

/// Outcome of one symbol's task.
#[derive(Debug)]
pub struct TaskReport {
    pub symbol_id: String,
    pub qualname: String,
    pub result: Result<WriteOutcome, TaskError>,
}

/// Running counts, readable while the pool is still working.
#[derive(Debug, Default)]
pub struct Tally {
    pub created: AtomicUsize,
    pub appended: AtomicUsize,
    pub replaced: AtomicUsize,
    pub failed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    pub created: usize,
    pub appended: usize,
    pub replaced: usize,
    pub failed: usize,
}

impl Tally {
    fn record(&self, result: &Result<WriteOutcome, TaskError>) {
        let counter = match result {
            Ok(WriteOutcome::Created) => &self.created,
            Ok(WriteOutcome::Appended) => &self.appended,
            Ok(WriteOutcome::Replaced) => &self.replaced,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            created: self.created.load(Ordering::SeqCst),
            appended: self.appended.load(Ordering::SeqCst),
            replaced: self.replaced.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

pub struct GenerationPool {
    generator: Arc<Generator>,
    workers: usize,
    progress: Arc<dyn ProgressReporter>,
    tally: Arc<Tally>,
}

impl GenerationPool {
    pub fn new(generator: Arc<Generator>, workers: usize, progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            generator,
            workers,
            progress,
            tally: Arc::new(Tally::default()),
        }
    }

    pub fn tally(&self) -> Arc<Tally> {
        Arc::clone(&self.tally)
    }

    /// Generate documentation for every non-module symbol and wait for all
    /// tasks to finish.
    pub async fn run(&self, symbols: Vec<Symbol>) -> Vec<TaskReport> {
        let symbols: Vec<Symbol> = symbols.into_iter().filter(|s| !s.is_module()).collect();
        let total = symbols.len();
        let finished = Arc::new(AtomicUsize::new(0));

        tracing::info!(count = total, workers = self.workers, "generating documentation");

        if self.workers <= 1 {
            let mut reports = Vec::with_capacity(total);
            for (idx, symbol) in symbols.into_iter().enumerate() {
                let report = run_task(
                    &self.generator,
                    symbol,
                    idx + 1,
                    total,
                    &finished,
                    self.progress.as_ref(),
                    &self.tally,
                )
                .await;
                reports.push(report);
            }
            return reports;
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(total);

        for (idx, symbol) in symbols.into_iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let generator = Arc::clone(&self.generator);
            let progress = Arc::clone(&self.progress);
            let tally = Arc::clone(&self.tally);
            let finished = Arc::clone(&finished);
            let symbol_id = symbol.symbol_id.clone();
            let qualname = symbol.qualname.clone();

            let handle = tokio::spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let result = Err(TaskError::Aborted {
                            symbol: symbol.qualname.clone(),
                            message: format!("semaphore closed: {}", e),
                        });
                        tally.record(&result);
                        return TaskReport {
                            symbol_id: symbol.symbol_id,
                            qualname: symbol.qualname,
                            result,
                        };
                    }
                };
                run_task(&generator, symbol, idx + 1, total, &finished, progress.as_ref(), &tally)
                    .await
            });
            handles.push((symbol_id, qualname, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (symbol_id, qualname, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(symbol = %qualname, error = %e, "generation task panicked");
                    let result = Err(TaskError::Aborted {
                        symbol: qualname.clone(),
                        message: e.to_string(),
                    });
                    self.tally.record(&result);
                    reports.push(TaskReport {
                        symbol_id,
                        qualname,
                        result,
                    });
                }
            }
        }
        reports
    }
}

async fn run_task(
    generator: &Generator,
    symbol: Symbol,
    n: usize,
    total: usize,
    finished: &AtomicUsize,
    progress: &dyn ProgressReporter,
    tally: &Tally,
) -> TaskReport {
    progress.report(ProgressEvent::SymbolStarted {
        n,
        total,
        qualname: symbol.qualname.clone(),
    });

    let result = generator.generate(&symbol).await;
    tally.record(&result);
    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;

    match &result {
        Ok(outcome) => {
            tracing::info!(symbol = %symbol.qualname, outcome = outcome.as_str(), "section written");
            progress.report(ProgressEvent::SymbolFinished {
                n: done,
                total,
                qualname: symbol.qualname.clone(),
                outcome: outcome.as_str().to_string(),
                error: None,
            });
        }
        Err(e) => {
            tracing::warn!(symbol = %symbol.qualname, kind = e.kind(), error = %e, "generation failed");
            progress.report(ProgressEvent::SymbolFinished {
                n: done,
                total,
                qualname: symbol.qualname.clone(),
                outcome: "failed".to_string(),
                error: Some(e.to_string()),
            });
        }
    }

    TaskReport {
        symbol_id: symbol.symbol_id,
        qualname: symbol.qualname,
        result,
    }
}
