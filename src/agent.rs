//! Reasoning Loop: a bounded think/act/observe cycle.
//!
//! ```text
//! Thinking ──final answer──────────────▶ Final
//!    │  ▲
//!    │  └── Observing ◀── ToolCall ◀── action directive
//!    │
//!    └── step bound reached ───────────▶ Exhausted (EXHAUSTED_SENTINEL)
//! ```
//!
//! Each Thinking step is one model call. Tool failures and unknown tool
//! names become observations; only a failed model call ends the loop with
//! an error. Output with neither a final answer nor an action directive
//! is taken as the final answer.

use anyhow::Result;

use agentic_docs_core::react::{parse_step, strip_invented_observation, Step, OBSERVATION};

use crate::llm::LanguageModel;
use crate::prompts;
use crate::tools::ToolRegistry;

/// Result text of a loop that hit its step bound.
pub const EXHAUSTED_SENTINEL: &str =
    "Error: reasoning loop stopped after reaching its step limit without a final answer.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    Final(String),
    Exhausted,
}

impl LoopOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Final(text) => text,
            Self::Exhausted => EXHAUSTED_SENTINEL,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}

/// One tool invocation made during a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub tool: String,
    pub input: String,
    pub observation: String,
}

/// Everything one invocation of the loop produced. Never shared.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub scratchpad: String,
    /// Model calls made.
    pub steps: usize,
    pub tool_calls: Vec<ToolCall>,
    pub outcome: LoopOutcome,
}

pub struct ReasoningLoop<'a> {
    model: &'a dyn LanguageModel,
    tools: &'a ToolRegistry,
    max_steps: usize,
}

impl<'a> ReasoningLoop<'a> {
    pub fn new(model: &'a dyn LanguageModel, tools: &'a ToolRegistry, max_steps: usize) -> Self {
        Self {
            model,
            tools,
            max_steps: max_steps.max(1),
        }
    }

    pub async fn run(&self, subject: &str) -> Result<Transcript> {
        let descriptions = self.tools.describe();
        let mut scratchpad = String::new();
        let mut tool_calls = Vec::new();

        for step in 1..=self.max_steps {
            let prompt = prompts::react(subject, &descriptions, &scratchpad);
            let output = self.model.complete(&prompt).await?;
            let output = strip_invented_observation(&output);
            scratchpad.push_str(output.trim_end());
            scratchpad.push('\n');

            match parse_step(output) {
                Step::Final(answer) => {
                    tracing::debug!(step, "reasoning loop reached a final answer");
                    return Ok(finalize(scratchpad, step, tool_calls, LoopOutcome::Final(answer)));
                }
                Step::Unstructured(text) => {
                    // Neither a directive nor a final answer: stop rather than fail.
                    tracing::debug!(step, "model output had no directive; using it as the answer");
                    return Ok(finalize(scratchpad, step, tool_calls, LoopOutcome::Final(text)));
                }
                Step::Action { tool, input } => {
                    let outcome = self.tools.invoke(&tool, &input).await;
                    let observation = outcome.observation();
                    tracing::debug!(step, tool = %tool, error = outcome.is_error(), "tool invoked");

                    scratchpad.push_str(OBSERVATION);
                    scratchpad.push(' ');
                    scratchpad.push_str(&observation);
                    scratchpad.push('\n');
                    tool_calls.push(ToolCall {
                        tool,
                        input,
                        observation,
                    });
                }
            }
        }

        tracing::warn!(
            max_steps = self.max_steps,
            tool_calls = tool_calls.len(),
            "reasoning loop reached its step limit without a final answer"
        );
        Ok(finalize(scratchpad, self.max_steps, tool_calls, LoopOutcome::Exhausted))
    }
}

fn finalize(scratchpad: String, steps: usize, tool_calls: Vec<ToolCall>, outcome: LoopOutcome) -> Transcript {
    Transcript {
        scratchpad,
        steps,
        tool_calls,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned responses and records every prompt.
    struct Scripted {
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.responses.lock().unwrap().pop() {
                Some(r) => Ok(r),
                None => bail!("script exhausted"),
            }
        }
    }

    fn registry() -> (TempDir, ToolRegistry) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.py"), "def f():\n    return 1\n").unwrap();
        let registry = ToolRegistry::with_builtins(tmp.path());
        (tmp, registry)
    }

    #[tokio::test]
    async fn tool_then_final() {
        let (_tmp, tools) = registry();
        let model = Scripted::new(&[
            "Thought: read it\nAction: read_file\nAction Input: a.py",
            "Thought: done\nFinal Answer: f returns 1.",
        ]);

        let transcript = ReasoningLoop::new(&model, &tools, 5).run("Analyze f").await.unwrap();
        assert_eq!(transcript.outcome, LoopOutcome::Final("f returns 1.".into()));
        assert_eq!(transcript.steps, 2);
        assert_eq!(transcript.tool_calls.len(), 1);
        assert_eq!(transcript.tool_calls[0].observation, "def f():\n    return 1\n");

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[1].contains("Observation: def f():"));
    }

    #[tokio::test]
    async fn unknown_tool_is_observed_and_loop_continues() {
        let (_tmp, tools) = registry();
        let model = Scripted::new(&[
            "Action: shell\nAction Input: rm -rf /",
            "Final Answer: ok",
        ]);

        let transcript = ReasoningLoop::new(&model, &tools, 5).run("x").await.unwrap();
        assert!(transcript.outcome.is_final());
        assert!(transcript.tool_calls[0]
            .observation
            .contains("Available tools: read_file, list_directory, search_code"));
    }

    #[tokio::test]
    async fn tool_failure_becomes_observation() {
        let (_tmp, tools) = registry();
        let model = Scripted::new(&["Action: read_file\nAction Input: missing.py", "Final Answer: done"]);

        let transcript = ReasoningLoop::new(&model, &tools, 5).run("x").await.unwrap();
        assert!(transcript.tool_calls[0].observation.starts_with("Error: "));
        assert_eq!(transcript.outcome.text(), "done");
    }

    #[tokio::test]
    async fn unstructured_output_is_the_answer() {
        let (_tmp, tools) = registry();
        let model = Scripted::new(&["It returns one."]);
        let transcript = ReasoningLoop::new(&model, &tools, 5).run("x").await.unwrap();
        assert_eq!(transcript.outcome, LoopOutcome::Final("It returns one.".into()));
        assert_eq!(transcript.steps, 1);
    }

    #[tokio::test]
    async fn step_limit_keeps_the_tool_history() {
        let (_tmp, tools) = registry();
        let model = Scripted::new(&[
            "Action: read_file\nAction Input: a.py",
            "Action: list_directory\nAction Input: .",
            "Final Answer: too late",
        ]);

        let transcript = ReasoningLoop::new(&model, &tools, 2).run("x").await.unwrap();
        assert_eq!(transcript.outcome, LoopOutcome::Exhausted);
        assert_eq!(transcript.steps, 2);
        let used: Vec<&str> = transcript.tool_calls.iter().map(|c| c.tool.as_str()).collect();
        assert_eq!(used, vec!["read_file", "list_directory"]);
        assert!(transcript.scratchpad.contains("Observation: def f():"));
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_step_bound_still_asks_once() {
        let (_tmp, tools) = registry();
        let model = Scripted::new(&["Final Answer: quick"]);
        let transcript = ReasoningLoop::new(&model, &tools, 0).run("x").await.unwrap();
        assert_eq!(transcript.outcome.text(), "quick");
        assert_eq!(transcript.steps, 1);
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let (_tmp, tools) = registry();
        let model = Scripted::new(&[]);
        assert!(ReasoningLoop::new(&model, &tools, 5).run("x").await.is_err());
    }
}
