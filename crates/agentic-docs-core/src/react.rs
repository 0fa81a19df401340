//! Parser for one step of reasoning-loop model output.
//!
//! The loop asks the model to answer in a thought/action/observation
//! format:
//!
//! ```text
//! Thought: I should look at the caller.
//! Action: read_file
//! Action Input: src/pkg/mod.py
//! ```
//!
//! or, once it is done:
//!
//! ```text
//! Final Answer: <analysis>
//! ```
//!
//! [`parse_step`] turns raw output into a [`Step`]. A final-answer marker
//! wins over any action directive in the same output.

use std::sync::LazyLock;

use regex::Regex;

pub const FINAL_ANSWER: &str = "Final Answer:";
pub const ACTION: &str = "Action:";
pub const ACTION_INPUT: &str = "Action Input:";
pub const OBSERVATION: &str = "Observation:";

static FINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)final\s+answer\s*:").expect("valid regex"));
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*action\s*:[ \t]*(.*)$").expect("valid regex"));
static ACTION_INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*action\s+input\s*:[ \t]*").expect("valid regex"));
static OBSERVATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*observation\s*:").expect("valid regex"));

/// The interpretation of one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Everything after the final-answer marker.
    Final(String),
    /// A tool request.
    Action { tool: String, input: String },
    /// No marker and no directive; the caller decides what to do with it.
    Unstructured(String),
}

/// Cut model output at the first line starting with `Observation:`.
///
/// Models sometimes invent the observation for the tool they just
/// requested; only the loop may supply observations.
pub fn strip_invented_observation(output: &str) -> &str {
    match OBSERVATION_RE.find(output) {
        Some(m) => &output[..m.start()],
        None => output,
    }
}

/// Classify raw model output.
pub fn parse_step(output: &str) -> Step {
    if let Some(m) = FINAL_RE.find(output) {
        return Step::Final(output[m.end()..].trim().to_string());
    }

    let output = strip_invented_observation(output);
    let Some(caps) = ACTION_RE.captures(output) else {
        return Step::Unstructured(output.trim().to_string());
    };
    let tool = clean_token(caps.get(1).map_or("", |m| m.as_str()));
    if tool.is_empty() {
        return Step::Unstructured(output.trim().to_string());
    }

    let input = ACTION_INPUT_RE
        .find(output)
        .map(|m| clean_token(output[m.end()..].lines().next().unwrap_or("")))
        .unwrap_or_default();

    Step::Action { tool, input }
}

fn clean_token(raw: &str) -> String {
    let t = raw.trim();
    let t = t
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(t);
    let t = t
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| t.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(t);
    t.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_answer_wins() {
        let out = "Thought: done\nAction: read_file\nFinal Answer: It adds numbers.";
        assert_eq!(parse_step(out), Step::Final("It adds numbers.".into()));
    }

    #[test]
    fn final_answer_keeps_multiline_body() {
        let out = "Final Answer:\n## add\n\nReturns x + y.\n";
        assert_eq!(parse_step(out), Step::Final("## add\n\nReturns x + y.".into()));
    }

    #[test]
    fn action_with_input() {
        let out = "Thought: need source\nAction: read_file\nAction Input: \"src/pkg/a.py\"\n";
        assert_eq!(
            parse_step(out),
            Step::Action {
                tool: "read_file".into(),
                input: "src/pkg/a.py".into()
            }
        );
    }

    #[test]
    fn action_input_line_is_not_mistaken_for_action() {
        let out = "Action Input: foo\nAction: search_code\n";
        match parse_step(out) {
            Step::Action { tool, .. } => assert_eq!(tool, "search_code"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invented_observation_is_dropped() {
        let out = "Action: list_directory\nAction Input: src\nObservation: [FILE] fake.py\n";
        assert_eq!(
            parse_step(out),
            Step::Action {
                tool: "list_directory".into(),
                input: "src".into()
            }
        );
    }

    #[test]
    fn missing_input_is_empty() {
        let out = "Action: `list_directory`";
        assert_eq!(
            parse_step(out),
            Step::Action {
                tool: "list_directory".into(),
                input: String::new()
            }
        );
    }

    #[test]
    fn plain_text_is_unstructured() {
        let out = "This function adds two integers.";
        assert_eq!(parse_step(out), Step::Unstructured(out.into()));
    }
}
