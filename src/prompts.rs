//! Prompt templates.
//!
//! Three prompts drive generation: the code-expert analysis, the
//! tool-using reasoning prompt (agentic mode), and the docs-expert prompt
//! that turns an analysis into markdown.

use agentic_docs_core::react::{ACTION, ACTION_INPUT, FINAL_ANSWER, OBSERVATION};

pub fn code_expert(code: &str, context: &str) -> String {
    format!(
        r#"You are a Senior Python Engineer (Code Expert).
Analyze the following Python code and its context to understand its behavior, parameters, return values, and potential exceptions.

Context (related symbols):
{context}

Code to Analyze:
```python
{code}
```

Provide a detailed technical analysis including:
1. Summary of functionality.
2. Parameters (name, type, description).
3. Return value (type, description).
4. Exceptions raised.
5. Usage examples.

Analysis:
"#,
        context = or_none(context),
        code = code,
    )
}

/// Subject text handed to the reasoning loop in agentic mode.
pub fn agent_subject(qualname: &str, code: &str, context: &str) -> String {
    format!(
        "Analyze `{qualname}` for API documentation: behavior, parameters, return value, exceptions and usage.\n\nRelated symbols:\n{context}\n\nCode:\n```python\n{code}\n```",
        qualname = qualname,
        context = or_none(context),
        code = code,
    )
}

/// One turn of the reasoning loop.
pub fn react(subject: &str, tools: &[(String, String)], scratchpad: &str) -> String {
    let tool_lines = tools
        .iter()
        .map(|(name, description)| format!("- {}: {}", name, description))
        .collect::<Vec<_>>()
        .join("\n");
    let tool_names = tools
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a code analyst with access to these tools:
{tool_lines}

Use exactly this format:

Thought: what you need to find out
{ACTION} one of [{tool_names}]
{ACTION_INPUT} the single argument for the tool
{OBSERVATION} the tool result (provided to you, never write it yourself)
... (Thought/Action/Action Input/Observation can repeat)
Thought: I now know enough
{FINAL_ANSWER} the complete technical analysis

Task:
{subject}

{scratchpad}"#,
    )
}

pub fn docs_expert(analysis: &str, existing_docs: &str) -> String {
    format!(
        r#"You are a Technical Writer (Documentation Expert).
Generate Markdown API documentation based on the technical analysis provided by the Code Expert.

Technical Analysis:
{analysis}

Existing Documentation (if any):
{existing}

Use this structure:
### `SymbolName`

**Summary**
...

**Parameters**
- `name` (type): description

**Returns**
- (type): description

**Raises**
- `Exception`: description

**Examples**
```python
...
```

**See also**
...

Output ONLY the Markdown content. No reasoning, no conversational text, and do not wrap the output in a code fence.
"#,
        analysis = analysis,
        existing = or_none(existing_docs),
    )
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "(none)"
    } else {
        text
    }
}

/// Remove a single enclosing ```` ```markdown ```` (or bare ```` ``` ````) fence.
pub fn strip_markdown_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some((lang, body)) = rest.split_once('\n') else {
        return trimmed;
    };
    if !matches!(lang.trim(), "" | "markdown" | "md") {
        return trimmed;
    }
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}
