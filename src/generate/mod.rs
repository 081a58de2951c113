//! Retrieval-augmented generators.
//!
//! Both generators follow the same shape: retrieve the top-k chunks of the
//! session's collection, fill a fixed prompt template, and hand it to the
//! configured [`ChatModel`](crate::llm::ChatModel). The model's text is
//! returned verbatim.
//!
//! Failures are reported as [`Generation::Failed`] rather than as errors so
//! callers decide how to surface them: the HTTP server maps them to
//! `502 generation_failed`, or to the legacy sentinel strings when
//! `generation.sentinel_errors` is on.

mod script;
mod test_plan;

pub use script::{ScriptGenerator, SCRIPT_SENTINEL_PREFIX};
pub use test_plan::{TestPlanGenerator, TEST_PLAN_SENTINEL};

use crate::models::ScoredChunk;

/// Outcome of one generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// The model's output, untouched.
    Generated(String),
    /// Retrieval or the model call failed.
    Failed { reason: String },
}

impl Generation {
    pub fn is_generated(&self) -> bool {
        matches!(self, Generation::Generated(_))
    }
}

/// Join retrieved chunk texts with blank lines. When `labelled`, each
/// snippet is preceded by a `[Source: <file>]` line.
pub(crate) fn format_context(chunks: &[ScoredChunk], labelled: bool) -> String {
    chunks
        .iter()
        .map(|c| {
            if labelled {
                format!("[Source: {}]\n{}", c.file_name, c.text)
            } else {
                c.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Substitute `{name}` placeholders in a single pass, so placeholder-like
/// text inside substituted values is left alone. Unknown placeholders are
/// kept literally.
pub(crate) fn fill_template(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (*value, close))
        });
        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
