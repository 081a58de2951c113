use std::sync::Arc;

use crate::llm::ChatModel;
use crate::session::SessionId;
use crate::store::VectorStore;

use super::{fill_template, format_context, Generation};

/// Text returned in place of a test plan when sentinel errors are enabled.
pub const TEST_PLAN_SENTINEL: &str =
    "Error generating test cases. Please ensure documents are uploaded.";

const TEST_PLAN_PROMPT: &str = r#"You are an expert QA Automation Lead. Generate comprehensive test cases strictly based on the provided documentation.

CONTEXT:
{context}

REQUEST:
{question}

OUTPUT:
Return a Markdown table with columns: | Test Case ID | Feature | Test Scenario | Expected Result | Source Document |
Fill the Source Document column from the Source label of the snippet each case is based on.
"#;

/// Generates a markdown test-case table grounded in a session's documents.
pub struct TestPlanGenerator {
    store: Arc<VectorStore>,
    chat: Arc<dyn ChatModel>,
    k: usize,
}

impl TestPlanGenerator {
    pub fn new(store: Arc<VectorStore>, chat: Arc<dyn ChatModel>, k: usize) -> Self {
        Self { store, chat, k }
    }

    pub async fn generate(&self, session: &SessionId, query: &str) -> Generation {
        tracing::info!(session = %session, query, "generating test plan");

        let collection = session.collection_name();
        let chunks = match self
            .store
            .similarity_search(&collection, query, self.k)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!(session = %session, error = %e, "retrieval failed");
                return Generation::Failed {
                    reason: format!("retrieval failed: {}", e),
                };
            }
        };
        if chunks.is_empty() {
            tracing::warn!(session = %session, "no context retrieved; generating without documents");
        }

        let context = format_context(&chunks, true);
        let prompt = fill_template(
            TEST_PLAN_PROMPT,
            &[("context", context.as_str()), ("question", query)],
        );

        match self.chat.complete(&prompt).await {
            Ok(text) => Generation::Generated(text),
            Err(e) => {
                tracing::error!(session = %session, model = %self.chat.describe(), error = %e, "test plan generation failed");
                Generation::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
