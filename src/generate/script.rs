use std::sync::Arc;

use crate::llm::ChatModel;
use crate::session::SessionId;
use crate::store::VectorStore;

use super::{fill_template, format_context, Generation};

/// Prefix of the text returned in place of a script when sentinel errors are
/// enabled. Starts with `#` so the result is still a valid Python comment.
pub const SCRIPT_SENTINEL_PREFIX: &str = "# SCRIPT_GENERATION_ERROR: ";

const SCRIPT_PROMPT: &str = r#"You are a Senior QA Automation Engineer. Write a Python Selenium script.

BUSINESS RULES:
{context}

TEST CASE:
{test_case}

HTML SOURCE:
{html_content}

REQUIREMENTS:
1. Use 'webdriver_manager' and 'headless' Chrome options.
2. Use robust selectors (ID, Name) taken strictly from the provided HTML.
3. Base assertions on the business rules above.
4. If the rules and the HTML disagree, use the selectors from the HTML and note the conflict in a code comment.
5. Return ONLY the Python code. No markdown backticks.
"#;

/// Generates a Selenium script for one test case against a session's HTML.
pub struct ScriptGenerator {
    store: Arc<VectorStore>,
    chat: Arc<dyn ChatModel>,
    k: usize,
}

impl ScriptGenerator {
    pub fn new(store: Arc<VectorStore>, chat: Arc<dyn ChatModel>, k: usize) -> Self {
        Self { store, chat, k }
    }

    pub async fn generate(&self, session: &SessionId, test_case: &str, html: &str) -> Generation {
        let preview: String = test_case.chars().take(30).collect();
        tracing::info!(session = %session, test_case = %preview, "generating script");

        let collection = session.collection_name();
        let chunks = match self
            .store
            .similarity_search(&collection, test_case, self.k)
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

        let context = format_context(&chunks, false);
        let prompt = fill_template(
            SCRIPT_PROMPT,
            &[
                ("context", context.as_str()),
                ("test_case", test_case),
                ("html_content", html),
            ],
        );

        match self.chat.complete(&prompt).await {
            Ok(code) => Generation::Generated(code),
            Err(e) => {
                tracing::error!(session = %session, model = %self.chat.describe(), error = %e, "script generation failed");
                Generation::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::models::Chunk;
    use crate::store::memory::InMemoryIndex;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoSelectors {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for EchoSelectors {
        fn describe(&self) -> String {
            "test/echo".to_string()
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut code = String::from("from selenium import webdriver\n");
            if prompt.contains("id=\"discount-input\"") {
                code.push_str("driver.find_element(By.ID, \"discount-input\")\n");
            }
            Ok(code)
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_html_verbatim_and_top_two_rules() {
        let session = SessionId::parse("sc1").unwrap();
        let store = Arc::new(VectorStore::new(
            Arc::new(HashProvider::new(128)),
            Arc::new(InMemoryIndex::new()),
            8,
        ));
        let chunks: Vec<Chunk> = ["discount code SAVE10 gives ten percent", "discount codes expire", "shipping rules"]
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                id: format!("c{}", i),
                source: "/u/rules.md".to_string(),
                file_name: "rules.md".to_string(),
                chunk_index: i as i64,
                text: text.to_string(),
                hash: String::new(),
            })
            .collect();
        store
            .add_chunks(&session.collection_name(), &chunks)
            .await
            .unwrap();

        let chat = Arc::new(EchoSelectors {
            prompts: Mutex::new(Vec::new()),
        });
        let generator = ScriptGenerator::new(store, chat.clone(), 2);
        let html = r#"<form><input id="discount-input" name="code"></form>"#;

        let result = generator
            .generate(&session, "Apply discount code SAVE10", html)
            .await;
        match result {
            Generation::Generated(code) => assert!(code.contains("discount-input")),
            other => panic!("expected script, got {:?}", other),
        }

        let prompts = chat.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains(html));
        assert!(prompt.contains("webdriver_manager"));
        assert!(prompt.contains("Return ONLY the Python code"));
        assert!(prompt.contains("discount codes expire"));
        assert!(!prompt.contains("shipping rules"));
    }
}
