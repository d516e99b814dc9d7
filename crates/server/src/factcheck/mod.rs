//! Fact-check pipeline
//!
//! Scans appended messages for genetics trigger terms and asynchronously
//! attaches an AI-generated fact-check annotation. Evaluation runs after
//! the message is durably appended and never blocks or fails a send;
//! dependency failures are absorbed with a static fallback response.

use crate::config::ChatServerConfig;
use crate::error::{ChatError, Result};
use crate::models::{FactCheck, Message};
use crate::store::JsonChatStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use genai::chat::{ChatMessage, ChatRequest};
use genai::Client as GenAiClient;

/// Terms that qualify a message for fact-checking. Matching is an exact
/// token membership test on whitespace-split, lower-cased content;
/// "genes" or "Gene-X" does not match "gene".
pub const TRIGGER_KEYWORDS: [&str; 8] = [
    "gene",
    "bioinformatics",
    "dna",
    "rna",
    "genome",
    "mutation",
    "protein",
    "sequence",
];

/// Response substituted when the model call fails or times out
pub const FALLBACK_RESPONSE: &str =
    "Unable to fact-check this message. Please try again later.";

/// Check if a message qualifies for fact-checking
pub fn contains_trigger_keyword(content: &str) -> bool {
    content
        .to_lowercase()
        .split_whitespace()
        .any(|word| TRIGGER_KEYWORDS.contains(&word))
}

fn build_prompt(content: &str) -> String {
    format!(
        "You are a fact-checking assistant. Analyze the following message and \
         provide a fact-checked response. If the message contains accurate \
         information, confirm it. If it contains inaccuracies, correct them. \
         Respond concisely and clearly: \"{}\"",
        content
    )
}

/// External text-generation capability used by the pipeline
#[async_trait]
pub trait FactChecker: Send + Sync {
    async fn fact_check(&self, content: &str) -> Result<String>;
}

/// GenAI-backed fact checker
pub struct GenAiFactChecker {
    client: GenAiClient,
    model: String,
}

impl GenAiFactChecker {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: GenAiClient::default(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl FactChecker for GenAiFactChecker {
    async fn fact_check(&self, content: &str) -> Result<String> {
        let chat_req = ChatRequest::new(vec![ChatMessage::user(build_prompt(content))]);

        info!("[FactCheck] Calling {} for response...", self.model);

        let response = self
            .client
            .exec_chat(&self.model, chat_req, None)
            .await
            .map_err(|e| ChatError::Dependency(e.to_string()))?;

        let text = response
            .first_text()
            .ok_or_else(|| ChatError::Dependency("model returned no text".into()))?;

        Ok(text.to_string())
    }
}

/// Fact-check pipeline manager
pub struct FactCheckManager {
    store: Arc<JsonChatStore>,
    checker: Arc<dyn FactChecker>,
    timeout: Duration,
}

impl FactCheckManager {
    pub fn new(store: Arc<JsonChatStore>, checker: Arc<dyn FactChecker>, timeout: Duration) -> Self {
        Self {
            store,
            checker,
            timeout,
        }
    }

    /// Manager backed by the configured GenAI model
    pub fn with_genai(config: &ChatServerConfig, store: Arc<JsonChatStore>) -> Self {
        Self::new(
            store,
            Arc::new(GenAiFactChecker::new(config.fact_check_model.clone())),
            config.fact_check_timeout,
        )
    }

    /// Evaluate a freshly appended message.
    ///
    /// Returns immediately; for a qualifying message a task is spawned that
    /// calls the model, falls back to a static response on failure, and
    /// persists + broadcasts the result to all room subscribers. Returns
    /// whether an evaluation was scheduled.
    pub fn process_message(&self, message: &Message) -> bool {
        if !contains_trigger_keyword(&message.content) {
            return false;
        }

        info!(
            "[FactCheck] Triggered in room {} by message {}",
            message.room_id, message.id
        );

        let store = self.store.clone();
        let checker = self.checker.clone();
        let timeout = self.timeout;
        let message = message.clone();

        tokio::spawn(async move {
            let response = match tokio::time::timeout(
                timeout,
                checker.fact_check(&message.content),
            )
            .await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => text,
                Ok(Ok(_)) => {
                    warn!(
                        "[FactCheck] Empty model response for message {}",
                        message.id
                    );
                    FALLBACK_RESPONSE.to_string()
                }
                Ok(Err(e)) => {
                    warn!("[FactCheck] {} (message {})", e, message.id);
                    FALLBACK_RESPONSE.to_string()
                }
                Err(_) => {
                    warn!(
                        "[FactCheck] Timed out after {:?} (message {})",
                        timeout, message.id
                    );
                    FALLBACK_RESPONSE.to_string()
                }
            };

            let fact_check = FactCheck::new(
                &message.room_id,
                &message.id,
                &message.content,
                response,
            );

            if let Err(e) = store.add_fact_check(fact_check).await {
                warn!(
                    "[FactCheck] Failed to store result for message {}: {}",
                    message.id, e
                );
            }
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatServerConfig;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    #[test]
    fn test_trigger_is_exact_token_match() {
        assert!(contains_trigger_keyword("Tell me about DNA"));
        assert!(contains_trigger_keyword("the gene is here"));
        assert!(contains_trigger_keyword("RNA world hypothesis"));

        // Substrings and decorated tokens do not match
        assert!(!contains_trigger_keyword("genes are plural"));
        assert!(!contains_trigger_keyword("Gene-X activated"));
        assert!(!contains_trigger_keyword("hello world"));
        assert!(!contains_trigger_keyword(""));
    }

    struct FailingChecker;

    #[async_trait]
    impl FactChecker for FailingChecker {
        async fn fact_check(&self, _content: &str) -> Result<String> {
            Err(ChatError::Dependency("model unavailable".into()))
        }
    }

    struct GatedChecker {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl FactChecker for GatedChecker {
        async fn fact_check(&self, _content: &str) -> Result<String> {
            self.release.notified().await;
            Ok("All accurate.".to_string())
        }
    }

    async fn setup() -> (TempDir, Arc<JsonChatStore>, Message) {
        let temp_dir = TempDir::new().unwrap();
        let config = ChatServerConfig::with_base_dir(temp_dir.path());
        let store = Arc::new(JsonChatStore::new(config).await.unwrap());
        let room = store.create_room("r", "t", "", "a").await.unwrap();
        let message = store
            .append_message(&room.id, "a", "Ay", "Tell me about dna")
            .await
            .unwrap();
        (temp_dir, store, message)
    }

    async fn wait_for_fact_check(store: &JsonChatStore, room_id: &str) -> Vec<FactCheck> {
        for _ in 0..200 {
            let checks = store.fact_checks(room_id).await.unwrap();
            if !checks.is_empty() {
                return checks;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fact-check never arrived");
    }

    #[tokio::test]
    async fn test_fallback_on_dependency_failure() {
        let (_dir, store, message) = setup().await;
        let manager = FactCheckManager::new(
            store.clone(),
            Arc::new(FailingChecker),
            Duration::from_secs(5),
        );

        assert!(manager.process_message(&message));

        let checks = wait_for_fact_check(&store, &message.room_id).await;
        assert_eq!(checks[0].message_id, message.id);
        assert_eq!(checks[0].fact_check_response, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_evaluation_does_not_block_caller() {
        let (_dir, store, message) = setup().await;
        let release = Arc::new(Notify::new());
        let manager = FactCheckManager::new(
            store.clone(),
            Arc::new(GatedChecker {
                release: release.clone(),
            }),
            Duration::from_secs(5),
        );

        // Returns while the model call is still pending
        assert!(manager.process_message(&message));
        assert!(store.fact_checks(&message.room_id).await.unwrap().is_empty());

        release.notify_one();
        let checks = wait_for_fact_check(&store, &message.room_id).await;
        assert_eq!(checks[0].fact_check_response, "All accurate.");
        assert_eq!(checks[0].original_message, message.content);
    }

    #[tokio::test]
    async fn test_non_qualifying_message_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config = ChatServerConfig::with_base_dir(temp_dir.path());
        let store = Arc::new(JsonChatStore::new(config).await.unwrap());
        let room = store.create_room("r", "t", "", "a").await.unwrap();
        let message = store
            .append_message(&room.id, "a", "Ay", "good morning everyone")
            .await
            .unwrap();

        let manager = FactCheckManager::new(
            store.clone(),
            Arc::new(FailingChecker),
            Duration::from_secs(5),
        );
        assert!(!manager.process_message(&message));
    }
}
