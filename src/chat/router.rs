use super::prompts::{full_system_message, minimal_system_message, rag_message};
use super::{Conversation, Message, Role};
use crate::extractor::PageContent;
use crate::rag::{RagIndex, ScoredChunk};

const SUMMARY_KEYWORDS: &[&str] = &[
    "summarize",
    "summarise",
    "summary",
    "overview",
    "main points",
    "key points",
    "what is this about",
    "tl;dr",
    "tldr",
];

/// Case-insensitive keyword match; summaries always get the whole page
pub fn is_summary_request(message: &str) -> bool {
    let lowered = message.to_lowercase();
    SUMMARY_KEYWORDS.iter().any(|k| lowered.contains(k))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Full page in the system message, question unchanged
    FullContext,
    /// Minimal system message, question wrapped with retrieved sections
    Rag,
    /// Index ready but nothing relevant; question unchanged, context untouched
    Fallback,
}

/// Outbound turns for one user message
#[derive(Debug, Clone)]
pub struct RoutedQuery {
    pub strategy: Strategy,
    pub messages: Vec<Message>,
    pub hits: Vec<ScoredChunk>,
}

pub struct QueryRouter {
    top_k: usize,
}

impl QueryRouter {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Record `message` in the conversation and decide what to send.
    ///
    /// The conversation keeps the plain question; only the returned
    /// `messages` carry the retrieval block. The system message is swapped
    /// to match the chosen strategy, except on fallback.
    pub async fn route(
        &self,
        message: &str,
        page: &PageContent,
        index: &RagIndex,
        language: &str,
        conversation: &mut Conversation,
    ) -> RoutedQuery {
        conversation.push(Message::user(message));

        if is_summary_request(message) || !index.is_initialized() {
            conversation.set_system(full_system_message(page, language));
            log::debug!("routing with full page context");
            return RoutedQuery {
                strategy: Strategy::FullContext,
                messages: conversation.messages().to_vec(),
                hits: Vec::new(),
            };
        }

        let hits = index.search(message, self.top_k).await;
        if hits.is_empty() {
            log::debug!("no chunk above threshold, sending question as is");
            return RoutedQuery {
                strategy: Strategy::Fallback,
                messages: conversation.messages().to_vec(),
                hits,
            };
        }

        conversation.set_system(minimal_system_message(page, language));
        let mut messages = conversation.messages().to_vec();
        if let Some(last) = messages.last_mut().filter(|m| m.role == Role::User) {
            last.content = rag_message(message, &hits);
        }
        log::debug!("routing with {} retrieved sections", hits.len());

        RoutedQuery {
            strategy: Strategy::Rag,
            messages,
            hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::prompts::RAG_MARKER;
    use crate::config::RagConfig;
    use crate::embeddings::{EmbeddingClient, HashingEmbedding};
    use std::sync::Arc;

    fn page() -> PageContent {
        PageContent {
            url: "https://shop.test".into(),
            title: "Shop".into(),
            raw_text: "PAGE CONTENT:\n\
                # Pricing\nThe basic plan costs ten dollars per month and pricing scales with seats.\n\n\
                # Support\nOur support team answers tickets within one business day, weekends included."
                .into(),
            structural_hints: vec!["H1: Pricing".into()],
            description: None,
        }
    }

    fn index() -> RagIndex {
        let config = RagConfig::without_delays();
        let client = EmbeddingClient::new(Arc::new(HashingEmbedding::new(768)), &config);
        RagIndex::new(client, &config)
    }

    #[test]
    fn test_summary_keywords() {
        assert!(is_summary_request("Please SUMMARIZE this page"));
        assert!(is_summary_request("give me an overview"));
        assert!(is_summary_request("tl;dr?"));
        assert!(!is_summary_request("What does the author say about pricing?"));
    }

    #[tokio::test]
    async fn test_uninitialized_index_uses_full_context() {
        let router = QueryRouter::new(3);
        let mut conv = Conversation::new();
        let routed = router
            .route("What about pricing?", &page(), &index(), "en", &mut conv)
            .await;

        assert_eq!(routed.strategy, Strategy::FullContext);
        assert!(conv.system().unwrap().contains("ten dollars"));
        assert_eq!(routed.messages.last().unwrap().content, "What about pricing?");
    }

    #[tokio::test]
    async fn test_summary_restores_full_context_after_rag() {
        let router = QueryRouter::new(3);
        let index = index();
        let page = page();
        index.initialize(&page).await.unwrap();
        let mut conv = Conversation::new();

        let rag = router
            .route("What does the author say about pricing?", &page, &index, "en", &mut conv)
            .await;
        assert_eq!(rag.strategy, Strategy::Rag);
        assert!(!rag.hits.is_empty());
        let last = &rag.messages.last().unwrap().content;
        assert!(last.starts_with(RAG_MARKER));
        assert!(last.contains("ten dollars"));
        assert!(last.ends_with("USER QUESTION: What does the author say about pricing?"));
        assert!(!conv.system().unwrap().contains("PAGE CONTENT:"));
        // History keeps the plain question
        assert_eq!(
            conv.messages().last().unwrap().content,
            "What does the author say about pricing?"
        );

        let summary = router
            .route("Please summarize this page", &page, &index, "en", &mut conv)
            .await;
        assert_eq!(summary.strategy, Strategy::FullContext);
        assert!(summary.hits.is_empty());
        assert!(conv.system().unwrap().contains("PAGE CONTENT:"));
        assert!(!summary
            .messages
            .iter()
            .any(|m| m.content.contains(RAG_MARKER)));
    }

    #[tokio::test]
    async fn test_no_hits_falls_back_without_swapping() {
        let router = QueryRouter::new(3);
        let index = index();
        let page = page();
        index.initialize(&page).await.unwrap();
        let mut conv = Conversation::new();
        conv.set_system("loaded context");

        let routed = router
            .route("what is the", &page, &index, "en", &mut conv)
            .await;
        assert_eq!(routed.strategy, Strategy::Fallback);
        assert_eq!(conv.system(), Some("loaded context"));
        assert_eq!(routed.messages.last().unwrap().content, "what is the");
    }
}
