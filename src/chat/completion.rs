use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts::{has_rag_context, DEFAULT_USER_TURN};
use super::router::is_summary_request;
use super::{Message, Role};
use crate::error::Result;
use crate::settings::{GroundingMode, Settings};
use crate::text::char_len;

/// Cheap model for pre-filtered context and plain questions
pub const LITE_MODEL: &str = "gemini-2.0-flash-lite";
/// Summaries and multi-step reasoning
pub const FULL_MODEL: &str = "gemini-2.5-flash";

const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.95;
const FULL_TOP_K: u32 = 64;
const LITE_TOP_K: u32 = 40;
const RAG_MAX_TOKENS: u32 = 4096;
const SUMMARY_MAX_TOKENS: u32 = 8192;
const DEFAULT_MAX_TOKENS: u32 = 6144;

/// Long questions count as complex regardless of wording
const COMPLEX_QUERY_LEN: usize = 200;

const COMPLEX_MARKERS: &[&str] = &[
    "why",
    "how does",
    "how do",
    "compare",
    "explain",
    "analyze",
    "analyse",
    "difference between",
    "pros and cons",
    "evaluate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Rag,
    Summary,
    Complex,
    Standard,
}

impl QueryKind {
    /// Classify the outgoing (possibly RAG-wrapped) last turn
    pub fn classify(last: &str) -> Self {
        if has_rag_context(last) {
            QueryKind::Rag
        } else if is_summary_request(last) {
            QueryKind::Summary
        } else if is_complex_query(last) {
            QueryKind::Complex
        } else {
            QueryKind::Standard
        }
    }
}

pub fn is_complex_query(message: &str) -> bool {
    let lowered = message.to_lowercase();
    char_len(message) > COMPLEX_QUERY_LEN || COMPLEX_MARKERS.iter().any(|m| lowered.contains(m))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

/// One turn in the wire shape: role is `user` or `model`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grounding {
    pub mode: GroundingMode,
}

/// Everything the completion backend needs for one call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model: String,
    pub kind: QueryKind,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding: Option<Grounding>,
}

impl CompletionRequest {
    pub fn plan(messages: &[Message], settings: &Settings) -> Self {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let kind = QueryKind::classify(last);

        let model = match kind {
            QueryKind::Summary | QueryKind::Complex => FULL_MODEL,
            QueryKind::Rag | QueryKind::Standard => LITE_MODEL,
        };

        let max_output_tokens = match kind {
            QueryKind::Rag => RAG_MAX_TOKENS,
            QueryKind::Summary => SUMMARY_MAX_TOKENS,
            QueryKind::Complex | QueryKind::Standard => DEFAULT_MAX_TOKENS,
        };

        let generation_config = GenerationConfig {
            temperature: TEMPERATURE,
            top_k: if model == FULL_MODEL {
                FULL_TOP_K
            } else {
                LITE_TOP_K
            },
            top_p: TOP_P,
            max_output_tokens,
        };

        let grounding = settings.enable_grounding.then_some(Grounding {
            mode: settings.grounding_mode,
        });

        log::debug!(
            "planned {} request ({:?}, grounding: {})",
            model,
            kind,
            grounding.is_some()
        );

        Self {
            model: model.to_string(),
            kind,
            contents: to_contents(messages),
            generation_config,
            grounding,
        }
    }
}

/// Fold the system message into the first user turn, which must exist
fn to_contents(messages: &[Message]) -> Vec<Content> {
    let system = messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str());

    let default_turn = Message::user(DEFAULT_USER_TURN);
    let mut turns: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
    if turns.first().map(|m| m.role) != Some(Role::User) {
        turns.insert(0, &default_turn);
    }

    turns
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let role = match m.role {
                Role::Assistant => "model",
                _ => "user",
            };
            match system {
                Some(system) if i == 0 => Content::new(role, format!("{}\n\n{}", system, m.content)),
                _ => Content::new(role, m.content.as_str()),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Language-model backend, supplied by the host
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::prompts::RAG_MARKER;

    #[test]
    fn test_rag_turn_uses_lite_model() {
        let messages = vec![
            Message::system("ctx"),
            Message::user(format!("{}\n\nUSER QUESTION: why?", RAG_MARKER)),
        ];
        let req = CompletionRequest::plan(&messages, &Settings::default());
        assert_eq!(req.kind, QueryKind::Rag);
        assert_eq!(req.model, LITE_MODEL);
        assert_eq!(req.generation_config.top_k, 40);
        assert_eq!(req.generation_config.max_output_tokens, 4096);
    }

    #[test]
    fn test_summary_and_complex_use_full_model() {
        let summary = CompletionRequest::plan(&[Message::user("summarize")], &Settings::default());
        assert_eq!(summary.model, FULL_MODEL);
        assert_eq!(summary.generation_config.top_k, 64);
        assert_eq!(summary.generation_config.max_output_tokens, 8192);

        let complex = CompletionRequest::plan(
            &[Message::user("Explain the difference between the plans")],
            &Settings::default(),
        );
        assert_eq!(complex.kind, QueryKind::Complex);
        assert_eq!(complex.model, FULL_MODEL);
        assert_eq!(complex.generation_config.max_output_tokens, 6144);

        let plain = CompletionRequest::plan(&[Message::user("Who wrote it?")], &Settings::default());
        assert_eq!(plain.kind, QueryKind::Standard);
        assert_eq!(plain.model, LITE_MODEL);
    }

    #[test]
    fn test_system_folded_into_first_user_turn() {
        let messages = vec![
            Message::system("SYS"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
        ];
        let req = CompletionRequest::plan(&messages, &Settings::default());
        assert_eq!(req.contents.len(), 3);
        assert_eq!(req.contents[0].role, "user");
        assert_eq!(req.contents[0].parts[0].text, "SYS\n\nq1");
        assert_eq!(req.contents[1].role, "model");
        assert_eq!(req.contents[2].parts[0].text, "q2");
    }

    #[test]
    fn test_default_user_turn_inserted() {
        let messages = vec![Message::system("SYS"), Message::assistant("hello")];
        let req = CompletionRequest::plan(&messages, &Settings::default());
        assert_eq!(req.contents.len(), 2);
        assert_eq!(
            req.contents[0].parts[0].text,
            format!("SYS\n\n{}", DEFAULT_USER_TURN)
        );

        let empty = CompletionRequest::plan(&[], &Settings::default());
        assert_eq!(empty.contents.len(), 1);
        assert_eq!(empty.contents[0].parts[0].text, DEFAULT_USER_TURN);
    }

    #[test]
    fn test_grounding_follows_settings() {
        let off = CompletionRequest::plan(&[Message::user("hi")], &Settings::default());
        assert!(off.grounding.is_none());

        let settings = Settings {
            enable_grounding: true,
            grounding_mode: GroundingMode::Always,
            ..Settings::default()
        };
        let on = CompletionRequest::plan(&[Message::user("hi")], &settings);
        assert_eq!(
            on.grounding,
            Some(Grounding {
                mode: GroundingMode::Always
            })
        );
        let json = serde_json::to_value(&on).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 6144);
        assert_eq!(json["grounding"]["mode"], "always");
    }
}
