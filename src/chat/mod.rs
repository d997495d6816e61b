pub mod completion;
pub mod prompts;
pub mod router;

pub use completion::{
    CompletionRequest, CompletionResponse, CompletionService, GenerationConfig, Grounding, Source,
};
pub use router::{is_summary_request, QueryRouter, RoutedQuery, Strategy};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Turns exchanged during one page view.
///
/// Holds at most one system message, always at position 0.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the page-context system message
    pub fn set_system(&mut self, content: impl Into<String>) {
        let message = Message::system(content);
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => *first = message,
            _ => self.messages.insert(0, message),
        }
    }

    pub fn system(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Append a user or assistant turn; a system turn goes through `set_system`
    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            self.set_system(message.content);
        } else {
            self.messages.push(message);
        }
    }

    /// Drop the last turn if it is a user turn (used when a send fails)
    pub fn pop_user(&mut self) -> Option<Message> {
        if self.messages.last().map(|m| m.role) == Some(Role::User) {
            self.messages.pop()
        } else {
            None
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }
}
