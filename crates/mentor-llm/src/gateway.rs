//! Completion gateway contract and prompt assembly.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mentor_core::error::Result;
use mentor_core::types::{Role, Turn};

/// Role tag on a rendered prompt message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => f.write_str("system"),
            MessageRole::User => f.write_str("user"),
            MessageRole::Assistant => f.write_str("assistant"),
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Retrieved material the model should answer from.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundingBlock {
    pub title: String,
    pub lines: Vec<String>,
}

impl GroundingBlock {
    pub fn new(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
        }
    }

    /// Render as a titled bullet list; an empty block says so explicitly.
    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return format!("{}:\n(none)", self.title);
        }
        let mut out = format!("{}:", self.title);
        for line in &self.lines {
            out.push_str("\n- ");
            out.push_str(line);
        }
        out
    }
}

/// Everything one completion call sees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PromptContext {
    pub system: String,
    /// Prior turns, oldest first. Already bounded by the caller.
    pub history: Vec<Turn>,
    pub grounding: Vec<GroundingBlock>,
    pub user: String,
}

impl PromptContext {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            grounding: Vec::new(),
            user: user.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_grounding(mut self, block: GroundingBlock) -> Self {
        self.grounding.push(block);
        self
    }

    /// Render into role-tagged messages: system, grounding, history, user.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.grounding.len() + self.history.len() + 2);
        if !self.system.is_empty() {
            messages.push(ChatMessage::new(MessageRole::System, self.system.clone()));
        }
        for block in &self.grounding {
            messages.push(ChatMessage::new(MessageRole::System, block.render()));
        }
        for turn in &self.history {
            messages.push(ChatMessage::new(turn.role.into(), turn.text.clone()));
        }
        messages.push(ChatMessage::new(MessageRole::User, self.user.clone()));
        messages
    }
}

/// Uniform interface to a text-completion service.
///
/// Network, quota, and malformed-response failures all surface as
/// `CompletionFailed`.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    fn name(&self) -> &str;

    /// True when no model is behind this gateway and every call would fail.
    fn is_offline(&self) -> bool {
        false
    }

    async fn complete(&self, context: &PromptContext) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_ordered() {
        let ctx = PromptContext::new("be helpful", "what now?")
            .with_grounding(GroundingBlock::new("Facts", vec!["prefers tea".into()]))
            .with_grounding(GroundingBlock::new("Events", vec![]))
            .with_history(vec![Turn::user("hi"), Turn::assistant("hello")]);

        let messages = ctx.to_messages();
        let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::System,
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
            ]
        );
        assert_eq!(messages[1].content, "Facts:\n- prefers tea");
        assert_eq!(messages[2].content, "Events:\n(none)");
        assert_eq!(messages[5].content, "what now?");
    }

    #[test]
    fn test_empty_system_is_skipped() {
        let messages = PromptContext::new("", "hi").to_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::new(MessageRole::Assistant, "x")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
