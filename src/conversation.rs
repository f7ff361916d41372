//! Conversation turns and transcript formatting
//!
//! The caller owns the history window; nothing here is persisted. Each
//! handler truncates to its own configured window before prompting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Format the last `window` turns as a flat transcript for prompt inclusion.
/// Returns an empty string when there is no history.
pub fn format_transcript(history: &[ConversationTurn], window: usize) -> String {
    if history.is_empty() || window == 0 {
        return String::new();
    }

    let start = history.len().saturating_sub(window);
    let mut out = String::new();
    for turn in &history[start..] {
        out.push_str(turn.role.display_name());
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<ConversationTurn> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ConversationTurn::user(format!("q{}", i))
                } else {
                    ConversationTurn::assistant(format!("a{}", i))
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(format_transcript(&[], 10), "");
    }

    #[test]
    fn test_window_truncation() {
        let history = turns(12);
        let transcript = format_transcript(&history, 6);

        // Only the last 6 turns survive
        assert!(!transcript.contains("q0"));
        assert!(!transcript.contains("a5"));
        assert!(transcript.contains("q6"));
        assert!(transcript.contains("a11"));
        assert_eq!(transcript.lines().count(), 6);
    }

    #[test]
    fn test_role_prefixes() {
        let history = vec![
            ConversationTurn::user("안녕"),
            ConversationTurn::assistant("안녕하세요"),
        ];
        let transcript = format_transcript(&history, 10);
        assert_eq!(transcript, "User: 안녕\nAssistant: 안녕하세요\n");
    }

    #[test]
    fn test_window_larger_than_history() {
        let history = turns(3);
        assert_eq!(format_transcript(&history, 10).lines().count(), 3);
    }
}
