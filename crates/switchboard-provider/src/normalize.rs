//! Turn-sequence normalization shared by all adapters.
//!
//! Adapters never see system messages in the turn list: they are pulled out
//! and joined so each backend can deliver them through its own channel. The
//! remaining turns always start with a user turn and never contain two
//! assistant turns back to back without a tool call in between.
//!
//! Blocks a backend cannot carry are stripped before those rules run, so a
//! turn that would convert to nothing never reaches the adapter.

use crate::types::{ContentBlock, Message, Role};

/// Placeholder for an otherwise empty or assistant-first history.
pub const BEGIN_PLACEHOLDER: &str = "begin";

/// Placeholder inserted between consecutive assistant turns.
pub const CONTINUE_PLACEHOLDER: &str = "Continue.";

/// A conversation split into its system instructions and its turns.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// System text, in original order, joined by blank lines.
    pub system: Option<String>,
    /// Normalized user/assistant turns.
    pub turns: Vec<Message>,
}

/// Whether a backend puts a block on the wire.
pub type Carries = fn(&ContentBlock) -> bool;

/// Every backend drops empty text.
pub fn carries_any(block: &ContentBlock) -> bool {
    !matches!(block, ContentBlock::Text { text } if text.is_empty())
}

/// Backends that cannot replay redacted reasoning.
pub fn carries_unredacted(block: &ContentBlock) -> bool {
    carries_any(block) && !matches!(block, ContentBlock::Reasoning { redacted: true, .. })
}

/// Split out system messages and normalize the turn sequence, keeping every
/// non-empty block.
pub fn normalize(messages: &[Message]) -> Conversation {
    normalize_for(messages, carries_any)
}

/// Split out system messages and normalize the turn sequence for a backend
/// that only carries the blocks `carries` accepts.
///
/// The caller's messages are only read; every turn is a fresh copy.
pub fn normalize_for(messages: &[Message], carries: Carries) -> Conversation {
    let system_parts: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(Message::text)
        .filter(|text| !text.is_empty())
        .collect();

    let mut turns: Vec<Message> = Vec::with_capacity(messages.len() + 1);
    for message in messages.iter().filter(|m| m.role != Role::System) {
        let Some(message) = strip(message, carries) else {
            continue;
        };
        if message.role == Role::Assistant {
            if let Some(prev) = turns.last() {
                if prev.role == Role::Assistant && !prev.has_tool_call() {
                    turns.push(Message::user(CONTINUE_PLACEHOLDER));
                }
            }
        }
        turns.push(message);
    }

    if turns.first().map(|m| m.role) != Some(Role::User) {
        turns.insert(0, Message::user(BEGIN_PLACEHOLDER));
    }

    Conversation {
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        },
        turns,
    }
}

/// Copy of `message` without the blocks the backend drops, or `None` when
/// nothing is left.
fn strip(message: &Message, carries: Carries) -> Option<Message> {
    let blocks: Vec<ContentBlock> = message
        .blocks
        .iter()
        .filter(|block| {
            let kept = carries(block);
            if !kept && !matches!(block, ContentBlock::Text { .. }) {
                tracing::debug!(kind = block.kind(), "dropping block the backend cannot carry");
            }
            kept
        })
        .cloned()
        .collect();
    if blocks.is_empty() {
        tracing::debug!(role = %message.role, "dropping turn with no content");
        return None;
    }
    Some(Message::new(message.role, blocks))
}

/// Render reasoning as inline markup, for backends that take it back as text.
pub fn reasoning_markup(reasoning: &str) -> String {
    format!("<thinking>\n{reasoning}\n</thinking>")
}

/// Find the function name of an earlier tool call by id.
pub fn tool_name_for<'a>(turns: &'a [Message], id: &str) -> Option<&'a str> {
    turns.iter().flat_map(|m| m.blocks.iter()).find_map(|block| match block {
        ContentBlock::ToolCall {
            id: call_id,
            fn_name,
            ..
        } if call_id == id => Some(fn_name.as_str()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_history_gets_begin_turn() {
        let conv = normalize(&[]);
        assert!(conv.system.is_none());
        assert_eq!(conv.turns, vec![Message::user(BEGIN_PLACEHOLDER)]);
    }

    #[test]
    fn test_system_only_history() {
        let conv = normalize(&[Message::system("Be terse.")]);
        assert_eq!(conv.system.as_deref(), Some("Be terse."));
        assert_eq!(conv.turns, vec![Message::user(BEGIN_PLACEHOLDER)]);
    }

    #[test]
    fn test_assistant_first_gets_begin_turn() {
        let conv = normalize(&[Message::assistant("Hi there")]);
        assert_eq!(conv.turns.len(), 2);
        assert_eq!(conv.turns[0], Message::user(BEGIN_PLACEHOLDER));
        assert_eq!(conv.turns[1].role, Role::Assistant);
    }

    #[test]
    fn test_consecutive_assistants_get_continue_turn() {
        let conv = normalize(&[
            Message::user("hello"),
            Message::assistant("one"),
            Message::assistant("two"),
        ]);
        let roles: Vec<Role> = conv.turns.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(conv.turns[2].text(), CONTINUE_PLACEHOLDER);
    }

    #[test]
    fn test_tool_call_suppresses_continue_turn() {
        let call = Message::new(
            Role::Assistant,
            vec![ContentBlock::tool_call_with_args("tc_1", "read", json!({}))],
        );
        let conv = normalize(&[Message::user("go"), call, Message::assistant("done")]);
        assert_eq!(conv.turns.len(), 3);
    }

    #[test]
    fn test_system_messages_joined_in_order() {
        let conv = normalize(&[
            Message::system("first"),
            Message::user("hi"),
            Message::system("second"),
        ]);
        assert_eq!(conv.system.as_deref(), Some("first\n\nsecond"));
        assert_eq!(conv.turns, vec![Message::user("hi")]);
    }

    #[test]
    fn test_empty_first_turn_dropped_before_begin_rule() {
        let conv = normalize(&[Message::user(""), Message::assistant("hi")]);
        assert_eq!(conv.turns.len(), 2);
        assert_eq!(conv.turns[0], Message::user(BEGIN_PLACEHOLDER));
        assert_eq!(conv.turns[1], Message::assistant("hi"));
    }

    #[test]
    fn test_empty_middle_turn_dropped_before_continue_rule() {
        let conv = normalize(&[
            Message::user("q"),
            Message::assistant("a"),
            Message::user(""),
            Message::assistant("b"),
        ]);
        let roles: Vec<Role> = conv.turns.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(conv.turns[2].text(), CONTINUE_PLACEHOLDER);
    }

    #[test]
    fn test_empty_text_blocks_stripped_from_kept_turns() {
        let conv = normalize(&[Message::new(
            Role::User,
            vec![ContentBlock::text(""), ContentBlock::text("hello")],
        )]);
        assert_eq!(conv.turns, vec![Message::user("hello")]);
    }

    #[test]
    fn test_redacted_only_turn_dropped_when_not_carried() {
        let redacted = Message::new(
            Role::Assistant,
            vec![ContentBlock::Reasoning {
                reasoning: "opaque".into(),
                signature: None,
                redacted: true,
            }],
        );
        let history = [
            Message::user("q"),
            Message::assistant("a"),
            redacted,
            Message::assistant("b"),
        ];

        let kept = normalize(&history);
        assert_eq!(kept.turns.len(), 6);

        let stripped = normalize_for(&history, carries_unredacted);
        let roles: Vec<Role> = stripped.turns.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[test]
    fn test_tool_name_lookup() {
        let turns = vec![Message::new(
            Role::Assistant,
            vec![ContentBlock::tool_call_with_args("tc_9", "grep", json!({}))],
        )];
        assert_eq!(tool_name_for(&turns, "tc_9"), Some("grep"));
        assert_eq!(tool_name_for(&turns, "missing"), None);
    }
}
