//! Converts persisted [`ConversationMessage`]s into the provider-agnostic
//! [`Message`] list the LLM client expects, keeping as many of the most
//! recent messages as fit the `recent_messages` token budget (§4.E).
//! Messages are dropped oldest-first when the window overflows.

use crate::tokens::count_tokens;
use sa_domain::session::{ConversationMessage, MessageRole};
use sa_domain::tool::{Message, MessageContent, Role};

pub fn to_chat_messages(recent: &[ConversationMessage], max_tokens: usize) -> Vec<Message> {
    let mut kept: Vec<&ConversationMessage> = Vec::new();
    let mut used = 0usize;
    for msg in recent.iter().rev() {
        let cost = count_tokens(&msg.content);
        if used + cost > max_tokens && !kept.is_empty() {
            break;
        }
        used += cost;
        kept.push(msg);
    }
    kept.reverse();
    kept.into_iter().map(convert).collect()
}

fn convert(msg: &ConversationMessage) -> Message {
    let role = match msg.role {
        MessageRole::User => Role::User,
        MessageRole::Assistant => Role::Assistant,
        MessageRole::System => Role::System,
        MessageRole::Tool => Role::Tool,
    };
    Message {
        role,
        content: MessageContent::Text(msg.content.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sa_domain::session::MessageMetadata;

    fn msg(role: MessageRole, content: &str) -> ConversationMessage {
        ConversationMessage {
            session_id: "s1".into(),
            user_id: "u1".into(),
            role,
            content: content.into(),
            metadata: MessageMetadata::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn keeps_all_messages_under_budget() {
        let msgs = vec![msg(MessageRole::User, "hi"), msg(MessageRole::Assistant, "hello")];
        let out = to_chat_messages(&msgs, 2000);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, Role::User);
    }

    #[test]
    fn drops_oldest_messages_over_budget() {
        let long = "word ".repeat(200);
        let msgs = vec![
            msg(MessageRole::User, &long),
            msg(MessageRole::Assistant, &long),
            msg(MessageRole::User, "short recent message"),
        ];
        let out = to_chat_messages(&msgs, 20);
        // At minimum the most recent message always survives.
        assert!(out.len() <= msgs.len());
        assert_eq!(
            out.last().unwrap().content,
            MessageContent::Text("short recent message".into())
        );
    }

    #[test]
    fn always_keeps_at_least_the_most_recent_message() {
        let huge = "word ".repeat(5000);
        let msgs = vec![msg(MessageRole::User, &huge)];
        let out = to_chat_messages(&msgs, 1);
        assert_eq!(out.len(), 1);
    }
}
