//! Inbound message events, decoupled from the webhook wire format.

use std::fmt;

/// Where a message was posted.
///
/// Decided once when the event is built: a message is `Group` scoped iff the
/// platform supplied a group id. Multi-person rooms carry no group id and are
/// therefore `Direct`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationScope {
    Direct,
    Group { group_id: String },
}

/// A single text message received over the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    sender_id: String,
    scope: ConversationScope,
    text: String,
    reply_token: String,
}

/// Required field missing from a text message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedEvent {
    MissingSender,
    MissingReplyToken,
    MissingText,
}

impl fmt::Display for MalformedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSender => write!(f, "malformed event: missing sender id"),
            Self::MissingReplyToken => write!(f, "malformed event: missing reply token"),
            Self::MissingText => write!(f, "malformed event: missing message text"),
        }
    }
}

impl std::error::Error for MalformedEvent {}

impl InboundEvent {
    /// Build an event from optional wire fields.
    ///
    /// Blank ids count as missing. The text may be empty (the router ignores
    /// it) but must be present.
    pub fn new(
        sender_id: Option<String>,
        group_id: Option<String>,
        text: Option<String>,
        reply_token: Option<String>,
    ) -> Result<Self, MalformedEvent> {
        let sender_id = non_blank(sender_id).ok_or(MalformedEvent::MissingSender)?;
        let reply_token = non_blank(reply_token).ok_or(MalformedEvent::MissingReplyToken)?;
        let text = text.ok_or(MalformedEvent::MissingText)?;
        let scope = match non_blank(group_id) {
            Some(group_id) => ConversationScope::Group { group_id },
            None => ConversationScope::Direct,
        };

        Ok(Self {
            sender_id,
            scope,
            text,
            reply_token,
        })
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn scope(&self) -> &ConversationScope {
        &self.scope
    }

    pub fn group_id(&self) -> Option<&str> {
        match &self.scope {
            ConversationScope::Group { group_id } => Some(group_id),
            ConversationScope::Direct => None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reply_token(&self) -> &str {
        &self.reply_token
    }

    /// First 100 chars of the text, for logging.
    pub fn preview(&self) -> String {
        self.text.chars().take(100).collect()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_group_scope_from_group_id() {
        let event = InboundEvent::new(s("U1"), s("C1"), s("hi"), s("tok")).unwrap();
        assert_eq!(
            event.scope(),
            &ConversationScope::Group { group_id: "C1".to_string() }
        );
        assert_eq!(event.group_id(), Some("C1"));
    }

    #[test]
    fn test_direct_scope_without_group_id() {
        let event = InboundEvent::new(s("U1"), None, s("hi"), s("tok")).unwrap();
        assert_eq!(event.scope(), &ConversationScope::Direct);
        assert_eq!(event.group_id(), None);
    }

    #[test]
    fn test_blank_group_id_is_direct() {
        let event = InboundEvent::new(s("U1"), s("  "), s("hi"), s("tok")).unwrap();
        assert_eq!(event.scope(), &ConversationScope::Direct);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        assert_eq!(
            InboundEvent::new(None, s("C1"), s("hi"), s("tok")),
            Err(MalformedEvent::MissingSender)
        );
        assert_eq!(
            InboundEvent::new(s("U1"), s("C1"), s("hi"), s("")),
            Err(MalformedEvent::MissingReplyToken)
        );
        assert_eq!(
            InboundEvent::new(s("U1"), s("C1"), None, s("tok")),
            Err(MalformedEvent::MissingText)
        );
    }

    #[test]
    fn test_empty_text_is_allowed() {
        let event = InboundEvent::new(s("U1"), s("C1"), s(""), s("tok")).unwrap();
        assert_eq!(event.text(), "");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let text = "あ".repeat(150);
        let event = InboundEvent::new(s("U1"), None, Some(text), s("tok")).unwrap();
        assert_eq!(event.preview().chars().count(), 100);
    }
}
