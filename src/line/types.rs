//! Webhook payload as sent by the LINE platform.
//!
//! Only the fields the bot reads are modelled; everything is optional so that
//! unknown event kinds deserialize and can be skipped.

use serde::Deserialize;

use crate::event::{InboundEvent, MalformedEvent};

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// True for `message` events carrying a text message.
    pub fn is_text_message(&self) -> bool {
        self.kind == "message" && self.message.as_ref().is_some_and(|m| m.kind == "text")
    }

    /// Convert a text message event into an [`InboundEvent`].
    pub fn into_inbound(self) -> Result<InboundEvent, MalformedEvent> {
        let (user_id, group_id) = match self.source {
            Some(source) => (source.user_id, source.group_id),
            None => (None, None),
        };
        InboundEvent::new(
            user_id,
            group_id,
            self.message.and_then(|m| m.text),
            self.reply_token,
        )
    }
}
