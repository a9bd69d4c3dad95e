//! Executes a routing decision: one gateway call, one reply.

use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::PromptConfig;
use crate::gateway::{Gateway, GatewayError};
use crate::language::Direction;
use crate::line::{ReplyError, ReplySink};
use crate::router::RoutingDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was sent.
    Silent,
    Replied,
}

#[derive(Debug)]
pub enum RespondError {
    Gateway(GatewayError),
    Reply(ReplyError),
}

impl fmt::Display for RespondError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway(e) => write!(f, "gateway failed: {e}"),
            Self::Reply(e) => write!(f, "reply failed: {e}"),
        }
    }
}

impl std::error::Error for RespondError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gateway(e) => Some(e),
            Self::Reply(e) => Some(e),
        }
    }
}

pub struct Responder {
    prompts: PromptConfig,
    gateway: Arc<dyn Gateway>,
    replies: Arc<dyn ReplySink>,
}

impl Responder {
    pub fn new(prompts: PromptConfig, gateway: Arc<dyn Gateway>, replies: Arc<dyn ReplySink>) -> Self {
        Self {
            prompts,
            gateway,
            replies,
        }
    }

    /// Carry out `decision` for the event owning `reply_token`.
    ///
    /// Gateway failures are returned without replying: the chat sees silence,
    /// never an error message.
    pub async fn respond(
        &self,
        decision: &RoutingDecision,
        reply_token: &str,
    ) -> Result<Outcome, RespondError> {
        let generated = match decision {
            RoutingDecision::Ignore => return Ok(Outcome::Silent),
            RoutingDecision::AssistantQuery { question } => self
                .gateway
                .complete(Some(self.prompts.assistant_persona.as_str()), question)
                .await
                .map_err(RespondError::Gateway)?,
            RoutingDecision::Translate { text, direction } => {
                let prompt = self.translation_prompt(text, *direction);
                self.gateway
                    .complete(None, &prompt)
                    .await
                    .map_err(RespondError::Gateway)?
            }
        };

        let reply = generated.trim();
        if reply.is_empty() {
            return Err(RespondError::Gateway(GatewayError::Empty));
        }

        self.replies
            .reply(reply_token, reply)
            .await
            .map_err(RespondError::Reply)?;
        info!("💬 Replied ({} chars)", reply.chars().count());
        Ok(Outcome::Replied)
    }

    fn translation_prompt(&self, text: &str, direction: Direction) -> String {
        let target = match direction {
            Direction::HomeToForeign => &self.prompts.foreign_language,
            Direction::ForeignToHome => &self.prompts.home_language,
        };
        self.prompts
            .translation_prompt
            .replace("{language}", target)
            .replace("{text}", text)
    }
}
