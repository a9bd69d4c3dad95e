//! Turns an inbound event into exactly one routing decision.
//!
//! An event moves through `Received → AuthorizationChecked → Classified`; the
//! caller then dispatches the decision. Every early exit yields
//! [`RoutingDecision::Ignore`]. The only failure is a grant that could not be
//! persisted, in which case the group stays unauthorized and nothing is sent.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::authz::{Authorization, AuthorizationStore, PersistenceError};
use crate::command::{Classification, classify};
use crate::config::{AuthorizationTrigger, RoutingPolicy};
use crate::event::{ConversationScope, InboundEvent};
use crate::language::{Direction, detect};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Ignore,
    AssistantQuery { question: String },
    Translate { text: String, direction: Direction },
}

#[derive(Debug)]
pub enum RouteError {
    /// Authorizing the group failed; the group remains unauthorized.
    Persistence {
        group_id: String,
        source: PersistenceError,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistence { group_id, source } => {
                write!(f, "failed to authorize group {group_id}: {source}")
            }
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persistence { source, .. } => Some(source),
        }
    }
}

pub struct RoutingEngine {
    policy: RoutingPolicy,
    store: Arc<AuthorizationStore>,
}

impl RoutingEngine {
    pub fn new(policy: RoutingPolicy, store: Arc<AuthorizationStore>) -> Self {
        Self { policy, store }
    }

    pub fn store(&self) -> &AuthorizationStore {
        &self.store
    }

    pub fn route(&self, event: &InboundEvent) -> Result<RoutingDecision, RouteError> {
        let text = event.text().trim();
        if text.is_empty() {
            debug!("Ignoring empty message from {}", event.sender_id());
            return Ok(RoutingDecision::Ignore);
        }

        let group_id = match event.scope() {
            ConversationScope::Direct => {
                debug!("Ignoring direct message from {}", event.sender_id());
                return Ok(RoutingDecision::Ignore);
            }
            ConversationScope::Group { group_id } => group_id,
        };

        let classification = classify(text, &self.policy.invocation_marker);

        if !self.store.is_authorized(group_id) {
            if !self.may_authorize(event.sender_id(), &classification) {
                debug!("Ignoring message in unauthorized group {group_id}");
                return Ok(RoutingDecision::Ignore);
            }
            let outcome = self
                .store
                .authorize(group_id, event.sender_id())
                .map_err(|source| RouteError::Persistence {
                    group_id: group_id.clone(),
                    source,
                })?;
            if outcome == Authorization::Granted {
                info!("🔓 Group {group_id} authorized by {}", event.sender_id());
            }
        }

        Ok(match classification {
            Classification::AssistantInvocation(question) => {
                RoutingDecision::AssistantQuery { question }
            }
            Classification::NoOp => RoutingDecision::Ignore,
            Classification::PlainText(text) => {
                let direction = detect(&text).translation_direction();
                RoutingDecision::Translate { text, direction }
            }
        })
    }

    fn may_authorize(&self, sender_id: &str, classification: &Classification) -> bool {
        if !self.policy.is_whitelisted(sender_id) {
            return false;
        }
        match self.policy.authorization_trigger {
            AuthorizationTrigger::AnyMessage => true,
            AuthorizationTrigger::Invocation => {
                matches!(classification, Classification::AssistantInvocation(_))
            }
        }
    }
}
