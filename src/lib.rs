//! LINE group-chat bot: whitelisted senders unlock a group, after which every
//! message is either answered by the assistant (when it starts with the
//! invocation marker) or translated between the home and foreign language.
//!
//! ```text
//! LINE ──POST /callback──▶ webhook ──▶ RoutingEngine ──▶ Responder ──▶ Gateway
//!                                         │                  │
//!                                AuthorizationStore      reply API
//!                                         │
//!                                     GrantLog (file / SQLite)
//! ```

pub mod authz;
pub mod command;
pub mod config;
pub mod event;
pub mod gateway;
pub mod language;
pub mod line;
pub mod responder;
pub mod router;

pub use authz::{AuthorizationStore, FileGrantLog, GrantLog, SqliteGrantLog};
pub use config::Config;
pub use event::{ConversationScope, InboundEvent};
pub use responder::Responder;
pub use router::{RoutingDecision, RoutingEngine};
