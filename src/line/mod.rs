//! LINE Messaging API transport: webhook server, payload types, reply client.

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{LineClient, ReplyError, ReplySink};
pub use webhook::{WebhookState, router, run_server, verify_signature};
