//! Per-group authorization: which group chats the bot acts in.

pub mod database;
pub mod grant_log;
pub mod store;

pub use database::SqliteGrantLog;
pub use grant_log::{FileGrantLog, Grant, GrantLog, PersistenceError};
pub use store::{Authorization, AuthorizationStore};
