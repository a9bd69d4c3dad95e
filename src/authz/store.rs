//! In-memory authorized-group set, written through to a [`GrantLog`].

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::grant_log::{Grant, GrantLog, PersistenceError};

/// Result of a successful [`AuthorizationStore::authorize`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    AlreadyAuthorized,
}

/// Set of groups the bot acts in.
///
/// Membership only ever grows. A group enters the in-memory set only after its
/// grant has been written to the log, so the set never claims more than the
/// log can restore after a restart.
pub struct AuthorizationStore {
    groups: Mutex<HashSet<String>>,
    log: Box<dyn GrantLog>,
}

impl AuthorizationStore {
    pub fn new(log: Box<dyn GrantLog>) -> Self {
        Self {
            groups: Mutex::new(HashSet::new()),
            log,
        }
    }

    /// Read the durable record into memory. Returns the number of authorized groups.
    pub fn load(&self) -> Result<usize, PersistenceError> {
        let stored = self.log.read_all()?;
        let mut groups = self.lock();
        groups.extend(stored);
        info!("Loaded {} authorized group(s)", groups.len());
        Ok(groups.len())
    }

    pub fn is_authorized(&self, group_id: &str) -> bool {
        self.lock().contains(group_id)
    }

    /// Authorize `group_id`, persisting the grant first.
    ///
    /// The lock is held across the check, the append and the insert, so
    /// concurrent callers for the same group write exactly one grant. If the
    /// append fails the group stays unauthorized.
    pub fn authorize(
        &self,
        group_id: &str,
        granted_by: &str,
    ) -> Result<Authorization, PersistenceError> {
        let mut groups = self.lock();
        if groups.contains(group_id) {
            return Ok(Authorization::AlreadyAuthorized);
        }

        self.log.append(&Grant::now(group_id, granted_by))?;
        groups.insert(group_id.to_string());
        info!("✅ Authorized group {group_id} (by {granted_by})");
        Ok(Authorization::Granted)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // Inserts happen after the fallible append, so a poisoned set is still consistent.
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
