//! Conversation session store
//!
//! Tracks one [`ConversationHandle`] per (workflow instance, role). Handles
//! are allocated locally; the agent creates the actual conversation on first
//! contact and the reported token is installed afterwards.
//!
//! The store is shared by the concurrent consultations of one checkpoint but
//! partitioned by role, so two tasks never contend on the same handle.

use devgate_domain::{
    ConversationHandle, ConversationToken, DomainError, InstanceId, Millis, RoleId, TokenFormat,
    current_timestamp,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Default idle lifetime of a handle (one day)
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(86_400);

type Key = (InstanceId, RoleId);

pub struct SessionStore {
    handles: Mutex<HashMap<Key, ConversationHandle>>,
    format: TokenFormat,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(TokenFormat::default(), DEFAULT_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new(format: TokenFormat, idle_ttl: Duration) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            format,
            idle_ttl,
        }
    }

    pub fn token_format(&self) -> &TokenFormat {
        &self.format
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, ConversationHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Existing active handle for (instance, role), or a fresh one
    pub fn get_or_create(&self, instance: &InstanceId, role: &RoleId) -> ConversationHandle {
        self.get_or_create_at(instance, role, current_timestamp())
    }

    pub fn get_or_create_at(
        &self,
        instance: &InstanceId,
        role: &RoleId,
        now: Millis,
    ) -> ConversationHandle {
        let ttl_ms = self.idle_ttl.as_millis() as Millis;
        let mut handles = self.lock();
        let key = (instance.clone(), role.clone());

        let mut generation = 0;
        if let Some(existing) = handles.get_mut(&key) {
            if existing.is_active() && existing.is_idle_past(now, ttl_ms) {
                info!(
                    "Conversation handle for {} in {} expired after {}s idle",
                    role,
                    instance,
                    self.idle_ttl.as_secs()
                );
                existing.expire();
            }
            if existing.is_active() {
                return existing.clone();
            }
            debug!(
                "Replacing {:?} handle for {} in {}",
                existing.state(),
                role,
                instance
            );
            generation = existing.generation().wrapping_add(1);
        }

        let handle =
            ConversationHandle::new(instance.clone(), role.clone(), now).with_generation(generation);
        handles.insert(key, handle.clone());
        handle
    }

    /// Mark the handle invalid; the next `get_or_create` allocates afresh.
    /// Returns false when there was no handle.
    pub fn invalidate(&self, instance: &InstanceId, role: &RoleId, reason: &str) -> bool {
        let mut handles = self.lock();
        match handles.get_mut(&(instance.clone(), role.clone())) {
            Some(handle) => {
                info!("Invalidating conversation handle for {} in {}: {}", role, instance, reason);
                handle.invalidate(reason);
                true
            }
            None => false,
        }
    }

    /// Record activity after a successful exchange
    pub fn touch(&self, handle: &ConversationHandle) {
        self.touch_at(handle, current_timestamp());
    }

    pub fn touch_at(&self, handle: &ConversationHandle, now: Millis) {
        let mut handles = self.lock();
        if let Some(stored) = handles.get_mut(&(handle.instance().clone(), handle.role().clone()))
            && stored.is_active()
            && stored.token() == handle.token()
        {
            stored.touch(now);
        }
    }

    /// Install the token reported on first contact into the stored handle.
    ///
    /// Ignored when the handle already has a token or was replaced in the
    /// meantime.
    pub fn install_token(
        &self,
        handle: &ConversationHandle,
        token: ConversationToken,
        now: Millis,
    ) -> bool {
        let mut handles = self.lock();
        match handles.get_mut(&(handle.instance().clone(), handle.role().clone())) {
            Some(stored) if stored.generation() == handle.generation() => {
                let installed = stored.install_token(token, now);
                if installed {
                    debug!("Installed conversation token for {}", stored.role());
                }
                installed
            }
            _ => false,
        }
    }

    /// Pre-send check: the token to send, or `MalformedHandle`
    pub fn token_for_send(
        &self,
        handle: &ConversationHandle,
    ) -> Result<Option<ConversationToken>, DomainError> {
        handle
            .token_for_send(&self.format)
            .map(|token| token.cloned())
    }

    pub fn get(&self, instance: &InstanceId, role: &RoleId) -> Option<ConversationHandle> {
        self.lock().get(&(instance.clone(), role.clone())).cloned()
    }

    /// All handles of `instance`, sorted by role
    pub fn handles_for(&self, instance: &InstanceId) -> Vec<ConversationHandle> {
        let mut handles: Vec<ConversationHandle> = self
            .lock()
            .values()
            .filter(|h| h.instance() == instance)
            .cloned()
            .collect();
        handles.sort_by(|a, b| a.role().cmp(b.role()));
        handles
    }

    /// Drop every handle of `instance` (the development session ended)
    pub fn discard_instance(&self, instance: &InstanceId) {
        self.lock().retain(|(id, _), _| id != instance);
    }

    pub fn snapshot(&self) -> Vec<ConversationHandle> {
        let mut handles: Vec<ConversationHandle> = self.lock().values().cloned().collect();
        handles.sort_by(|a, b| {
            (a.instance(), a.role()).cmp(&(b.instance(), b.role()))
        });
        handles
    }

    pub fn restore(&self, snapshot: Vec<ConversationHandle>) {
        let mut handles = self.lock();
        handles.clear();
        for handle in snapshot {
            handles.insert((handle.instance().clone(), handle.role().clone()), handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devgate_domain::HandleState;

    fn ids() -> (InstanceId, RoleId) {
        (InstanceId::new("wf-1"), RoleId::reviewer())
    }

    #[test]
    fn test_second_get_or_create_returns_same_token() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        let first = store.get_or_create_at(&instance, &role, 1_000);
        assert!(store.install_token(&first, ConversationToken::new("conv_ab12"), 1_001));

        let second = store.get_or_create_at(&instance, &role, 2_000);
        let third = store.get_or_create_at(&instance, &role, 3_000);
        assert_eq!(second.token().unwrap().as_str(), "conv_ab12");
        assert_eq!(second.token(), third.token());
        assert_eq!(second.created_at(), first.created_at());
    }

    #[test]
    fn test_pending_handle_is_reused_before_first_contact() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        let first = store.get_or_create_at(&instance, &role, 1_000);
        let second = store.get_or_create_at(&instance, &role, 1_500);
        assert!(second.is_pending_creation());
        assert_eq!(first.created_at(), second.created_at());
    }

    #[test]
    fn test_invalidate_then_get_or_create_allocates_fresh() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        let first = store.get_or_create_at(&instance, &role, 1_000);
        store.install_token(&first, ConversationToken::new("conv_ab12"), 1_001);

        assert!(store.invalidate(&instance, &role, "agent crashed"));
        assert_eq!(store.get(&instance, &role).unwrap().state(), HandleState::Invalid);

        let fresh = store.get_or_create_at(&instance, &role, 2_000);
        assert!(fresh.is_pending_creation());
        assert_ne!(fresh.token(), Some(&ConversationToken::new("conv_ab12")));
        assert!(fresh.is_active());
    }

    #[test]
    fn test_invalidate_missing_handle() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        assert!(!store.invalidate(&instance, &role, "nothing"));
    }

    #[test]
    fn test_handles_are_partitioned_by_instance_and_role() {
        let store = SessionStore::default();
        let a = InstanceId::new("wf-a");
        let b = InstanceId::new("wf-b");
        let h1 = store.get_or_create_at(&a, &RoleId::reviewer(), 1);
        store.install_token(&h1, ConversationToken::new("conv_01"), 2);

        assert!(store.get_or_create_at(&b, &RoleId::reviewer(), 3).is_pending_creation());
        assert!(store.get_or_create_at(&a, &RoleId::architect(), 3).is_pending_creation());
        assert_eq!(store.handles_for(&a).len(), 2);
    }

    #[test]
    fn test_idle_handle_expires() {
        let store = SessionStore::new(TokenFormat::default(), Duration::from_secs(10));
        let (instance, role) = ids();
        let first = store.get_or_create_at(&instance, &role, 0);
        store.install_token(&first, ConversationToken::new("conv_01"), 0);

        let later = store.get_or_create_at(&instance, &role, 5_000);
        assert!(!later.is_pending_creation());

        let expired = store.get_or_create_at(&instance, &role, 20_000);
        assert!(expired.is_pending_creation());
    }

    #[test]
    fn test_touch_extends_lifetime() {
        let store = SessionStore::new(TokenFormat::default(), Duration::from_secs(10));
        let (instance, role) = ids();
        let handle = store.get_or_create_at(&instance, &role, 0);
        store.install_token(&handle, ConversationToken::new("conv_01"), 0);
        let handle = store.get_or_create_at(&instance, &role, 1);
        store.touch_at(&handle, 9_000);

        let still_there = store.get_or_create_at(&instance, &role, 15_000);
        assert_eq!(still_there.token(), handle.token());
    }

    #[test]
    fn test_install_token_ignored_for_replaced_handle() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        let stale = store.get_or_create_at(&instance, &role, 1);
        store.invalidate(&instance, &role, "reset");
        let _fresh = store.get_or_create_at(&instance, &role, 2);
        assert!(!store.install_token(&stale, ConversationToken::new("conv_01"), 3));
        assert!(store.get(&instance, &role).unwrap().is_pending_creation());
    }

    #[test]
    fn test_install_token_ignored_for_handle_replaced_in_same_millisecond() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        let stale = store.get_or_create_at(&instance, &role, 1);
        store.invalidate(&instance, &role, "reset");
        let fresh = store.get_or_create_at(&instance, &role, 1);
        assert_eq!(fresh.created_at(), stale.created_at());
        assert_ne!(fresh.generation(), stale.generation());

        assert!(!store.install_token(&stale, ConversationToken::new("conv_01"), 1));
        assert!(store.get(&instance, &role).unwrap().is_pending_creation());
        assert!(store.install_token(&fresh, ConversationToken::new("conv_02"), 1));
        assert_eq!(
            store.get(&instance, &role).unwrap().token().unwrap().as_str(),
            "conv_02"
        );
    }

    #[test]
    fn test_generation_survives_snapshot() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        store.get_or_create_at(&instance, &role, 1);
        store.invalidate(&instance, &role, "reset");
        let second = store.get_or_create_at(&instance, &role, 2);

        let restored = SessionStore::default();
        restored.restore(store.snapshot());
        restored.invalidate(&instance, &role, "reset again");
        let third = restored.get_or_create_at(&instance, &role, 3);
        assert_eq!(third.generation(), second.generation() + 1);
    }

    #[test]
    fn test_token_for_send_rejects_missing_scheme() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        let handle = store.get_or_create_at(&instance, &role, 1);
        store.install_token(&handle, ConversationToken::new("0b6f2c1e-8a4d"), 2);
        let handle = store.get_or_create_at(&instance, &role, 3);
        assert!(store.token_for_send(&handle).unwrap_err().is_malformed_handle());
    }

    #[test]
    fn test_snapshot_and_restore() {
        let store = SessionStore::default();
        let (instance, role) = ids();
        let handle = store.get_or_create_at(&instance, &role, 1);
        store.install_token(&handle, ConversationToken::new("conv_01"), 2);

        let restored = SessionStore::default();
        restored.restore(store.snapshot());
        let again = restored.get_or_create_at(&instance, &role, 3);
        assert_eq!(again.token().unwrap().as_str(), "conv_01");

        restored.discard_instance(&instance);
        assert!(restored.snapshot().is_empty());
    }
}
