//! Conversation handle entity

use super::token::{ConversationToken, TokenFormat};
use crate::core::error::DomainError;
use crate::core::time::Millis;
use crate::role::value_objects::RoleId;
use crate::workflow::instance::InstanceId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleState {
    Active,
    Expired,
    Invalid,
}

/// One conversation per (instance, role)
///
/// A fresh handle has no token ("pending creation"); the first successful
/// exchange installs the token the agent reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHandle {
    instance: InstanceId,
    role: RoleId,
    token: Option<ConversationToken>,
    /// Bumped every time the handle for (instance, role) is replaced
    #[serde(default)]
    generation: u64,
    created_at: Millis,
    last_activity: Millis,
    state: HandleState,
    #[serde(default)]
    invalid_reason: Option<String>,
}

impl ConversationHandle {
    pub fn new(instance: InstanceId, role: RoleId, now: Millis) -> Self {
        Self {
            instance,
            role,
            token: None,
            generation: 0,
            created_at: now,
            last_activity: now,
            state: HandleState::Active,
            invalid_reason: None,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn role(&self) -> &RoleId {
        &self.role
    }

    pub fn token(&self) -> Option<&ConversationToken> {
        self.token.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn created_at(&self) -> Millis {
        self.created_at
    }

    pub fn last_activity(&self) -> Millis {
        self.last_activity
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn invalid_reason(&self) -> Option<&str> {
        self.invalid_reason.as_deref()
    }

    pub fn is_pending_creation(&self) -> bool {
        self.token.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.state == HandleState::Active
    }

    /// Idle for longer than `ttl_ms` at `now`
    pub fn is_idle_past(&self, now: Millis, ttl_ms: Millis) -> bool {
        now.saturating_sub(self.last_activity) > ttl_ms
    }

    pub fn touch(&mut self, now: Millis) {
        self.last_activity = self.last_activity.max(now);
    }

    /// Install the token reported by the agent on first contact. A token is
    /// never replaced once installed.
    pub fn install_token(&mut self, token: ConversationToken, now: Millis) -> bool {
        if self.token.is_some() || !self.is_active() {
            return false;
        }
        self.token = Some(token);
        self.touch(now);
        true
    }

    pub fn invalidate(&mut self, reason: impl Into<String>) {
        self.state = HandleState::Invalid;
        self.invalid_reason = Some(reason.into());
    }

    pub fn expire(&mut self) {
        if self.state == HandleState::Active {
            self.state = HandleState::Expired;
        }
    }

    /// The token to send with the next request, checked against `format`.
    ///
    /// `Ok(None)` means a fresh session must be requested.
    pub fn token_for_send(
        &self,
        format: &TokenFormat,
    ) -> Result<Option<&ConversationToken>, DomainError> {
        if !self.is_active() {
            return Err(DomainError::MalformedHandle {
                role: self.role.to_string(),
                reason: match (&self.state, &self.invalid_reason) {
                    (HandleState::Invalid, Some(reason)) => {
                        format!("handle was invalidated: {}", reason)
                    }
                    (HandleState::Invalid, None) => "handle was invalidated".to_string(),
                    _ => "handle has expired".to_string(),
                },
            });
        }
        match &self.token {
            None => Ok(None),
            Some(token) => format
                .check(token)
                .map(|_| Some(token))
                .map_err(|reason| DomainError::MalformedHandle {
                    role: self.role.to_string(),
                    reason,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ConversationHandle {
        ConversationHandle::new(InstanceId::new("wf"), RoleId::reviewer(), 100)
    }

    #[test]
    fn test_new_handle_is_pending_creation() {
        let h = handle();
        assert!(h.is_pending_creation());
        assert!(h.is_active());
        assert_eq!(h.token_for_send(&TokenFormat::default()).unwrap(), None);
    }

    #[test]
    fn test_install_token_once() {
        let mut h = handle();
        assert!(h.install_token(ConversationToken::new("conv_abc"), 200));
        assert!(!h.install_token(ConversationToken::new("conv_def"), 300));
        assert_eq!(h.token().unwrap().as_str(), "conv_abc");
        assert_eq!(h.last_activity(), 200);
    }

    #[test]
    fn test_malformed_token_rejected_before_send() {
        let mut h = handle();
        h.install_token(ConversationToken::new("abc-123"), 200);
        let err = h.token_for_send(&TokenFormat::default()).unwrap_err();
        assert!(err.is_malformed_handle());
    }

    #[test]
    fn test_invalid_handle_cannot_send() {
        let mut h = handle();
        h.install_token(ConversationToken::new("conv_abc"), 200);
        h.invalidate("agent crashed");
        assert_eq!(h.state(), HandleState::Invalid);
        assert!(h.token_for_send(&TokenFormat::default()).is_err());
        assert!(!h.install_token(ConversationToken::new("conv_def"), 300));
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut h = handle();
        h.touch(500);
        h.touch(400);
        assert_eq!(h.last_activity(), 500);
    }

    #[test]
    fn test_idle_past() {
        let h = handle();
        assert!(!h.is_idle_past(150, 100));
        assert!(h.is_idle_past(201, 100));
    }

    #[test]
    fn test_expire_only_from_active() {
        let mut h = handle();
        h.invalidate("x");
        h.expire();
        assert_eq!(h.state(), HandleState::Invalid);
    }
}
