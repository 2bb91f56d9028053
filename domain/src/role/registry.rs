//! Static role registry

use super::entities::Role;
use super::value_objects::RoleId;
use crate::core::error::DomainError;
use std::collections::BTreeMap;

/// Read-only mapping of role identifier to [`Role`]
///
/// Built once at startup; there is no way to register a role afterwards.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<RoleId, Role>,
}

impl RoleRegistry {
    /// Build a registry, rejecting duplicate identifiers and roles with a zero
    /// latency ceiling.
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Result<Self, DomainError> {
        let mut map = BTreeMap::new();
        for role in roles {
            if role.max_latency().is_zero() {
                return Err(DomainError::InvalidRole {
                    role: role.id().to_string(),
                    reason: "max latency must be greater than zero".to_string(),
                });
            }
            if role.prompt().as_str().trim().is_empty() {
                return Err(DomainError::InvalidRole {
                    role: role.id().to_string(),
                    reason: "prompt reference cannot be empty".to_string(),
                });
            }
            let id = role.id().clone();
            if map.insert(id.clone(), role).is_some() {
                return Err(DomainError::InvalidRole {
                    role: id.to_string(),
                    reason: "registered more than once".to_string(),
                });
            }
        }
        Ok(Self { roles: map })
    }

    pub fn standard() -> Self {
        let roles = Role::standard_set()
            .into_iter()
            .map(|role| (role.id().clone(), role))
            .collect();
        Self { roles }
    }

    pub fn resolve(&self, id: &str) -> Result<&Role, DomainError> {
        RoleId::new(id)
            .ok()
            .and_then(|id| self.roles.get(&id))
            .ok_or_else(|| DomainError::UnknownRole(id.to_string()))
    }

    pub fn get(&self, id: &RoleId) -> Result<&Role, DomainError> {
        self.roles
            .get(id)
            .ok_or_else(|| DomainError::UnknownRole(id.to_string()))
    }

    pub fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RoleId> {
        self.roles.keys()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
