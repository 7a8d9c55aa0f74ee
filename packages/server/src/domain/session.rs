//! Session registry: which authenticated connection holds which role.

use std::collections::{HashMap, HashSet};

use super::{ConnectionId, RegistryError, Role};

/// What a departing connection was when it left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The connection was the authoritative host.
    ActiveHost,
    Viewer,
    /// The connection never made it into the registry.
    Unknown,
}

/// Process-wide membership of the relay.
///
/// Invariants:
/// - `active_host`, if set, names a connection whose role is [`Role::Host`]
/// - it is the only connection with that role
/// - a connection keeps the role it was registered with until it is removed
#[derive(Debug, Default)]
pub struct SessionRegistry {
    roles: HashMap<ConnectionId, Role>,
    active_host: Option<ConnectionId>,
    viewers: HashSet<ConnectionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the viewer group.
    pub fn join_viewer(&mut self, id: ConnectionId) -> Result<(), RegistryError> {
        self.ensure_unassigned(&id)?;
        self.roles.insert(id, Role::Viewer);
        self.viewers.insert(id);
        Ok(())
    }

    /// Make `id` the active host.
    ///
    /// Returns the previously active host, if any. The replaced connection is
    /// dropped from the registry, so it no longer receives broadcasts and its
    /// events are ignored.
    pub fn attach_host(&mut self, id: ConnectionId) -> Result<Option<ConnectionId>, RegistryError> {
        self.ensure_unassigned(&id)?;
        self.roles.insert(id, Role::Host);
        let previous = self.active_host.replace(id);
        if let Some(previous) = &previous {
            self.roles.remove(previous);
        }
        Ok(previous)
    }

    /// Forget `id` entirely.
    pub fn remove(&mut self, id: &ConnectionId) -> Departure {
        match self.roles.remove(id) {
            Some(Role::Viewer) => {
                self.viewers.remove(id);
                Departure::Viewer
            }
            Some(Role::Host) => {
                self.active_host = None;
                Departure::ActiveHost
            }
            None => Departure::Unknown,
        }
    }

    pub fn role_of(&self, id: &ConnectionId) -> Option<Role> {
        self.roles.get(id).copied()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.roles.contains_key(id)
    }

    pub fn active_host(&self) -> Option<ConnectionId> {
        self.active_host
    }

    pub fn is_active_host(&self, id: &ConnectionId) -> bool {
        self.active_host.as_ref() == Some(id)
    }

    /// Viewer ids, sorted for stable fan-out order.
    pub fn viewer_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.viewers.iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Every registered connection, sorted.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.roles.keys().copied().collect();
        ids.sort();
        ids
    }

    fn ensure_unassigned(&self, id: &ConnectionId) -> Result<(), RegistryError> {
        match self.roles.get(id) {
            Some(role) => Err(RegistryError::RoleAlreadyAssigned {
                id: *id,
                role: *role,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_viewer_adds_to_viewer_group() {
        // テスト項目: viewer として登録すると viewer グループに追加される
        // given (前提条件):
        let mut registry = SessionRegistry::new();
        let id = ConnectionId::generate();

        // when (操作):
        let result = registry.join_viewer(id);

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(registry.viewer_count(), 1);
        assert_eq!(registry.role_of(&id), Some(Role::Viewer));
        assert_eq!(registry.active_host(), None);
    }

    #[test]
    fn test_connection_cannot_take_second_role() {
        // テスト項目: 1 つの接続は 2 つ目のロールを取得できない
        // given (前提条件):
        let mut registry = SessionRegistry::new();
        let id = ConnectionId::generate();
        registry.join_viewer(id).unwrap();

        // when (操作):
        let result = registry.attach_host(id);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RegistryError::RoleAlreadyAssigned {
                id,
                role: Role::Viewer
            })
        );
        assert_eq!(registry.active_host(), None);
    }

    #[test]
    fn test_attach_host_replaces_previous_host() {
        // テスト項目: 2 台目の host は前の host を置き換える
        // given (前提条件):
        let mut registry = SessionRegistry::new();
        let first = ConnectionId::generate();
        let second = ConnectionId::generate();
        registry.attach_host(first).unwrap();

        // when (操作):
        let replaced = registry.attach_host(second).unwrap();

        // then (期待する結果):
        assert_eq!(replaced, Some(first));
        assert!(registry.is_active_host(&second));
        assert_eq!(registry.role_of(&first), None);
        assert_eq!(registry.connection_ids(), vec![second]);
    }

    #[test]
    fn test_remove_reports_departure_kind() {
        // テスト項目: 削除時に切断した接続の種類が返される
        // given (前提条件):
        let mut registry = SessionRegistry::new();
        let viewer = ConnectionId::generate();
        let stale = ConnectionId::generate();
        let host = ConnectionId::generate();
        registry.join_viewer(viewer).unwrap();
        registry.attach_host(stale).unwrap();
        registry.attach_host(host).unwrap();

        // when (操作):
        let stale_departure = registry.remove(&stale);
        let host_departure = registry.remove(&host);
        let viewer_departure = registry.remove(&viewer);
        let unknown_departure = registry.remove(&ConnectionId::generate());

        // then (期待する結果): 置き換えられた host は既に登録されていない
        assert_eq!(stale_departure, Departure::Unknown);
        assert_eq!(host_departure, Departure::ActiveHost);
        assert_eq!(viewer_departure, Departure::Viewer);
        assert_eq!(unknown_departure, Departure::Unknown);
        assert_eq!(registry.active_host(), None);
        assert_eq!(registry.viewer_count(), 0);
        assert!(registry.connection_ids().is_empty());
    }
}
