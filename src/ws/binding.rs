//! Per-connection identity binding.
//!
//! A connection starts unbound, may bind exactly once, and is closed when
//! the socket goes away. Binding decides two things: which reports the
//! connection may submit, and which tenant's broadcasts it receives.

use crate::domain::{Binding, TenantId, TrackingEvent};

/// Binding lifecycle of a single connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum BindingState {
    /// No `register` accepted yet.
    #[default]
    Unbound,
    /// Bound to a tenant (and, for units, a unit).
    Bound(Binding),
    /// Socket closed; nothing more is delivered.
    Closed,
}

/// Result of a successful bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The connection was unbound and is now bound.
    Bound,
    /// The connection was already bound to the same identity.
    AlreadyBound,
}

/// Why a bind attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// The connection is bound to a different identity.
    #[error("connection already registered to a different identity")]
    AlreadyRegistered,
    /// The connection is closed.
    #[error("connection closed")]
    Closed,
}

/// Tracks the binding lifecycle of one connection and filters broadcasts
/// by its tenant.
#[derive(Debug, Default)]
pub struct ConnectionBinding {
    state: BindingState,
}

impl ConnectionBinding {
    /// Creates an unbound connection binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the connection. Re-binding to the same identity is accepted;
    /// a different identity is refused.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::AlreadyRegistered`] when bound elsewhere and
    /// [`BindError::Closed`] after [`Self::close`].
    pub fn bind(&mut self, binding: Binding) -> Result<BindOutcome, BindError> {
        match &self.state {
            BindingState::Unbound => {
                self.state = BindingState::Bound(binding);
                Ok(BindOutcome::Bound)
            }
            BindingState::Bound(current) if *current == binding => Ok(BindOutcome::AlreadyBound),
            BindingState::Bound(_) => Err(BindError::AlreadyRegistered),
            BindingState::Closed => Err(BindError::Closed),
        }
    }

    /// Returns the bound identity, if any.
    #[must_use]
    pub fn binding(&self) -> Option<&Binding> {
        match &self.state {
            BindingState::Bound(binding) => Some(binding),
            BindingState::Unbound | BindingState::Closed => None,
        }
    }

    /// Returns the bound tenant, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.binding().map(Binding::tenant_id)
    }

    /// Returns `true` if the event belongs to this connection's tenant.
    /// Unbound and closed connections match nothing.
    #[must_use]
    pub fn matches(&self, event: &TrackingEvent) -> bool {
        self.tenant_id()
            .is_some_and(|tenant| tenant == event.tenant_id())
    }

    /// Marks the connection closed.
    pub fn close(&mut self) {
        self.state = BindingState::Closed;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::UnitId;

    fn tenant(s: &str) -> TenantId {
        let Ok(id) = TenantId::parse(s) else {
            panic!("valid tenant");
        };
        id
    }

    fn unit(t: &str, u: &str) -> Binding {
        let Ok(unit_id) = UnitId::parse(u) else {
            panic!("valid unit");
        };
        Binding::Unit {
            tenant_id: tenant(t),
            unit_id,
        }
    }

    fn offline_event(t: &str) -> TrackingEvent {
        let Ok(unit_id) = UnitId::parse("u9") else {
            panic!("valid unit");
        };
        TrackingEvent::Offline {
            tenant_id: tenant(t),
            unit_id,
            ts: 0,
        }
    }

    #[test]
    fn unbound_matches_nothing() {
        let b = ConnectionBinding::new();
        assert!(b.binding().is_none());
        assert!(!b.matches(&offline_event("t1")));
    }

    #[test]
    fn bound_unit_matches_own_tenant_only() {
        let mut b = ConnectionBinding::new();
        assert_eq!(b.bind(unit("t1", "u1")), Ok(BindOutcome::Bound));
        assert!(b.matches(&offline_event("t1")));
        assert!(!b.matches(&offline_event("t2")));
    }

    #[test]
    fn viewer_matches_tenant() {
        let mut b = ConnectionBinding::new();
        assert_eq!(
            b.bind(Binding::Viewer {
                tenant_id: tenant("t2")
            }),
            Ok(BindOutcome::Bound)
        );
        assert!(b.matches(&offline_event("t2")));
        assert!(b.binding().is_some_and(|b| b.unit_id().is_none()));
    }

    #[test]
    fn rebind_same_identity_is_idempotent() {
        let mut b = ConnectionBinding::new();
        let _ = b.bind(unit("t1", "u1"));
        assert_eq!(b.bind(unit("t1", "u1")), Ok(BindOutcome::AlreadyBound));
    }

    #[test]
    fn rebind_different_identity_is_refused() {
        let mut b = ConnectionBinding::new();
        let _ = b.bind(unit("t1", "u1"));
        assert_eq!(b.bind(unit("t1", "u2")), Err(BindError::AlreadyRegistered));
        assert_eq!(b.bind(unit("t2", "u1")), Err(BindError::AlreadyRegistered));
        assert_eq!(b.tenant_id(), Some(&tenant("t1")));
    }

    #[test]
    fn closed_matches_nothing_and_refuses_bind() {
        let mut b = ConnectionBinding::new();
        let _ = b.bind(unit("t1", "u1"));
        b.close();
        assert!(!b.matches(&offline_event("t1")));
        assert_eq!(b.bind(unit("t1", "u1")), Err(BindError::Closed));
    }
}
