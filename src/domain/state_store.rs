//! Concurrent tenant → unit → state storage with per-unit locking.
//!
//! [`UnitStateStore`] keeps one map per tenant. Each unit sits behind its
//! own [`tokio::sync::Mutex`], so read-modify-write sequences on the same
//! unit are serialized while different units update concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::identity::{TenantId, UnitId};
use super::unit_state::UnitState;

/// Per-unit cell. `None` until the first accepted report is committed.
pub type UnitSlot = Arc<Mutex<Option<UnitState>>>;

/// Aggregate unit counts across all tenants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    /// Tenants with at least one map entry.
    pub tenants: usize,
    /// Units currently online.
    pub active_units: usize,
    /// Units currently marked offline.
    pub offline_units: usize,
}

/// Shared latest-known-state store for every tenant and unit.
///
/// # Concurrency
///
/// - The outer `RwLock` guards only map shape (adding units, pruning
///   tenants); it is never held while a unit lock is awaited.
/// - A unit's full state is replaced under its own mutex.
#[derive(Debug, Default)]
pub struct UnitStateStore {
    tenants: RwLock<HashMap<TenantId, HashMap<UnitId, UnitSlot>>>,
}

impl UnitStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lockable slot for a unit, creating an empty one if the
    /// unit has never been seen.
    pub async fn slot(&self, tenant_id: &TenantId, unit_id: &UnitId) -> UnitSlot {
        {
            let map = self.tenants.read().await;
            if let Some(slot) = map.get(tenant_id).and_then(|units| units.get(unit_id)) {
                return Arc::clone(slot);
            }
        }
        let mut map = self.tenants.write().await;
        let slot = map
            .entry(tenant_id.clone())
            .or_default()
            .entry(unit_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)));
        Arc::clone(slot)
    }

    /// Returns a copy of the unit's current state, if any.
    pub async fn get(&self, tenant_id: &TenantId, unit_id: &UnitId) -> Option<UnitState> {
        let slot = {
            let map = self.tenants.read().await;
            map.get(tenant_id)
                .and_then(|units| units.get(unit_id))
                .map(Arc::clone)?
        };
        let state = *slot.lock().await;
        state
    }

    /// Replaces the unit's state.
    pub async fn set(&self, tenant_id: &TenantId, unit_id: &UnitId, state: UnitState) {
        let slot = self.slot(tenant_id, unit_id).await;
        *slot.lock().await = Some(state);
    }

    /// Visits every populated unit of a tenant under that unit's lock.
    ///
    /// Mutations made by `f` are committed when the lock is released.
    pub async fn for_each_unit<F>(&self, tenant_id: &TenantId, mut f: F)
    where
        F: FnMut(&UnitId, &mut UnitState),
    {
        for (unit_id, slot) in self.slots(tenant_id).await {
            let mut guard = slot.lock().await;
            if let Some(state) = guard.as_mut() {
                f(&unit_id, state);
            }
        }
    }

    /// Returns a copy of every populated unit of a tenant, sorted by unit id.
    pub async fn snapshot(&self, tenant_id: &TenantId) -> Vec<(UnitId, UnitState)> {
        let mut units = Vec::new();
        for (unit_id, slot) in self.slots(tenant_id).await {
            if let Some(state) = *slot.lock().await {
                units.push((unit_id, state));
            }
        }
        units.sort_by(|a, b| a.0.cmp(&b.0));
        units
    }

    /// Returns all tenant ids currently present.
    pub async fn tenants(&self) -> Vec<TenantId> {
        self.tenants.read().await.keys().cloned().collect()
    }

    /// Removes a tenant entry if it tracks no units.
    ///
    /// Slots that were created but never committed count as empty, unless
    /// another task still holds them. Returns `true` if the tenant was
    /// removed.
    pub async fn prune_empty_tenant(&self, tenant_id: &TenantId) -> bool {
        let mut map = self.tenants.write().await;
        let Some(units) = map.get(tenant_id) else {
            return false;
        };
        for slot in units.values() {
            if Arc::strong_count(slot) > 1 {
                return false;
            }
            match slot.try_lock() {
                Ok(guard) if guard.is_none() => {}
                _ => return false,
            }
        }
        map.remove(tenant_id);
        true
    }

    /// Counts tenants and online/offline units.
    pub async fn counts(&self) -> StoreCounts {
        let tenant_ids = self.tenants().await;
        let mut counts = StoreCounts {
            tenants: tenant_ids.len(),
            ..StoreCounts::default()
        };
        for tenant_id in &tenant_ids {
            self.for_each_unit(tenant_id, |_, state| {
                if state.is_offline {
                    counts.offline_units += 1;
                } else {
                    counts.active_units += 1;
                }
            })
            .await;
        }
        counts
    }

    /// Clones the slot handles of a tenant so the outer lock can be
    /// released before any unit lock is awaited.
    pub async fn slots(&self, tenant_id: &TenantId) -> Vec<(UnitId, UnitSlot)> {
        let map = self.tenants.read().await;
        map.get(tenant_id)
            .map(|units| {
                units
                    .iter()
                    .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::MovementStatus;

    fn ids(tenant: &str, unit: &str) -> (TenantId, UnitId) {
        let (Ok(t), Ok(u)) = (TenantId::parse(tenant), UnitId::parse(unit)) else {
            panic!("valid ids");
        };
        (t, u)
    }

    fn state(ts: i64) -> UnitState {
        UnitState {
            lat: -34.6,
            lng: -58.38,
            ts,
            movement_status: MovementStatus::Stopped,
            moving_streak: 0,
            is_offline: false,
        }
    }

    #[tokio::test]
    async fn get_unknown_unit_is_absent() {
        let store = UnitStateStore::new();
        let (t, u) = ids("t1", "u1");
        assert!(store.get(&t, &u).await.is_none());
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = UnitStateStore::new();
        let (t, u) = ids("t1", "u1");
        store.set(&t, &u, state(42)).await;
        assert_eq!(store.get(&t, &u).await, Some(state(42)));
    }

    #[tokio::test]
    async fn for_each_unit_mutates_in_place() {
        let store = UnitStateStore::new();
        let (t, u1) = ids("t1", "u1");
        let (_, u2) = ids("t1", "u2");
        store.set(&t, &u1, state(1)).await;
        store.set(&t, &u2, state(2)).await;

        let mut visited = 0;
        store
            .for_each_unit(&t, |_, s| {
                visited += 1;
                s.mark_offline();
            })
            .await;
        assert_eq!(visited, 2);

        let counts = store.counts().await;
        assert_eq!(counts.offline_units, 2);
        assert_eq!(counts.active_units, 0);
    }

    #[tokio::test]
    async fn snapshot_is_scoped_and_sorted() {
        let store = UnitStateStore::new();
        let (t1, b) = ids("t1", "b");
        let (_, a) = ids("t1", "a");
        let (t2, c) = ids("t2", "c");
        store.set(&t1, &b, state(1)).await;
        store.set(&t1, &a, state(2)).await;
        store.set(&t2, &c, state(3)).await;

        let snap = store.snapshot(&t1).await;
        let names: Vec<&str> = snap.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn prune_keeps_tenants_with_units() {
        let store = UnitStateStore::new();
        let (t, u) = ids("t1", "u1");
        store.set(&t, &u, state(1)).await;
        assert!(!store.prune_empty_tenant(&t).await);
        assert_eq!(store.tenants().await.len(), 1);
    }

    #[tokio::test]
    async fn prune_removes_tenant_with_only_empty_slots() {
        let store = UnitStateStore::new();
        let (t, u) = ids("t1", "u1");
        drop(store.slot(&t, &u).await);
        assert!(store.prune_empty_tenant(&t).await);
        assert!(store.tenants().await.is_empty());
    }

    #[tokio::test]
    async fn prune_skips_slots_held_elsewhere() {
        let store = UnitStateStore::new();
        let (t, u) = ids("t1", "u1");
        let held = store.slot(&t, &u).await;
        assert!(!store.prune_empty_tenant(&t).await);
        drop(held);
        assert!(store.prune_empty_tenant(&t).await);
    }

    #[tokio::test]
    async fn concurrent_updates_to_one_unit_are_not_lost() {
        let store = Arc::new(UnitStateStore::new());
        let (t, u) = ids("t1", "u1");
        store.set(&t, &u, state(0)).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let (t, u) = (t.clone(), u.clone());
            handles.push(tokio::spawn(async move {
                let slot = store.slot(&t, &u).await;
                let mut guard = slot.lock().await;
                if let Some(s) = guard.as_mut() {
                    s.moving_streak += 1;
                }
            }));
        }
        for h in handles {
            let _ = h.await;
        }

        let Some(s) = store.get(&t, &u).await else {
            panic!("state present");
        };
        assert_eq!(s.moving_streak, 50);
    }
}
