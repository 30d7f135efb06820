use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use switchyard_core::TenantId;

/// Read-modify-write step passed to [`TenantStore::update_with`].
pub type KeyUpdate<'a, V> = Box<dyn FnOnce(Option<V>) -> Option<V> + 'a>;

/// Tenant-isolated key/value store backing the log models.
///
/// Every operation names its tenant; nothing can read or write across tenants.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: &TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: &TenantId, key: K, value: V);
    /// Insert unless the key exists. Returns the existing value when it does.
    fn insert_if_absent(&self, tenant_id: &TenantId, key: K, value: V) -> Option<V>;
    fn remove(&self, tenant_id: &TenantId, key: &K) -> Option<V>;
    /// Read-modify-write one key atomically. `update` gets the current value and
    /// returns what to store; `None` leaves the key absent. Returns the stored value.
    fn update_with(&self, tenant_id: &TenantId, key: K, update: KeyUpdate<'_, V>) -> Option<V>;
    /// Remove every value matching `predicate`; returns how many were removed.
    fn remove_where(&self, tenant_id: &TenantId, predicate: &dyn Fn(&V) -> bool) -> usize;
    /// Apply `update` to every value; it returns true when it changed the value.
    fn update_where(&self, tenant_id: &TenantId, update: &dyn Fn(&mut V) -> bool) -> usize;
    fn list(&self, tenant_id: &TenantId) -> Vec<V>;
    /// Clear all records for a tenant.
    fn clear_tenant(&self, tenant_id: &TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: &TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: &TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn insert_if_absent(&self, tenant_id: &TenantId, key: K, value: V) -> Option<V> {
        (**self).insert_if_absent(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: &TenantId, key: &K) -> Option<V> {
        (**self).remove(tenant_id, key)
    }

    fn update_with(&self, tenant_id: &TenantId, key: K, update: KeyUpdate<'_, V>) -> Option<V> {
        (**self).update_with(tenant_id, key, update)
    }

    fn remove_where(&self, tenant_id: &TenantId, predicate: &dyn Fn(&V) -> bool) -> usize {
        (**self).remove_where(tenant_id, predicate)
    }

    fn update_where(&self, tenant_id: &TenantId, update: &dyn Fn(&mut V) -> bool) -> usize {
        (**self).update_where(tenant_id, update)
    }

    fn list(&self, tenant_id: &TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: &TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: &TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: &TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id.clone()).or_default().insert(key, value);
        }
    }

    fn insert_if_absent(&self, tenant_id: &TenantId, key: K, value: V) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        let partition = map.entry(tenant_id.clone()).or_default();
        match partition.get(&key) {
            Some(existing) => Some(existing.clone()),
            None => {
                partition.insert(key, value);
                None
            }
        }
    }

    fn remove(&self, tenant_id: &TenantId, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.get_mut(tenant_id)?.remove(key)
    }

    fn update_with(&self, tenant_id: &TenantId, key: K, update: KeyUpdate<'_, V>) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        let partition = map.entry(tenant_id.clone()).or_default();
        let current = partition.remove(&key);
        let next = update(current)?;
        partition.insert(key, next.clone());
        Some(next)
    }

    fn remove_where(&self, tenant_id: &TenantId, predicate: &dyn Fn(&V) -> bool) -> usize {
        let Ok(mut map) = self.inner.write() else {
            return 0;
        };
        let Some(partition) = map.get_mut(tenant_id) else {
            return 0;
        };
        let before = partition.len();
        partition.retain(|_k, v| !predicate(v));
        before - partition.len()
    }

    fn update_where(&self, tenant_id: &TenantId, update: &dyn Fn(&mut V) -> bool) -> usize {
        let Ok(mut map) = self.inner.write() else {
            return 0;
        };
        let Some(partition) = map.get_mut(tenant_id) else {
            return 0;
        };
        let mut changed = 0;
        for value in partition.values_mut() {
            if update(value) {
                changed += 1;
            }
        }
        changed
    }

    fn list(&self, tenant_id: &TenantId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.get(tenant_id)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_tenant(&self, tenant_id: &TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> TenantId {
        TenantId::new(raw).unwrap()
    }

    #[test]
    fn partitions_are_isolated() {
        let store: InMemoryTenantStore<&str, i32> = InMemoryTenantStore::new();
        store.upsert(&t("a"), "k", 1);
        store.upsert(&t("b"), "k", 2);

        assert_eq!(store.get(&t("a"), &"k"), Some(1));
        assert_eq!(store.get(&t("b"), &"k"), Some(2));

        assert_eq!(store.remove_where(&t("a"), &|_| true), 1);
        assert_eq!(store.get(&t("b"), &"k"), Some(2));

        store.clear_tenant(&t("b"));
        assert!(store.list(&t("b")).is_empty());
    }

    #[test]
    fn insert_if_absent_keeps_first_value() {
        let store: InMemoryTenantStore<&str, i32> = InMemoryTenantStore::new();
        assert_eq!(store.insert_if_absent(&t("a"), "k", 1), None);
        assert_eq!(store.insert_if_absent(&t("a"), "k", 2), Some(1));
        assert_eq!(store.get(&t("a"), &"k"), Some(1));
    }

    #[test]
    fn update_with_sees_current_value_and_can_leave_key_absent() {
        let store: InMemoryTenantStore<&str, i32> = InMemoryTenantStore::new();

        assert_eq!(store.update_with(&t("a"), "k", Box::new(|cur| cur.map(|v| v + 1))), None);
        assert_eq!(store.get(&t("a"), &"k"), None);

        store.upsert(&t("a"), "k", 1);
        assert_eq!(store.update_with(&t("a"), "k", Box::new(|cur| cur.map(|v| v + 1))), Some(2));
        assert_eq!(store.get(&t("a"), &"k"), Some(2));
    }

    #[test]
    fn update_with_is_atomic_under_contention() {
        let store: InMemoryTenantStore<&str, u32> = InMemoryTenantStore::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        store.update_with(&t("a"), "k", Box::new(|cur| Some(cur.unwrap_or(0) + 1)));
                    }
                });
            }
        });
        assert_eq!(store.get(&t("a"), &"k"), Some(800));
    }

    #[test]
    fn update_where_counts_changes() {
        let store: InMemoryTenantStore<u8, i32> = InMemoryTenantStore::new();
        for (k, v) in [(1, 10), (2, 20), (3, 30)] {
            store.upsert(&t("a"), k, v);
        }

        let changed = store.update_where(&t("a"), &|v| {
            if *v >= 20 {
                *v += 1;
                true
            } else {
                false
            }
        });

        assert_eq!(changed, 2);
        let mut values = store.list(&t("a"));
        values.sort();
        assert_eq!(values, vec![10, 21, 31]);
    }
}
