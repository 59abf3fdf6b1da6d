//! The shared key/value container passed through a run

use super::keys;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A value stored in a [`StateBag`]
pub type StateValue = Arc<dyn Any + Send + Sync>;

/// String-keyed map of arbitrary values scoped to one build run.
///
/// Clones share the same underlying map, so the run loop, the cancellation
/// watcher and any task a step spawns all see the same entries. Every
/// access goes through an internal lock; no lock is ever held across an
/// `.await`.
///
/// Reading a key with [`StateBag::get`] is a contract: the caller asserts an
/// earlier step guarantees the key. A missing or mistyped key panics. Use
/// [`StateBag::get_ok`] for optional keys.
#[derive(Clone, Default)]
pub struct StateBag {
    entries: Arc<RwLock<HashMap<String, StateValue>>>,
}

impl fmt::Debug for StateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBag")
            .field("keys", &self.keys())
            .finish()
    }
}

impl StateBag {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Panics
    ///
    /// Panics if `key` is reserved for the runner.
    pub fn put<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        assert_writable(&key, "put");
        self.write().insert(key, Arc::new(value));
    }

    /// Store a runner-owned value, bypassing the reserved-key check
    pub(crate) fn put_reserved<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.write().insert(key.to_string(), Arc::new(value));
    }

    /// Fetch the value under `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is absent or holds a value that is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Arc<T> {
        let value = self.read().get(key).cloned();
        match value {
            None => panic!("state key '{key}' is not set"),
            Some(value) => value.downcast::<T>().unwrap_or_else(|_| {
                panic!("state key '{key}' does not hold a {}", type_name::<T>())
            }),
        }
    }

    /// Fetch the value under `key` if it is present and is a `T`
    pub fn get_ok<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Fetch the value under `key`, inserting `init()` first if absent.
    ///
    /// The check and the insert happen under one write lock, so concurrent
    /// callers all receive the same value.
    ///
    /// # Panics
    ///
    /// Panics if `key` is reserved, or holds a value that is not a `T`.
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        assert_writable(key, "insert");
        let mut entries = self.write();
        let value = entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(init()) as StateValue)
            .clone();
        drop(entries);

        value
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("state key '{key}' does not hold a {}", type_name::<T>()))
    }

    /// Whether any value is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Remove `key`, returning whether it was present.
    ///
    /// # Panics
    ///
    /// Panics if `key` is reserved for the runner.
    pub fn remove(&self, key: &str) -> bool {
        assert_writable(key, "remove");
        self.write().remove(key).is_some()
    }

    /// All keys currently set, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether the runner has flagged this run as cancelled
    pub fn is_cancelled(&self) -> bool {
        keys::CANCELLED.get_ok(self).is_some_and(|flag| *flag)
    }

    /// Whether a step halted this run
    pub fn is_halted(&self) -> bool {
        keys::HALTED.get_ok(self).is_some_and(|flag| *flag)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StateValue>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StateValue>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn assert_writable(key: &str, operation: &str) {
    if keys::is_reserved(key) {
        panic!("cannot {operation} state key '{key}': it is reserved for the runner");
    }
}

/// Typed handle for a well-known [`StateBag`] key.
///
/// The bag itself stays dynamically typed; a `StateKey<T>` fixes the value
/// type at the point of use so callers do not repeat it.
pub struct StateKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateKey<{}>({:?})", type_name::<T>(), self.name)
    }
}

impl<T: Any + Send + Sync> StateKey<T> {
    /// See [`StateBag::put`]
    pub fn put(&self, state: &StateBag, value: T) {
        state.put(self.name, value);
    }

    /// See [`StateBag::get`]
    pub fn get(&self, state: &StateBag) -> Arc<T> {
        state.get(self.name)
    }

    /// See [`StateBag::get_ok`]
    pub fn get_ok(&self, state: &StateBag) -> Option<Arc<T>> {
        state.get_ok(self.name)
    }

    /// See [`StateBag::get_or_insert_with`]
    pub fn get_or_insert_with(&self, state: &StateBag, init: impl FnOnce() -> T) -> Arc<T> {
        state.get_or_insert_with(self.name, init)
    }

    /// See [`StateBag::remove`]
    pub fn remove(&self, state: &StateBag) -> bool {
        state.remove(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCE_ID: StateKey<String> = StateKey::new("instance_id");

    #[test]
    fn test_put_then_get() {
        let state = StateBag::new();
        state.put("disk_size", 40_u64);
        assert_eq!(*state.get::<u64>("disk_size"), 40);
    }

    #[test]
    fn test_put_overwrites() {
        let state = StateBag::new();
        state.put("zone", "a".to_string());
        state.put("zone", "b".to_string());
        assert_eq!(state.get::<String>("zone").as_str(), "b");
        assert_eq!(state.len(), 1);
    }

    #[test]
    #[should_panic(expected = "state key 'missing' is not set")]
    fn test_get_missing_key_panics() {
        let state = StateBag::new();
        let _ = state.get::<String>("missing");
    }

    #[test]
    #[should_panic(expected = "does not hold a")]
    fn test_get_wrong_type_panics() {
        let state = StateBag::new();
        state.put("disk_size", 40_u64);
        let _ = state.get::<String>("disk_size");
    }

    #[test]
    fn test_get_ok_absent_and_mistyped() {
        let state = StateBag::new();
        assert!(state.get_ok::<u64>("disk_size").is_none());

        state.put("disk_size", 40_u64);
        assert!(state.get_ok::<String>("disk_size").is_none());
        assert_eq!(state.get_ok::<u64>("disk_size").as_deref(), Some(&40));
    }

    #[test]
    fn test_clones_share_entries() {
        let state = StateBag::new();
        let other = state.clone();
        other.put("device", "/dev/sdb".to_string());
        assert!(state.contains("device"));
    }

    #[test]
    fn test_remove() {
        let state = StateBag::new();
        state.put("device", "/dev/sdb".to_string());
        assert!(state.remove("device"));
        assert!(!state.remove("device"));
        assert!(state.is_empty());
    }

    #[test]
    #[should_panic(expected = "reserved for the runner")]
    fn test_put_reserved_key_panics() {
        let state = StateBag::new();
        state.put(keys::CANCELLED.name(), true);
    }

    #[test]
    #[should_panic(expected = "reserved for the runner")]
    fn test_remove_reserved_key_panics() {
        let state = StateBag::new();
        state.put_reserved(keys::HALTED.name(), true);
        state.remove(keys::HALTED.name());
    }

    #[test]
    fn test_runner_flags() {
        let state = StateBag::new();
        assert!(!state.is_cancelled());
        assert!(!state.is_halted());

        state.put_reserved(keys::CANCELLED.name(), true);
        state.put_reserved(keys::HALTED.name(), true);
        assert!(state.is_cancelled());
        assert!(state.is_halted());
    }

    #[test]
    fn test_get_or_insert_with_keeps_first_value() {
        let state = StateBag::new();
        let first = state.get_or_insert_with("counter", || 1_u32);
        let second = state.get_or_insert_with("counter", || 2_u32);
        assert_eq!(*first, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_typed_key_accessors() {
        let state = StateBag::new();
        assert!(INSTANCE_ID.get_ok(&state).is_none());

        INSTANCE_ID.put(&state, "i-0abc".to_string());
        assert_eq!(INSTANCE_ID.get(&state).as_str(), "i-0abc");
        assert_eq!(state.get::<String>("instance_id").as_str(), "i-0abc");

        assert!(INSTANCE_ID.remove(&state));
        assert!(!state.contains(INSTANCE_ID.name()));
    }

    #[test]
    fn test_keys_sorted() {
        let state = StateBag::new();
        state.put("b", 1_i32);
        state.put("a", 2_i32);
        assert_eq!(state.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let state = StateBag::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                state.put(format!("key_{i}"), i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(state.len(), 16);
    }
}
