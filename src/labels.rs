use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Label attached by the sink to every stream it pushes. It is applied after
/// user labels so configuration cannot drop it.
pub const AGENT_LABEL_KEY: &str = "loki_sink";
pub const AGENT_LABEL_VALUE: &str = "v1";

/// Returns `true` iff `name` is usable as a Loki label name.
///
/// A valid name is non-empty, starts with `[A-Za-z_:]` and continues with
/// `[A-Za-z0-9_:]`.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Thread-safe label map shared by every batch a sink sends.
///
/// Every operation is a single short critical section; callers that need to
/// serialize labels take a [`snapshot`](LabelStore::snapshot) instead of
/// holding the lock.
#[derive(Debug, Default)]
pub struct LabelStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl LabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a label. Invalid names and empty values are
    /// dropped without error.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        if value.is_empty() || !is_valid_label_name(&key) {
            return false;
        }
        self.inner.lock().insert(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).cloned()
    }

    /// Independent copy of the current labels.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.lock().clone()
    }

    pub fn delete(&self, key: &str) -> Option<String> {
        self.inner.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_name_validity() {
        assert!(!is_valid_label_name(""));
        assert!(!is_valid_label_name("ut-key"));
        assert!(is_valid_label_name("ut_key"));
        assert!(is_valid_label_name(":ns:key"));
        assert!(is_valid_label_name("_k9"));
        assert!(!is_valid_label_name("9key"));
        assert!(!is_valid_label_name("kéy"));
        assert!(!is_valid_label_name("key space"));
    }

    #[test]
    fn set_get_delete() {
        let store = LabelStore::new();

        assert!(store.set("key", "value"));
        assert_eq!(store.get("key").as_deref(), Some("value"));
        assert_eq!(store.snapshot().len(), 1);

        assert_eq!(store.delete("key").as_deref(), Some("value"));
        assert!(store.snapshot().is_empty());
        assert_eq!(store.get("key"), None);
        assert_eq!(store.delete("key"), None);
    }

    #[test]
    fn rejects_invalid_entries() {
        let store = LabelStore::new();

        assert!(!store.set("ut-key", "value"));
        assert!(!store.set("", "value"));
        assert!(!store.set("key", ""));
        assert!(store.is_empty());
    }

    #[test]
    fn set_overwrites() {
        let store = LabelStore::new();
        store.set("env", "dev");
        store.set("env", "prod");
        assert_eq!(store.get("env").as_deref(), Some("prod"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_is_detached() {
        let store = LabelStore::new();
        store.set("a", "1");

        let snap = store.snapshot();
        store.set("b", "2");
        store.delete("a");

        assert_eq!(snap.get("a").map(String::as_str), Some("1"));
        assert!(!snap.contains_key("b"));
    }
}
