//! Object store seam.
//!
//! Uploaded files end up in a hosted binary store that issues public URLs.
//! That service is outside this workspace; the upload handler only talks to
//! it through [`ObjectStore`]. [`MemoryStore`] keeps objects in process for
//! tests and local development.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Default `Cache-Control` max-age (seconds) attached to stored uploads.
pub const DEFAULT_CACHE_CONTROL: &str = "3600";

/// Options for a single `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// Media type recorded with the object.
    pub content_type: String,
    /// Cache-Control max-age, in seconds.
    pub cache_control: String,
    /// Replace an existing object with the same name.
    pub upsert: bool,
}

impl PutOptions {
    /// Options for a new object of the given media type.
    #[must_use]
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            upsert: false,
        }
    }

    /// Set the cache-control max-age.
    #[must_use]
    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = value.into();
        self
    }

    /// Allow overwriting.
    #[must_use]
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

/// Failure reported by the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Create an error with the store's message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The store's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

/// A binary object store with public URLs.
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `name`.
    fn put(&self, name: &str, data: &[u8], options: &PutOptions) -> Result<(), StoreError>;

    /// Public URL for an object name.
    fn public_url(&self, name: &str) -> String;
}

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object bytes.
    pub data: Vec<u8>,
    /// Media type given at upload.
    pub content_type: String,
    /// Cache-Control max-age given at upload.
    pub cache_control: String,
}

/// In-process [`ObjectStore`].
#[derive(Debug)]
pub struct MemoryStore {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    /// Create an empty store whose public URLs start with `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Get a copy of a stored object.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<StoredObject> {
        self.objects.lock().get(name).cloned()
    }

    /// Names of all stored objects, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.objects.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, name: &str, data: &[u8], options: &PutOptions) -> Result<(), StoreError> {
        let mut objects = self.objects.lock();
        if !options.upsert && objects.contains_key(name) {
            return Err(StoreError::new("The resource already exists"));
        }
        objects.insert(
            name.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: options.content_type.clone(),
                cache_control: options.cache_control.clone(),
            },
        );
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let store = MemoryStore::new("https://cdn.example.com/images/");
        store
            .put("a.png", b"PNG", &PutOptions::new("image/png"))
            .unwrap();

        let object = store.get("a.png").unwrap();
        assert_eq!(object.data, b"PNG".to_vec());
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.cache_control, DEFAULT_CACHE_CONTROL);
        assert_eq!(
            store.public_url("a.png"),
            "https://cdn.example.com/images/a.png"
        );
    }

    #[test]
    fn refuses_overwrite_without_upsert() {
        let store = MemoryStore::new("http://localhost");
        let options = PutOptions::new("text/plain");
        store.put("x", b"1", &options).unwrap();

        let err = store.put("x", b"2", &options).unwrap_err();
        assert_eq!(err.message(), "The resource already exists");
        assert_eq!(store.get("x").unwrap().data, b"1".to_vec());

        store.put("x", b"3", &options.clone().upsert(true)).unwrap();
        assert_eq!(store.get("x").unwrap().data, b"3".to_vec());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let store = MemoryStore::new("http://localhost");
        assert!(store.is_empty());
        for name in ["b", "a", "c"] {
            store
                .put(name, b"", &PutOptions::new("text/plain").cache_control("60"))
                .unwrap();
        }
        assert_eq!(store.names(), vec!["a", "b", "c"]);
        assert_eq!(store.get("a").unwrap().cache_control, "60");
    }
}
