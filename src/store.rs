//! Key-value persistence for preferences and widget layout

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::models::{Preferences, StoredGeometry};
use crate::paths::{
    KEY_API_KEY, KEY_MODEL_NAME, KEY_NO_MARKDOWN, KEY_USE_DROPDOWN, KEY_WINDOW_POSITION,
    KEY_WINDOW_ZOOM, PREFERENCE_KEYS,
};

/// One key-value storage domain (synced or local)
#[async_trait(?Send)]
pub trait StorageArea {
    /// Returns the subset of `keys` that are present
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    /// Writes every entry of `items`, leaving other keys untouched
    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError>;
}

#[async_trait(?Send)]
impl<T: StorageArea + ?Sized> StorageArea for Rc<T> {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        (**self).get(keys).await
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        (**self).set(items).await
    }
}

/// In-memory storage area with an optional per-item byte quota
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<Map<String, Value>>,
    quota: Option<usize>,
    writes: Cell<usize>,
    fail_reads: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects any write whose serialized item exceeds `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Number of successful `set` calls
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.items.borrow().get(key).cloned()
    }

    /// While set, every `get` fails with a backend error
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.items.borrow_mut().insert(key.to_string(), value);
    }
}

#[async_trait(?Send)]
impl StorageArea for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        if self.fail_reads.get() {
            return Err(StoreError::Backend("storage area unavailable".to_string()));
        }
        let items = self.items.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| items.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            for (key, value) in &items {
                // Chrome counts the key plus the JSON encoding of the value
                let bytes = key.len() + value.to_string().len();
                if bytes > quota {
                    return Err(StoreError::QuotaExceeded {
                        key: key.clone(),
                        bytes,
                        quota,
                    });
                }
            }
        }
        self.items.borrow_mut().extend(items);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Typed access to the synced preference domain and the local layout domain
pub struct SettingsStore<S> {
    sync: S,
    local: S,
}

impl<S: StorageArea> SettingsStore<S> {
    pub fn new(sync: S, local: S) -> Self {
        Self { sync, local }
    }

    pub fn sync_area(&self) -> &S {
        &self.sync
    }

    pub fn local_area(&self) -> &S {
        &self.local
    }

    /// Reads whatever part of the Preference Record exists
    pub async fn load_preferences(&self) -> Result<Preferences, StoreError> {
        let items = self.sync.get(&PREFERENCE_KEYS).await?;
        Ok(Preferences {
            api_key: items
                .get(KEY_API_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            model_name: items
                .get(KEY_MODEL_NAME)
                .and_then(Value::as_str)
                .map(str::to_string),
            use_dropdown: items.get(KEY_USE_DROPDOWN).and_then(Value::as_bool),
            no_markdown: items
                .get(KEY_NO_MARKDOWN)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Writes the full Preference Record in one call
    pub async fn save_preferences(&self, prefs: &Preferences) -> Result<(), StoreError> {
        let value = serde_json::to_value(prefs).map_err(|e| StoreError::Encoding {
            key: "preferences".to_string(),
            reason: e.to_string(),
        })?;
        let Value::Object(items) = value else {
            return Err(StoreError::Encoding {
                key: "preferences".to_string(),
                reason: "not an object".to_string(),
            });
        };
        debug!("[store] saving preferences ({} keys)", items.len());
        self.sync.set(items).await
    }

    pub async fn load_geometry(&self) -> Result<Option<StoredGeometry>, StoreError> {
        let items = self.local.get(&[KEY_WINDOW_POSITION]).await?;
        let Some(value) = items.get(KEY_WINDOW_POSITION) else {
            return Ok(None);
        };
        match serde_json::from_value::<StoredGeometry>(value.clone()) {
            Ok(geometry) => Ok(Some(geometry)),
            Err(e) => {
                warn!("[store] ignoring unreadable {}: {}", KEY_WINDOW_POSITION, e);
                Ok(None)
            }
        }
    }

    pub async fn save_geometry(&self, geometry: &StoredGeometry) -> Result<(), StoreError> {
        let value = serde_json::to_value(geometry).map_err(|e| StoreError::Encoding {
            key: KEY_WINDOW_POSITION.to_string(),
            reason: e.to_string(),
        })?;
        let mut items = Map::new();
        items.insert(KEY_WINDOW_POSITION.to_string(), value);
        self.local.set(items).await
    }

    /// Reads the stored zoom; non-numeric values read as absent
    pub async fn load_zoom(&self) -> Result<Option<f64>, StoreError> {
        let items = self.local.get(&[KEY_WINDOW_ZOOM]).await?;
        Ok(items
            .get(KEY_WINDOW_ZOOM)
            .and_then(Value::as_f64)
            .filter(|zoom| zoom.is_finite()))
    }

    pub async fn save_zoom(&self, zoom: f64) -> Result<(), StoreError> {
        let mut items = Map::new();
        items.insert(KEY_WINDOW_ZOOM.to_string(), Value::from(zoom));
        self.local.set(items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SettingsStore<Rc<MemoryStorage>> {
        SettingsStore::new(Rc::new(MemoryStorage::new()), Rc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn empty_store_reads_default_preferences() {
        let store = store();
        let prefs = store.load_preferences().await.unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[tokio::test]
    async fn preferences_round_trip_through_the_synced_area() {
        let store = store();
        let prefs = Preferences {
            api_key: Some("sk-test".to_string()),
            model_name: Some("gpt-4o".to_string()),
            use_dropdown: Some(false),
            no_markdown: true,
        };
        store.save_preferences(&prefs).await.unwrap();

        assert_eq!(store.load_preferences().await.unwrap(), prefs);
        assert_eq!(store.sync_area().value("apiKey"), Some(json!("sk-test")));
        assert_eq!(store.local_area().writes(), 0);
    }

    #[tokio::test]
    async fn mistyped_preference_fields_read_as_absent() {
        let store = store();
        store.sync_area().insert("apiKey", json!(42));
        store.sync_area().insert("noMarkdown", json!("yes"));
        store.sync_area().insert("modelName", json!("gpt-4"));

        let prefs = store.load_preferences().await.unwrap();
        assert_eq!(prefs.api_key, None);
        assert!(!prefs.no_markdown);
        assert_eq!(prefs.model_name.as_deref(), Some("gpt-4"));
    }

    #[tokio::test]
    async fn geometry_and_zoom_live_in_the_local_area() {
        let store = store();
        let geometry = StoredGeometry {
            left: "10px".to_string(),
            top: "20px".to_string(),
            width: "400px".to_string(),
            height: "500px".to_string(),
        };
        store.save_geometry(&geometry).await.unwrap();
        store.save_zoom(1.3).await.unwrap();

        assert_eq!(store.load_geometry().await.unwrap(), Some(geometry));
        assert_eq!(store.load_zoom().await.unwrap(), Some(1.3));
        assert_eq!(store.sync_area().writes(), 0);
    }

    #[tokio::test]
    async fn unreadable_layout_values_are_ignored() {
        let store = store();
        store.local_area().insert("chatWindowPosition", json!("left: 10px"));
        store.local_area().insert("chatWindowZoom", json!("big"));

        assert_eq!(store.load_geometry().await.unwrap(), None);
        assert_eq!(store.load_zoom().await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_reads_surface_as_backend_errors() {
        let store = store();
        store.sync_area().set_fail_reads(true);
        let err = store.load_preferences().await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));

        store.sync_area().set_fail_reads(false);
        assert!(store.load_preferences().await.is_ok());
    }

    #[tokio::test]
    async fn quota_rejects_oversized_items() {
        let area = MemoryStorage::with_quota(16);
        let mut items = Map::new();
        items.insert("apiKey".to_string(), json!("sk-0123456789abcdef"));

        let err = area.set(items).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { ref key, .. } if key == "apiKey"));
        assert_eq!(area.writes(), 0);
        assert_eq!(area.value("apiKey"), None);
    }
}
