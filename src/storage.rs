//! Durable storage for scope state and unsent payloads.
//!
//! Storage is pluggable through the [`StorageAdapter`] trait, a minimal
//! string key-value interface that host applications can back with whatever
//! store the platform offers. Two implementations ship with the SDK:
//! [`MemoryStore`] (the default, nothing survives a restart) and
//! [`FileStore`] (one file per key under a configured directory).
//!
//! [`StorageManager`] layers the SDK's key schema on top of an adapter. All
//! SDK keys share the `tracekit.` prefix so an application-provided adapter
//! can namespace or sweep them. Storage failures are logged and absorbed
//! here; a broken store never takes the host application down with it.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ids::random_token;
use crate::model::{Breadcrumb, ExceptionPayload, Platform, SnapshotPayload, TracePayload, User};

/// Errors from storage adapters.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Filesystem I/O failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be serialized or deserialized.
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Pluggable key-value backend for SDK state.
///
/// Implementations must be safe to call concurrently. Values are opaque
/// strings; the SDK stores JSON in them but adapters should not rely on
/// that.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Returns every key currently present.
    async fn get_all_keys(&self) -> StorageResult<Vec<String>>;

    /// Fetches several keys at once, preserving the input order.
    async fn multi_get(&self, keys: &[String]) -> StorageResult<Vec<(String, Option<String>)>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push((key.clone(), self.get_item(key).await?));
        }
        Ok(out)
    }

    /// Stores several pairs at once.
    async fn multi_set(&self, pairs: &[(String, String)]) -> StorageResult<()> {
        for (key, value) in pairs {
            self.set_item(key, value).await?;
        }
        Ok(())
    }

    /// Removes several keys at once.
    async fn multi_remove(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }

    /// Removes every key in the store.
    async fn clear(&self) -> StorageResult<()> {
        let keys = self.get_all_keys().await?;
        self.multi_remove(&keys).await
    }
}

/// In-memory store; the default when no directory is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn get_all_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.items.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.items.write().await.clear();
        Ok(())
    }
}

/// File-backed store with one file per key.
///
/// Keys are percent-encoded into file names so arbitrary key strings stay
/// representable on every filesystem.
#[derive(Debug)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(directory: impl Into<PathBuf>) -> StorageResult<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(encode_key(key))
    }
}

#[async_trait]
impl StorageAdapter for FileStore {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all_keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                keys.push(decode_key(&entry.file_name().to_string_lossy()));
            }
        }
        Ok(keys)
    }
}

/// Encodes a storage key into a filesystem-safe file name.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Reverses [`encode_key`].
fn decode_key(name: &str) -> String {
    let mut bytes = Vec::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            let hi = chars.next();
            let lo = chars.next();
            if let (Some(hi), Some(lo)) = (hi, lo) {
                if let (Some(hi), Some(lo)) = (hi.to_digit(16), lo.to_digit(16)) {
                    bytes.push((hi * 16 + lo) as u8);
                    continue;
                }
            }
            bytes.push(b'%');
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

const KEY_PREFIX: &str = "tracekit.";

const KEY_DEVICE_ID: &str = "tracekit.device_id";
const KEY_SESSION_ID: &str = "tracekit.session_id";
const KEY_USER: &str = "tracekit.user";
const KEY_TAGS: &str = "tracekit.tags";
const KEY_CONTEXTS: &str = "tracekit.contexts";
const KEY_EXTRAS: &str = "tracekit.extras";
const KEY_BREADCRUMBS: &str = "tracekit.breadcrumbs";
const KEY_PENDING_TRACES: &str = "tracekit.pending_spans";
const KEY_PENDING_EXCEPTIONS: &str = "tracekit.pending_exceptions";
const KEY_PENDING_SNAPSHOTS: &str = "tracekit.pending_snapshots";
const KEY_LAST_FLUSH: &str = "tracekit.last_flush";
const KEY_APP_START: &str = "tracekit.app_start_time";

/// The SDK's view of a storage adapter.
///
/// All methods absorb adapter errors: reads fall back to a default value and
/// writes are dropped, each with a warning in the log.
#[derive(Clone)]
pub struct StorageManager {
    adapter: Arc<dyn StorageAdapter>,
    max_pending_items: usize,
}

impl StorageManager {
    /// Creates a manager over `adapter` with the given pending list cap.
    pub fn new(adapter: Arc<dyn StorageAdapter>, max_pending_items: usize) -> Self {
        Self {
            adapter,
            max_pending_items,
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.adapter.get_item(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Storage read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding corrupt stored value");
                None
            }
        }
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize value for storage");
                return;
            }
        };
        if let Err(e) = self.adapter.set_item(key, &raw).await {
            tracing::warn!(key, error = %e, "Storage write failed");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.adapter.remove_item(key).await {
            tracing::warn!(key, error = %e, "Storage remove failed");
        }
    }

    /// Returns the persisted device id, generating and storing one on first
    /// use. Format: `<platform>-<epoch millis>-<token>`.
    pub async fn get_or_create_device_id(&self, platform: Platform) -> String {
        if let Some(id) = self.read_json::<String>(KEY_DEVICE_ID).await {
            return id;
        }
        let id = format!(
            "{}-{}-{}",
            platform.as_str(),
            chrono::Utc::now().timestamp_millis(),
            random_token(9)
        );
        self.write_json(KEY_DEVICE_ID, &id).await;
        id
    }

    /// Persists the id of the session this client run belongs to.
    pub async fn save_session_id(&self, session_id: &str) {
        self.write_json(KEY_SESSION_ID, &session_id).await;
    }

    /// Returns the most recently persisted session id, if any. After a
    /// restart this is the previous run's session.
    pub async fn last_session_id(&self) -> Option<String> {
        self.read_json(KEY_SESSION_ID).await
    }

    /// Loads the persisted user, if any.
    pub async fn load_user(&self) -> Option<User> {
        self.read_json(KEY_USER).await
    }

    /// Persists the user; `None` removes the stored value.
    pub async fn save_user(&self, user: Option<&User>) {
        match user {
            Some(user) => self.write_json(KEY_USER, user).await,
            None => self.remove(KEY_USER).await,
        }
    }

    /// Loads persisted tags.
    pub async fn load_tags(&self) -> HashMap<String, String> {
        self.read_json(KEY_TAGS).await.unwrap_or_default()
    }

    /// Persists tags.
    pub async fn save_tags(&self, tags: &HashMap<String, String>) {
        self.write_json(KEY_TAGS, tags).await;
    }

    /// Loads persisted structured contexts.
    pub async fn load_contexts(&self) -> HashMap<String, serde_json::Value> {
        self.read_json(KEY_CONTEXTS).await.unwrap_or_default()
    }

    /// Persists structured contexts.
    pub async fn save_contexts(&self, contexts: &HashMap<String, serde_json::Value>) {
        self.write_json(KEY_CONTEXTS, contexts).await;
    }

    /// Loads persisted extras.
    pub async fn load_extras(&self) -> HashMap<String, serde_json::Value> {
        self.read_json(KEY_EXTRAS).await.unwrap_or_default()
    }

    /// Persists extras.
    pub async fn save_extras(&self, extras: &HashMap<String, serde_json::Value>) {
        self.write_json(KEY_EXTRAS, extras).await;
    }

    /// Loads the persisted breadcrumb trail.
    pub async fn load_breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.read_json(KEY_BREADCRUMBS).await.unwrap_or_default()
    }

    /// Persists the breadcrumb trail; the caller keeps it within its cap.
    pub async fn save_breadcrumbs(&self, breadcrumbs: &[Breadcrumb]) {
        self.write_json(KEY_BREADCRUMBS, &breadcrumbs).await;
    }

    async fn push_capped<T: Serialize + DeserializeOwned>(&self, key: &str, item: &T) {
        let mut items: Vec<serde_json::Value> = self.read_json(key).await.unwrap_or_default();
        match serde_json::to_value(item) {
            Ok(value) => items.push(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize pending payload");
                return;
            }
        }
        if items.len() > self.max_pending_items {
            let excess = items.len() - self.max_pending_items;
            items.drain(..excess);
            tracing::warn!(key, dropped = excess, "Pending list full, dropped oldest entries");
        }
        self.write_json(key, &items).await;
    }

    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let raw: Vec<serde_json::Value> = self.read_json(key).await.unwrap_or_default();
        let total = raw.len();
        let items: Vec<T> = raw
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if items.len() < total {
            tracing::warn!(
                key,
                dropped = total - items.len(),
                "Discarded unreadable pending entries"
            );
        }
        items
    }

    /// Appends a trace payload to the pending list, trimming the oldest
    /// entries past the cap.
    pub async fn add_pending_trace(&self, payload: &TracePayload) {
        self.push_capped(KEY_PENDING_TRACES, payload).await;
    }

    /// Returns all pending trace payloads.
    pub async fn pending_traces(&self) -> Vec<TracePayload> {
        self.read_list(KEY_PENDING_TRACES).await
    }

    /// Clears the pending trace list.
    pub async fn clear_pending_traces(&self) {
        self.remove(KEY_PENDING_TRACES).await;
    }

    /// Appends an exception payload to the pending list.
    pub async fn add_pending_exception(&self, payload: &ExceptionPayload) {
        self.push_capped(KEY_PENDING_EXCEPTIONS, payload).await;
    }

    /// Returns all pending exception payloads.
    pub async fn pending_exceptions(&self) -> Vec<ExceptionPayload> {
        self.read_list(KEY_PENDING_EXCEPTIONS).await
    }

    /// Clears the pending exception list.
    pub async fn clear_pending_exceptions(&self) {
        self.remove(KEY_PENDING_EXCEPTIONS).await;
    }

    /// Appends a snapshot payload to the pending list.
    pub async fn add_pending_snapshot(&self, payload: &SnapshotPayload) {
        self.push_capped(KEY_PENDING_SNAPSHOTS, payload).await;
    }

    /// Returns all pending snapshot payloads.
    pub async fn pending_snapshots(&self) -> Vec<SnapshotPayload> {
        self.read_list(KEY_PENDING_SNAPSHOTS).await
    }

    /// Clears the pending snapshot list.
    pub async fn clear_pending_snapshots(&self) {
        self.remove(KEY_PENDING_SNAPSHOTS).await;
    }

    /// Records the time of the last successful export, as epoch millis.
    pub async fn set_last_flush(&self, timestamp_millis: i64) {
        self.write_json(KEY_LAST_FLUSH, &timestamp_millis).await;
    }

    /// Returns the time of the last successful export, if any.
    pub async fn last_flush(&self) -> Option<i64> {
        self.read_json(KEY_LAST_FLUSH).await
    }

    /// Records when the application started this run, as epoch millis.
    pub async fn set_app_start_time(&self, timestamp_millis: i64) {
        self.write_json(KEY_APP_START, &timestamp_millis).await;
    }

    /// Returns the recorded application start time, if any.
    pub async fn app_start_time(&self) -> Option<i64> {
        self.read_json(KEY_APP_START).await
    }

    /// Removes every SDK-owned key from the adapter.
    pub async fn clear_all(&self) {
        let keys = match self.adapter.get_all_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "Storage key listing failed");
                return;
            }
        };
        let ours: Vec<String> = keys
            .into_iter()
            .filter(|k| k.starts_with(KEY_PREFIX))
            .collect();
        if let Err(e) = self.adapter.multi_remove(&ours).await {
            tracing::warn!(error = %e, "Storage clear failed");
        }
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("max_pending_items", &self.max_pending_items)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    fn make_manager(max_pending_items: usize) -> StorageManager {
        StorageManager::new(Arc::new(MemoryStore::new()), max_pending_items)
    }

    fn make_trace(name: &str) -> TracePayload {
        TracePayload {
            spans: vec![Span::new(name)],
            service_name: "test-service".to_string(),
            resource: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();

        assert_eq!(store.get_item("a").await.unwrap(), None);
        store.set_item("a", "1").await.unwrap();
        store.set_item("b", "2").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap().as_deref(), Some("1"));

        let mut keys = store.get_all_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        store.remove_item("a").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap(), None);

        store.clear().await.unwrap();
        assert!(store.get_all_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multi_operations() {
        let store = MemoryStore::new();
        store
            .multi_set(&[
                ("x".to_string(), "1".to_string()),
                ("y".to_string(), "2".to_string()),
            ])
            .await
            .unwrap();

        let got = store
            .multi_get(&["x".to_string(), "missing".to_string(), "y".to_string()])
            .await
            .unwrap();
        assert_eq!(got[0], ("x".to_string(), Some("1".to_string())));
        assert_eq!(got[1], ("missing".to_string(), None));
        assert_eq!(got[2], ("y".to_string(), Some("2".to_string())));

        store
            .multi_remove(&["x".to_string(), "y".to_string()])
            .await
            .unwrap();
        assert!(store.get_all_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set_item("tracekit.user", r#"{"id":"u1"}"#).await.unwrap();
        store.set_item("weird key/with:chars", "v").await.unwrap();

        assert_eq!(
            store.get_item("tracekit.user").await.unwrap().as_deref(),
            Some(r#"{"id":"u1"}"#)
        );
        assert_eq!(
            store.get_item("weird key/with:chars").await.unwrap().as_deref(),
            Some("v")
        );
        assert_eq!(store.get_item("absent").await.unwrap(), None);

        let mut keys = store.get_all_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["tracekit.user", "weird key/with:chars"]);

        // removing an absent key is fine
        store.remove_item("absent").await.unwrap();
        store.remove_item("tracekit.user").await.unwrap();
        assert_eq!(store.get_item("tracekit.user").await.unwrap(), None);
    }

    #[test]
    fn test_key_encoding_roundtrip() {
        for key in ["plain", "tracekit.pending_spans", "a b/c:d%e", "ünïcode"] {
            assert_eq!(decode_key(&encode_key(key)), key);
        }
        // encoded names contain no separators
        assert!(!encode_key("a/b\\c").contains('/'));
        assert!(!encode_key("a/b\\c").contains('\\'));
    }

    #[tokio::test]
    async fn test_device_id_is_stable() {
        let manager = make_manager(10);
        let first = manager.get_or_create_device_id(Platform::Android).await;
        let second = manager.get_or_create_device_id(Platform::Ios).await;

        assert_eq!(first, second);
        assert!(first.starts_with("android-"));
    }

    #[tokio::test]
    async fn test_user_save_and_remove() {
        let manager = make_manager(10);
        assert!(manager.load_user().await.is_none());

        let user = User {
            id: Some("u-42".to_string()),
            email: Some("u@example.com".to_string()),
            ..User::default()
        };
        manager.save_user(Some(&user)).await;
        let loaded = manager.load_user().await.unwrap();
        assert_eq!(loaded.id.as_deref(), Some("u-42"));

        manager.save_user(None).await;
        assert!(manager.load_user().await.is_none());
    }

    #[tokio::test]
    async fn test_pending_list_trims_oldest() {
        let max = 10;
        let manager = make_manager(max);

        for i in 0..max + 5 {
            manager.add_pending_trace(&make_trace(&format!("span-{i}"))).await;
        }

        let pending = manager.pending_traces().await;
        assert_eq!(pending.len(), max);
        // the first five were trimmed, so the list starts at the sixth add
        assert_eq!(pending[0].spans[0].name, "span-5");
        assert_eq!(pending[max - 1].spans[0].name, format!("span-{}", max + 4));
    }

    #[tokio::test]
    async fn test_corrupt_pending_list_is_discarded() {
        let adapter = Arc::new(MemoryStore::new());
        adapter
            .set_item(KEY_PENDING_TRACES, "{definitely not json")
            .await
            .unwrap();

        let manager = StorageManager::new(adapter, 10);
        assert!(manager.pending_traces().await.is_empty());

        // a new add starts a fresh list
        manager.add_pending_trace(&make_trace("fresh")).await;
        assert_eq!(manager.pending_traces().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_pending_after_replay() {
        let manager = make_manager(10);
        manager.add_pending_trace(&make_trace("a")).await;
        manager.add_pending_trace(&make_trace("b")).await;
        assert_eq!(manager.pending_traces().await.len(), 2);

        manager.clear_pending_traces().await;
        assert!(manager.pending_traces().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_only_touches_sdk_keys() {
        let adapter = Arc::new(MemoryStore::new());
        adapter.set_item("app.own_key", "keep").await.unwrap();

        let manager = StorageManager::new(Arc::clone(&adapter) as Arc<dyn StorageAdapter>, 10);
        manager.save_tags(&HashMap::from([("k".to_string(), "v".to_string())])).await;
        manager.set_last_flush(123).await;

        manager.clear_all().await;

        assert_eq!(adapter.get_item("app.own_key").await.unwrap().as_deref(), Some("keep"));
        assert!(manager.load_tags().await.is_empty());
        assert!(manager.last_flush().await.is_none());
    }

    #[tokio::test]
    async fn test_last_flush_roundtrip() {
        let manager = make_manager(10);
        assert!(manager.last_flush().await.is_none());
        manager.set_last_flush(1_705_314_600_000).await;
        assert_eq!(manager.last_flush().await, Some(1_705_314_600_000));
    }

    #[tokio::test]
    async fn test_session_bookkeeping() {
        let manager = make_manager(10);
        assert!(manager.last_session_id().await.is_none());
        assert!(manager.app_start_time().await.is_none());

        manager.save_session_id("1705314600000-deadbeef").await;
        manager.set_app_start_time(1_705_314_600_000).await;

        assert_eq!(
            manager.last_session_id().await.as_deref(),
            Some("1705314600000-deadbeef")
        );
        assert_eq!(manager.app_start_time().await, Some(1_705_314_600_000));
    }

    #[tokio::test]
    async fn test_breadcrumb_trail_roundtrip() {
        use crate::model::BreadcrumbType;

        let manager = make_manager(10);
        assert!(manager.load_breadcrumbs().await.is_empty());

        let trail = vec![
            Breadcrumb::new(BreadcrumbType::Navigation, "Home"),
            Breadcrumb::new(BreadcrumbType::User, "tapped checkout"),
        ];
        manager.save_breadcrumbs(&trail).await;

        let loaded = manager.load_breadcrumbs().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].message, "Home");
        assert_eq!(loaded[1].kind, BreadcrumbType::User);
    }
}
