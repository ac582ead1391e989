//! Preference storage.
//!
//! The store is process-wide mutable state with no external persistence:
//! records live for the lifetime of the process and are recreated with
//! defaults on the next read after deletion.

use crate::preferences::{NotificationCategory, NotificationPreferences};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Keyed storage for notification preferences.
///
/// Injected into the dispatcher and HTTP handlers; swap in a persistent
/// implementation without touching either.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Get a user's preferences, materializing and storing an all-defaults
    /// record on first read.
    async fn get(&self, identity: &str) -> NotificationPreferences;

    /// Replace a user's record wholesale (no partial-field merge).
    async fn put(&self, prefs: NotificationPreferences);

    /// Delete a user's record. Returns whether a record existed.
    async fn delete(&self, identity: &str) -> bool;

    /// Consistent snapshot of every stored record, keyed by identity.
    async fn list_all(&self) -> BTreeMap<String, NotificationPreferences>;

    /// Identities that would currently receive the given category.
    async fn list_enabled(&self, category: NotificationCategory) -> Vec<String>;

    /// Whether a notification of `category` should go to `identity`.
    async fn should_send(&self, identity: &str, category: NotificationCategory) -> bool {
        self.get(identity).await.allows(category)
    }
}

/// In-memory preference store guarded by a single RwLock.
///
/// Lazy creation takes the write guard; bulk scans copy under the read
/// guard so they observe a consistent snapshot.
pub struct InMemoryPreferenceStore {
    prefs: RwLock<HashMap<String, NotificationPreferences>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self {
            prefs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, identity: &str) -> NotificationPreferences {
        let mut prefs = self.prefs.write().await;
        prefs
            .entry(identity.to_string())
            .or_insert_with(|| NotificationPreferences::default_for(identity))
            .clone()
    }

    async fn put(&self, record: NotificationPreferences) {
        let mut prefs = self.prefs.write().await;
        prefs.insert(record.email.clone(), record);
    }

    async fn delete(&self, identity: &str) -> bool {
        let mut prefs = self.prefs.write().await;
        prefs.remove(identity).is_some()
    }

    async fn list_all(&self) -> BTreeMap<String, NotificationPreferences> {
        let prefs = self.prefs.read().await;
        prefs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    async fn list_enabled(&self, category: NotificationCategory) -> Vec<String> {
        let prefs = self.prefs.read().await;
        let mut identities: Vec<String> = prefs
            .values()
            .filter(|p| p.allows(category))
            .map(|p| p.email.clone())
            .collect();
        identities.sort();
        identities
    }
}
