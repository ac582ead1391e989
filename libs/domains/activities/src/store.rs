//! In-memory activity roster store.

use crate::error::{ActivityError, ActivityResult};
use crate::models::{seed_activities, Activity};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::info;

/// Process-wide roster of activities.
///
/// Mutations are serialized through the write lock; reads return cloned
/// snapshots so callers never hold the lock across awaits.
pub struct ActivityStore {
    activities: RwLock<BTreeMap<String, Activity>>,
}

impl ActivityStore {
    /// Create a store seeded with the school's starting roster.
    pub fn seeded() -> Self {
        Self {
            activities: RwLock::new(seed_activities()),
        }
    }

    /// Create an empty store (tests).
    pub fn empty() -> Self {
        Self {
            activities: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace an activity.
    pub async fn insert(&self, name: impl Into<String>, activity: Activity) {
        self.activities.write().await.insert(name.into(), activity);
    }

    /// Snapshot of all activities, keyed by name.
    pub async fn list(&self) -> BTreeMap<String, Activity> {
        self.activities.read().await.clone()
    }

    /// Get a single activity by name.
    pub async fn get(&self, name: &str) -> ActivityResult<Activity> {
        self.activities
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ActivityError::NotFound(name.to_string()))
    }

    /// Sign a student up for an activity.
    ///
    /// Returns a snapshot of the activity after the mutation.
    pub async fn add_participant(&self, name: &str, email: &str) -> ActivityResult<Activity> {
        let mut activities = self.activities.write().await;

        let activity = activities
            .get_mut(name)
            .ok_or_else(|| ActivityError::NotFound(name.to_string()))?;

        if activity.participants.iter().any(|p| p == email) {
            return Err(ActivityError::AlreadyRegistered {
                activity: name.to_string(),
                email: email.to_string(),
            });
        }

        if activity.is_full() {
            return Err(ActivityError::CapacityReached {
                activity: name.to_string(),
            });
        }

        activity.participants.push(email.to_string());
        info!(activity = %name, email = %email, "Student signed up");

        Ok(activity.clone())
    }

    /// Remove a student from an activity.
    ///
    /// Returns a snapshot of the activity after the mutation.
    pub async fn remove_participant(&self, name: &str, email: &str) -> ActivityResult<Activity> {
        let mut activities = self.activities.write().await;

        let activity = activities
            .get_mut(name)
            .ok_or_else(|| ActivityError::NotFound(name.to_string()))?;

        let position = activity
            .participants
            .iter()
            .position(|p| p == email)
            .ok_or_else(|| ActivityError::NotRegistered {
                activity: name.to_string(),
                email: email.to_string(),
            })?;

        activity.participants.remove(position);
        info!(activity = %name, email = %email, "Student unregistered");

        Ok(activity.clone())
    }
}

impl Default for ActivityStore {
    fn default() -> Self {
        Self::seeded()
    }
}
