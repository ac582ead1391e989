//! Recipient resolution: parent CC and broadcast filtering.

use crate::preferences::NotificationCategory;
use crate::store::PreferenceStore;
use std::sync::Arc;

/// Derives CC and filtered recipient sets from stored preferences.
#[derive(Clone)]
pub struct RecipientResolver {
    prefs: Arc<dyn PreferenceStore>,
}

impl RecipientResolver {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    /// Parent email for CC, iff CC is enabled and a parent email is set.
    ///
    /// Only used for single-recipient notifications (signup/unregister
    /// confirmations), never for broadcast categories.
    pub async fn resolve_cc(&self, identity: &str) -> Option<String> {
        let prefs = self.prefs.get(identity).await;
        if prefs.parent_cc_enabled {
            prefs.parent_email.filter(|email| !email.is_empty())
        } else {
            None
        }
    }

    /// Drop recipients whose preferences reject the category, preserving
    /// input order. The result is always a subsequence of the input.
    pub async fn filter_recipients(
        &self,
        recipients: &[String],
        category: NotificationCategory,
    ) -> Vec<String> {
        let mut eligible = Vec::with_capacity(recipients.len());
        for identity in recipients {
            if self.prefs.should_send(identity, category).await {
                eligible.push(identity.clone());
            }
        }
        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::NotificationPreferences;
    use crate::store::InMemoryPreferenceStore;

    fn resolver_with_store() -> (RecipientResolver, Arc<InMemoryPreferenceStore>) {
        let store = Arc::new(InMemoryPreferenceStore::new());
        (RecipientResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_resolve_cc_requires_both_flag_and_email() {
        let (resolver, store) = resolver_with_store();

        // Defaults: no parent set, flag off
        assert_eq!(resolver.resolve_cc("a@mergington.edu").await, None);

        // Parent set but flag off
        let mut prefs = NotificationPreferences::default_for("a@mergington.edu");
        prefs.parent_email = Some("p@mergington.edu".to_string());
        store.put(prefs.clone()).await;
        assert_eq!(resolver.resolve_cc("a@mergington.edu").await, None);

        // Flag on but no parent
        prefs.parent_email = None;
        prefs.parent_cc_enabled = true;
        store.put(prefs.clone()).await;
        assert_eq!(resolver.resolve_cc("a@mergington.edu").await, None);

        // Both present
        prefs.parent_email = Some("p@mergington.edu".to_string());
        store.put(prefs).await;
        assert_eq!(
            resolver.resolve_cc("a@mergington.edu").await,
            Some("p@mergington.edu".to_string())
        );
    }

    #[tokio::test]
    async fn test_filter_preserves_order_and_subsequence() {
        let (resolver, store) = resolver_with_store();

        let mut opted_out = NotificationPreferences::default_for("b@mergington.edu");
        opted_out.activity_changes = false;
        store.put(opted_out).await;

        let input = vec![
            "a@mergington.edu".to_string(),
            "b@mergington.edu".to_string(),
            "c@mergington.edu".to_string(),
        ];
        let filtered = resolver
            .filter_recipients(&input, NotificationCategory::ActivityChanges)
            .await;

        assert_eq!(filtered, vec!["a@mergington.edu", "c@mergington.edu"]);
    }

    #[tokio::test]
    async fn test_filter_empty_input_yields_empty() {
        let (resolver, _store) = resolver_with_store();

        let filtered = resolver
            .filter_recipients(&[], NotificationCategory::ActivityChanges)
            .await;
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_reminders_scenario() {
        let (resolver, store) = resolver_with_store();

        let mut prefs = NotificationPreferences::default_for("b@x.edu");
        prefs.reminders = false;
        prefs.parent_cc_enabled = true;
        prefs.parent_email = Some("p@x.edu".to_string());
        store.put(prefs).await;

        assert!(
            !store
                .should_send("b@x.edu", NotificationCategory::Reminders)
                .await
        );
        assert_eq!(
            resolver.resolve_cc("b@x.edu").await,
            Some("p@x.edu".to_string())
        );
    }
}
