//! Notification preference model and evaluation.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use validator::Validate;

/// How often a user wants to hear from us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EmailFrequency {
    #[default]
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "daily")]
    DailyDigest,
    #[serde(rename = "weekly")]
    WeeklyDigest,
    #[serde(rename = "disabled")]
    Disabled,
}

/// Why a notification is being sent.
///
/// Every dispatched job carries a category; per-category preference flags
/// gate whether it reaches a given recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    SignupConfirmation,
    UnregisterConfirmation,
    ActivityChanges,
    Reminders,
    WeeklyDigest,
    NewActivities,
    Attendance,
}

fn default_true() -> bool {
    true
}

/// Per-user email notification preferences, keyed by email identity.
///
/// Serde defaults mirror the lazily-created record: everything opted in,
/// immediate frequency, no parent CC.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationPreferences {
    #[validate(email)]
    pub email: String,

    /// Global kill switch.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub frequency: EmailFrequency,

    // Category-specific preferences (opt-in/out)
    #[serde(default = "default_true")]
    pub signup_confirmation: bool,
    #[serde(default = "default_true")]
    pub unregister_confirmation: bool,
    #[serde(default = "default_true")]
    pub activity_changes: bool,
    #[serde(default = "default_true")]
    pub reminders: bool,
    #[serde(default = "default_true")]
    pub weekly_digest: bool,
    #[serde(default = "default_true")]
    pub new_activities: bool,
    #[serde(default = "default_true")]
    pub attendance: bool,

    /// Parent email for CC on confirmations.
    #[serde(default)]
    pub parent_email: Option<String>,
    #[serde(default)]
    pub parent_cc_enabled: bool,

    /// When true, suppress everything except the weekly digest.
    #[serde(default)]
    pub digest_only: bool,
}

impl NotificationPreferences {
    /// The all-defaults record materialized on first read.
    pub fn default_for(identity: impl Into<String>) -> Self {
        Self {
            email: identity.into(),
            enabled: true,
            frequency: EmailFrequency::Immediate,
            signup_confirmation: true,
            unregister_confirmation: true,
            activity_changes: true,
            reminders: true,
            weekly_digest: true,
            new_activities: true,
            attendance: true,
            parent_email: None,
            parent_cc_enabled: false,
            digest_only: false,
        }
    }

    /// Whether a notification of the given category should be sent to this
    /// user. Short-circuits on the global switches before consulting the
    /// per-category flag.
    pub fn allows(&self, category: NotificationCategory) -> bool {
        if !self.enabled || self.frequency == EmailFrequency::Disabled {
            return false;
        }

        if self.digest_only && category != NotificationCategory::WeeklyDigest {
            return false;
        }

        match category {
            NotificationCategory::SignupConfirmation => self.signup_confirmation,
            NotificationCategory::UnregisterConfirmation => self.unregister_confirmation,
            NotificationCategory::ActivityChanges => self.activity_changes,
            NotificationCategory::Reminders => self.reminders,
            NotificationCategory::WeeklyDigest => self.weekly_digest,
            NotificationCategory::NewActivities => self.new_activities,
            NotificationCategory::Attendance => self.attendance,
        }
    }
}
