//! Notifications Domain
//!
//! Preference-gated email notifications for the activities service.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   API Handler    │  ← roster mutation commits first
//! └────────┬─────────┘
//!          │ fire-and-forget
//! ┌────────▼─────────┐
//! │    Dispatcher    │  ← evaluates preferences, resolves CC, builds jobs
//! └────────┬─────────┘
//!          │ JobQueue::submit (failures swallowed into an outcome)
//! ┌────────▼─────────┐
//! │     Channel      │  ← in-process bounded channel or Redis Stream
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ DeliveryProcessor│  ← renders templates, sends via provider
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │   MailProvider   │  ← SMTP (lettre) or mock
//! └──────────────────┘
//! ```
//!
//! A signup or unregistration never waits on delivery and never fails
//! because of it: the dispatcher converts every channel problem into a
//! `DispatchOutcome`, and the delivery processor converts every transport
//! problem into a `DeliveryOutcome`.

pub mod dispatcher;
pub mod error;
pub mod job;
pub mod preferences;
pub mod processor;
pub mod providers;
pub mod recipients;
pub mod store;
pub mod templates;

// Re-export commonly used types
pub use dispatcher::{BatchDispatchSummary, DispatchOutcome, NotificationDispatcher};
pub use error::{NotificationError, NotificationResult};
pub use job::{EmailJob, EmailStream};
pub use preferences::{EmailFrequency, NotificationCategory, NotificationPreferences};
pub use processor::{DeliveryOutcome, DeliveryProcessor};
pub use providers::{MailProvider, MockMailer, OutboundEmail, SendResult, SmtpMailer};
pub use recipients::RecipientResolver;
pub use store::{InMemoryPreferenceStore, PreferenceStore};
pub use templates::TemplateEngine;
