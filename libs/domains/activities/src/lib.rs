//! Activities Domain
//!
//! In-memory roster of extracurricular activities: viewing, signup, and
//! unregistration. The store is authoritative and synchronous; notification
//! concerns live in `domain_notifications` and never affect roster
//! mutations.

pub mod error;
pub mod models;
pub mod store;

pub use error::{ActivityError, ActivityResult};
pub use models::Activity;
pub use store::ActivityStore;
