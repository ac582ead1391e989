//! Shared axum building blocks: health endpoints, server bootstrap with
//! graceful shutdown, and a validating JSON extractor.

pub mod errors;
pub mod extractors;
pub mod health;
pub mod server;

pub use errors::ErrorResponse;
pub use extractors::ValidatedJson;
pub use health::{health_router, HealthResponse};
pub use server::{create_app, shutdown_signal, with_middleware};
