//! Server-integration client for a hosted card-payment gateway.
//!
//! The [`payments`] module holds the protocol core: request and response
//! models, notification decoding and signature checks, and the
//! [`payments::GatewayManager`] that ties them to an HTTP transport. The
//! `server` feature adds the axum notification service.

pub mod config;
pub mod error;
pub mod payments;

#[cfg(feature = "server")]
pub mod api;

pub use error::{GatewayError, GatewayResult};
pub use payments::{GatewayManager, GatewaySettings};
