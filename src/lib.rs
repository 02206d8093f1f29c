//! Events marketplace backend library.
//!
//! Exposes every module so both the binary and the integration tests can
//! build the service out of the same pieces.

pub mod api;
pub mod cache;
pub mod composer;
pub mod config;
pub mod domain;
pub mod error;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod sync;

use std::sync::Arc;

use crate::composer::Composer;

/// Shared application state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub composer: Arc<Composer>,
}
