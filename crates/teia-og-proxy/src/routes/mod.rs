//! Route definitions for the proxy.
//!
//! ## Routes
//!
//! - `GET /_proxy/health` - Health check (JSON)
//! - everything else - forwarded to the origin, with social tags on
//!   profile and token pages

mod health;

use axum::Router;
use axum::routing::get;

use crate::proxy::proxy_handler;
use crate::state::AppState;

/// Build the complete proxy router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/_proxy/health", get(health::health_check))
        .fallback(proxy_handler)
        .with_state(state)
}
