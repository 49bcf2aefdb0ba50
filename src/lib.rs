//! Quiz archive store: archive metadata lifecycle, blob storage, signed
//! uploads and admin-claim management behind one axum service.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod migration;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use state::AppState;

/// Router with state attached, ready for `axum::serve`.
pub fn app(state: AppState) -> Router {
    routes::routes::routes().with_state(state)
}
