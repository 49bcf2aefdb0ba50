//! Core data models for the archive service.
//!
//! These map to SQLite rows via `sqlx::FromRow` and serialize as JSON with
//! the camelCase field names the web and mobile clients already use.

pub mod archive;
pub mod asset;
pub mod bucket;
pub mod feedback;
pub mod quiz;
pub mod user;
