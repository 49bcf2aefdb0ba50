pub mod admin_service;
pub mod archive_service;
pub mod asset_service;
pub mod blob_deleter;
pub mod blob_store;
pub mod feedback_service;
pub mod upload_service;
pub mod user_directory;
