pub mod admin_handlers;
pub mod archive_handlers;
pub mod asset_handlers;
pub mod feedback_handlers;
pub mod health_handlers;
pub mod storage_handlers;
