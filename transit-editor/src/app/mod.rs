mod app_config;
mod editor_app;
mod editor_app_error;
mod progress_ops;

pub use app_config::{AppConfig, StoreArgs};
pub use editor_app::{parse_export_source, EditorApp, EditorOperation};
pub use editor_app_error::EditorAppError;
pub use progress_ops::run_with_progress;
