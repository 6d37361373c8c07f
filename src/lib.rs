pub mod app;
pub mod args;
pub mod clients;
pub mod cmake;
pub mod config;
pub mod errors;
pub mod git;
pub mod license;
pub mod logging;
pub mod reconcile;
pub mod resolver;
pub mod retry;
pub mod types;

// Re-export commonly used items for convenience
pub use config::AutobotConfig;
pub use errors::AppError;
