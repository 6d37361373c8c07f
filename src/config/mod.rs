pub mod autobot_config;
pub mod loader;

pub use autobot_config::{AutobotConfig, PartialConfig, DEFAULT_CLONE_ROOT};
pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
