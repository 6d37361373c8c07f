use super::autobot_config::{
    AutobotConfig, PartialConfig, ENV_GIT_USER, ENV_PRIVATE_TOKEN, ENV_PROJECT_ID,
    ENV_SERVER_URL, ENV_TARGET_BRANCH,
};
use crate::errors::ConfigError;
use std::{collections::HashMap, env, fs, path::Path, path::PathBuf};

const USER_CONFIG_DIR: &str = "autobot";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// 从配置文件、环境变量和命令行依次加载配置，后者优先
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    explicit: bool,
}

impl ConfigLoader {
    /// 使用默认位置 `~/.config/autobot/config.toml`，文件不存在时忽略
    pub fn new() -> Self {
        Self {
            config_path: dirs::config_dir().map(|dir| dir.join(USER_CONFIG_DIR).join(CONFIG_FILE_NAME)),
            explicit: false,
        }
    }

    /// 使用指定的配置文件，文件必须存在
    pub fn with_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
            explicit: true,
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self, cli: PartialConfig) -> Result<AutobotConfig, ConfigError> {
        self.load_with_env(cli, &collect_env_vars())
    }

    pub fn load_with_env(
        &self,
        cli: PartialConfig,
        env_map: &HashMap<String, String>,
    ) -> Result<AutobotConfig, ConfigError> {
        let file = self.load_partial_config()?.unwrap_or_default();
        file.merge_with_env(env_map).overlay(cli).resolve()
    }

    fn load_partial_config(&self) -> Result<Option<PartialConfig>, ConfigError> {
        let config_path = match &self.config_path {
            Some(path) => path,
            None => return Ok(None),
        };
        if !self.explicit && !config_path.exists() {
            tracing::debug!("配置文件 {} 不存在，跳过", config_path.display());
            return Ok(None);
        }

        let path = config_path.to_string_lossy().to_string();
        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::FileRead(path.clone(), e))?;
        let partial: PartialConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParse(path, e))?;

        tracing::debug!("已加载配置文件 {}", config_path.display());
        Ok(Some(partial))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// 收集相关的环境变量
fn collect_env_vars() -> HashMap<String, String> {
    let env_keys = [
        ENV_SERVER_URL,
        ENV_PRIVATE_TOKEN,
        ENV_PROJECT_ID,
        ENV_TARGET_BRANCH,
        ENV_GIT_USER,
    ];

    let mut env_map = HashMap::new();
    for key in &env_keys {
        if let Ok(value) = env::var(key) {
            env_map.insert(key.to_string(), value);
        }
    }
    env_map
}
