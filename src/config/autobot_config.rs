use crate::errors::ConfigError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const ENV_SERVER_URL: &str = "AUTOBOT_SERVER_URL";
pub const ENV_PRIVATE_TOKEN: &str = "AUTOBOT_PRIVATE_TOKEN";
pub const ENV_PROJECT_ID: &str = "AUTOBOT_PROJECT_ID";
pub const ENV_TARGET_BRANCH: &str = "AUTOBOT_TARGET_BRANCH";
pub const ENV_GIT_USER: &str = "GITLAB_USER_ID";

pub const DEFAULT_CLONE_ROOT: &str = "autobot_workspace";
const DEFAULT_WORKSPACE_PATH: &str = ".";
const DEFAULT_GIT_USER: &str = "oauth2";
const DEFAULT_BOT_NAME: &str = "autobot";
const DEFAULT_BOT_EMAIL: &str = "autobot-noreply@localhost";
const DEFAULT_MERGE_WAIT_SECONDS: u64 = 120;
const DEFAULT_PUSH_ATTEMPTS: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// 配置文件、环境变量与命令行中可能出现的设置，全部可选
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct PartialConfig {
    pub server_url: Option<String>,
    pub private_token: Option<String>,
    pub project_id: Option<String>,
    pub target_branch: Option<String>,
    /// 克隆目录中声明文件所在的相对路径
    pub workspace_path: Option<PathBuf>,
    pub auto_merge: Option<bool>,
    pub update_license_md: Option<bool>,
    pub clone_root: Option<PathBuf>,
    /// 使用已有的检出目录，不再克隆
    pub repository_dir: Option<PathBuf>,
    /// 克隆地址中使用的用户名
    pub git_user: Option<String>,
    pub bot_name: Option<String>,
    pub bot_email: Option<String>,
    pub merge_wait_seconds: Option<u64>,
    pub push_max_attempts: Option<u32>,
    pub request_timeout_seconds: Option<u64>,
}

/// 校验之后的完整配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutobotConfig {
    pub server_url: String,
    pub private_token: String,
    pub project_id: String,
    pub target_branch: String,
    pub workspace_path: PathBuf,
    pub auto_merge: bool,
    pub update_license_md: bool,
    pub clone_root: PathBuf,
    pub repository_dir: Option<PathBuf>,
    pub git_user: String,
    pub bot_name: String,
    pub bot_email: String,
    pub merge_wait_seconds: u64,
    pub push_max_attempts: u32,
    pub request_timeout_seconds: u64,
}

impl PartialConfig {
    /// 用 `other` 中已设置的字段覆盖当前值
    pub fn overlay(self, other: PartialConfig) -> Self {
        Self {
            server_url: other.server_url.or(self.server_url),
            private_token: other.private_token.or(self.private_token),
            project_id: other.project_id.or(self.project_id),
            target_branch: other.target_branch.or(self.target_branch),
            workspace_path: other.workspace_path.or(self.workspace_path),
            auto_merge: other.auto_merge.or(self.auto_merge),
            update_license_md: other.update_license_md.or(self.update_license_md),
            clone_root: other.clone_root.or(self.clone_root),
            repository_dir: other.repository_dir.or(self.repository_dir),
            git_user: other.git_user.or(self.git_user),
            bot_name: other.bot_name.or(self.bot_name),
            bot_email: other.bot_email.or(self.bot_email),
            merge_wait_seconds: other.merge_wait_seconds.or(self.merge_wait_seconds),
            push_max_attempts: other.push_max_attempts.or(self.push_max_attempts),
            request_timeout_seconds: other.request_timeout_seconds.or(self.request_timeout_seconds),
        }
    }

    /// 环境变量覆盖配置文件中的同名设置
    pub fn merge_with_env(mut self, env_map: &HashMap<String, String>) -> Self {
        let get = |key: &str| env_map.get(key).filter(|v| !v.is_empty()).cloned();
        if let Some(v) = get(ENV_SERVER_URL) {
            self.server_url = Some(v);
        }
        if let Some(v) = get(ENV_PRIVATE_TOKEN) {
            self.private_token = Some(v);
        }
        if let Some(v) = get(ENV_PROJECT_ID) {
            self.project_id = Some(v);
        }
        if let Some(v) = get(ENV_TARGET_BRANCH) {
            self.target_branch = Some(v);
        }
        if let Some(v) = get(ENV_GIT_USER) {
            self.git_user = Some(v);
        }
        self
    }

    pub fn resolve(self) -> Result<AutobotConfig, ConfigError> {
        let server_url = required(self.server_url, "server_url")?;
        Url::parse(&server_url).map_err(|e| ConfigError::InvalidUrl(format!("{server_url}: {e}")))?;

        let private_token = self
            .private_token
            .ok_or_else(|| ConfigError::FieldMissing("private_token".to_string()))?;
        if private_token.trim().is_empty() {
            return Err(ConfigError::EmptyToken);
        }

        Ok(AutobotConfig {
            server_url,
            private_token,
            project_id: required(self.project_id, "project_id")?,
            target_branch: required(self.target_branch, "target_branch")?,
            workspace_path: self
                .workspace_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE_PATH)),
            auto_merge: self.auto_merge.unwrap_or(false),
            update_license_md: self.update_license_md.unwrap_or(true),
            clone_root: self
                .clone_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLONE_ROOT)),
            repository_dir: self.repository_dir,
            git_user: self.git_user.unwrap_or_else(|| DEFAULT_GIT_USER.to_string()),
            bot_name: self.bot_name.unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
            bot_email: self.bot_email.unwrap_or_else(|| DEFAULT_BOT_EMAIL.to_string()),
            merge_wait_seconds: self.merge_wait_seconds.unwrap_or(DEFAULT_MERGE_WAIT_SECONDS),
            push_max_attempts: self.push_max_attempts.unwrap_or(DEFAULT_PUSH_ATTEMPTS).max(1),
            request_timeout_seconds: self
                .request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::FieldMissing(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PartialConfig {
        PartialConfig {
            server_url: Some("https://gitlab.example.com".to_string()),
            private_token: Some("file-token".to_string()),
            project_id: Some("42".to_string()),
            target_branch: Some("main".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_after_resolve() {
        let config = complete().resolve().unwrap();
        assert_eq!(config.workspace_path, PathBuf::from("."));
        assert!(!config.auto_merge);
        assert!(config.update_license_md);
        assert_eq!(config.clone_root, PathBuf::from("autobot_workspace"));
        assert_eq!(config.repository_dir, None);
        assert_eq!(config.git_user, "oauth2");
        assert_eq!(config.bot_name, "autobot");
        assert_eq!(config.merge_wait_seconds, 120);
        assert_eq!(config.push_max_attempts, 5);
    }

    #[test]
    fn test_missing_required_field() {
        let config = PartialConfig {
            target_branch: None,
            ..complete()
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::FieldMissing(field)) if field == "target_branch"
        ));

        let config = PartialConfig {
            project_id: Some("  ".to_string()),
            ..complete()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::FieldMissing(_))));
    }

    #[test]
    fn test_empty_token_and_bad_url() {
        let config = PartialConfig {
            private_token: Some(String::new()),
            ..complete()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::EmptyToken)));

        let config = PartialConfig {
            server_url: Some("gitlab.example.com".to_string()),
            ..complete()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut env_map = HashMap::new();
        env_map.insert(ENV_PRIVATE_TOKEN.to_string(), "env-token".to_string());
        env_map.insert(ENV_GIT_USER.to_string(), "bot-user".to_string());
        env_map.insert(ENV_TARGET_BRANCH.to_string(), String::new());

        let resolved = complete().merge_with_env(&env_map).resolve().unwrap();
        assert_eq!(resolved.private_token, "env-token");
        assert_eq!(resolved.git_user, "bot-user");
        // 空值不会覆盖
        assert_eq!(resolved.target_branch, "main");
        assert_eq!(resolved.server_url, "https://gitlab.example.com");
    }

    #[test]
    fn test_overlay_prefers_set_fields() {
        let cli = PartialConfig {
            target_branch: Some("develop".to_string()),
            auto_merge: Some(true),
            ..Default::default()
        };
        let resolved = complete().overlay(cli).resolve().unwrap();
        assert_eq!(resolved.target_branch, "develop");
        assert!(resolved.auto_merge);
        assert_eq!(resolved.private_token, "file-token");
    }

    #[test]
    fn test_parse_toml() {
        let config: PartialConfig = toml::from_str(
            r#"
server_url = "https://gitlab.example.com"
project_id = "group/project"
auto_merge = true
clone_root = "/tmp/autobot"
merge_wait_seconds = 30
"#,
        )
        .unwrap();
        assert_eq!(config.project_id.as_deref(), Some("group/project"));
        assert_eq!(config.auto_merge, Some(true));
        assert_eq!(config.clone_root, Some(PathBuf::from("/tmp/autobot")));
        assert_eq!(config.merge_wait_seconds, Some(30));
        assert_eq!(config.private_token, None);
    }
}
