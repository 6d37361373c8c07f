// 主应用程序逻辑：准备工作区，然后执行一轮维护

use crate::clients::GitLabClient;
use crate::cmake::DeclarationUpdater;
use crate::config::AutobotConfig;
use crate::errors::{io_error, AppError, AppResult, ConfigError, GitError};
use crate::git::{GitOps, GitRemote, WorkingCopy};
use crate::logging::OperationTimer;
use crate::reconcile::{ReconcileEngine, ReconcileOptions, RunSummary};
use crate::resolver::ReferenceResolver;
use crate::retry::RetryPolicy;
use reqwest::Url;
use std::fs;
use std::path::Path;
use std::time::Duration;

const LICENSE_FILE_NAME: &str = "LICENSE.md";

/// 执行一轮完整的维护
pub async fn run(config: &AutobotConfig) -> AppResult<RunSummary> {
    let timer = OperationTimer::new("autobot_pass")
        .with_metadata("project", &config.project_id)
        .with_metadata("target_branch", &config.target_branch);

    let client = GitLabClient::new(&config.server_url, &config.project_id, &config.private_token)?
        .with_timeout(Duration::from_secs(config.request_timeout_seconds));
    let repo = prepare_workspace(config, &client).await?;
    let options = reconcile_options(config, repo.root());

    tracing::info!(
        "处理 {}，目标分支 {}，自动合并: {}",
        options.declarations_root.display(),
        options.target_branch,
        options.auto_merge
    );
    let updater = DeclarationUpdater::new(ReferenceResolver::new(GitRemote));
    let engine = ReconcileEngine::new(repo, client, updater, options);
    let summary = engine.run().await?;

    for report in &summary.components {
        tracing::info!("{}: {:?}", report.repository_url, report.outcome);
    }
    timer.finish();
    Ok(summary)
}

/// 根据配置决定声明目录、LICENSE 文件与重试参数
pub fn reconcile_options(config: &AutobotConfig, clone_dir: &Path) -> ReconcileOptions {
    let mut options = ReconcileOptions::new(
        config.target_branch.clone(),
        clone_dir.join(&config.workspace_path),
    );
    options.auto_merge = config.auto_merge;
    options.license_file = config
        .update_license_md
        .then(|| clone_dir.join(LICENSE_FILE_NAME));
    options.bot_author = config.bot_name.clone();
    options.merge_wait = Duration::from_secs(config.merge_wait_seconds);
    options.push_retry = RetryPolicy::default().with_max_attempts(config.push_max_attempts);
    options
}

/// 克隆项目（或使用已有检出），并设置提交身份
async fn prepare_workspace(config: &AutobotConfig, client: &GitLabClient) -> AppResult<GitOps> {
    let repo = match &config.repository_dir {
        Some(dir) => {
            let repo = GitOps::new(dir);
            if !repo.is_git_repository() {
                return Err(GitError::NotARepository(dir.clone()).into());
            }
            tracing::info!("使用已有的检出目录 {}", dir.display());
            repo
        }
        None => {
            let project = client.project().await?;
            let destination = config.clone_root.join(&project.name);
            if destination.is_dir() {
                tracing::info!("删除旧的克隆目录 {}", destination.display());
                fs::remove_dir_all(&destination)
                    .map_err(|e| io_error(format!("removing {}", destination.display()), e))?;
            }
            fs::create_dir_all(&config.clone_root)
                .map_err(|e| io_error(format!("creating {}", config.clone_root.display()), e))?;

            let url = authenticated_url(&project.http_url_to_repo, &config.git_user, &config.private_token)?;
            tracing::info!("克隆 {} 到 {}", project.http_url_to_repo, destination.display());
            GitOps::clone_from(&url, &destination).await?
        }
    };

    repo.set_config("user.name", &config.bot_name).await?;
    repo.set_config("user.email", &config.bot_email).await?;
    Ok(repo)
}

/// 在仓库地址中嵌入 `user:token@` 凭据
pub fn authenticated_url(repository_url: &str, user: &str, token: &str) -> Result<String, AppError> {
    let invalid = || ConfigError::InvalidUrl(repository_url.to_string());
    let mut url = Url::parse(repository_url).map_err(|_| invalid())?;
    url.set_username(user).map_err(|_| invalid())?;
    url.set_password(Some(token)).map_err(|_| invalid())?;
    Ok(url.to_string())
}
