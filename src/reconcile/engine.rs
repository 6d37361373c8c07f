use super::naming::{
    branch_name, commit_message, disambiguated_branch_name, draft_title, extract_identification,
    merge_request_description, ready_title, temporary_branch_name, LABEL_AUTOBOT,
    LABEL_SKIP_AUTOBOT, LABEL_SKIP_CHANGELOG,
};
use crate::clients::ReviewServer;
use crate::cmake::{find_declarations, ComponentUpdater};
use crate::errors::AppError;
use crate::git::WorkingCopy;
use crate::license::update_license;
use crate::retry::{retry_git, RetryPolicy};
use crate::types::{
    MergeOptions, MergeRequest, MergeRequestUpdate, NewMergeRequest, PipelineStatus, UpdateStatus,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_BOT_AUTHOR: &str = "autobot";
const DEFAULT_MERGE_WAIT_SECONDS: u64 = 120;
const DEFAULT_MERGE_POLL_SECONDS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub target_branch: String,
    /// 搜索依赖声明的目录
    pub declarations_root: PathBuf,
    pub auto_merge: bool,
    /// 设置后同步 LICENSE.md 中的组件版本
    pub license_file: Option<PathBuf>,
    /// 机器人提交使用的作者名，其他作者的提交会让组件被跳过
    pub bot_author: String,
    pub merge_wait: Duration,
    pub merge_poll_interval: Duration,
    pub push_retry: RetryPolicy,
}

impl ReconcileOptions {
    pub fn new(target_branch: impl Into<String>, declarations_root: impl Into<PathBuf>) -> Self {
        Self {
            target_branch: target_branch.into(),
            declarations_root: declarations_root.into(),
            auto_merge: false,
            license_file: None,
            bot_author: DEFAULT_BOT_AUTHOR.to_string(),
            merge_wait: Duration::from_secs(DEFAULT_MERGE_WAIT_SECONDS),
            merge_poll_interval: Duration::from_secs(DEFAULT_MERGE_POLL_SECONDS),
            push_retry: RetryPolicy::default(),
        }
    }
}

/// 本轮提前结束的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// 最新提交还没有流水线，或者流水线尚未结束
    PipelinePending { iid: u64, sha: String },
    /// 已经尝试过一次合并
    MergeAttempted { iid: u64 },
    /// 流水线成功但在等待时间内没有变为可合并
    NotMergeable { iid: u64 },
}

/// 每个组件处理结束后的走向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassControl {
    Continue,
    Halt(HaltReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentOutcome {
    /// 合并请求带有 SKIP_AUTOBOT，或者包含他人的提交
    Skipped,
    UpToDate,
    UpdateFailed,
    /// 新建了合并请求
    Created { iid: u64 },
    /// 已有合并请求已包含这次更新，没有推送
    Unchanged { iid: u64 },
    /// 强制推送到已有合并请求的源分支
    Pushed { iid: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentReport {
    pub repository_url: String,
    pub outcome: ComponentOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub components: Vec<ComponentReport>,
    pub halted: Option<HaltReason>,
}

/// 逐个组件地更新声明并与评审服务器上的合并请求对账
pub struct ReconcileEngine<W, S, U> {
    repo: W,
    server: S,
    updater: U,
    options: ReconcileOptions,
}

impl<W, S, U> ReconcileEngine<W, S, U>
where
    W: WorkingCopy,
    S: ReviewServer,
    U: ComponentUpdater,
{
    pub fn new(repo: W, server: S, updater: U, options: ReconcileOptions) -> Self {
        Self {
            repo,
            server,
            updater,
            options,
        }
    }

    /// 在声明目录中发现组件并执行一轮维护
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let components = find_declarations(&self.options.declarations_root)?;
        tracing::info!(
            "在 {} 中发现 {} 个组件声明",
            self.options.declarations_root.display(),
            components.len()
        );
        self.run_pass(&components).await
    }

    /// 按发现顺序处理组件，每个地址只处理一次
    pub async fn run_pass(&self, components: &[String]) -> Result<RunSummary, AppError> {
        let mut summary = RunSummary::default();
        let mut seen = HashSet::new();

        for repository_url in components {
            if !seen.insert(repository_url.as_str()) {
                continue;
            }
            tracing::info!("Component Repo: {}", repository_url);

            let (outcome, control) = self.process_component(repository_url).await?;
            tracing::info!("{} -> {:?}", repository_url, outcome);
            summary.components.push(ComponentReport {
                repository_url: repository_url.clone(),
                outcome,
            });

            if let PassControl::Halt(reason) = control {
                tracing::info!("本轮结束: {:?}", reason);
                summary.halted = Some(reason);
                break;
            }
        }
        Ok(summary)
    }

    fn target_revision(&self) -> String {
        format!("{}/{}", self.repo.remote_name(), self.options.target_branch)
    }

    async fn log_diff(&self, revision: &str) {
        match self.repo.diff(revision).await {
            Ok(diff) => tracing::debug!("Diff against {}:\n{}", revision, diff),
            Err(e) => tracing::debug!("无法获取与 {} 的差异: {}", revision, e),
        }
    }

    async fn process_component(
        &self,
        repository_url: &str,
    ) -> Result<(ComponentOutcome, PassControl), AppError> {
        // 每个组件都从干净的目标分支开始
        let target = self.target_revision();
        self.repo.fetch().await?;
        tracing::info!("Reset {} to {}", self.repo.root().display(), target);
        self.repo.reset_hard(&target).await?;
        self.log_diff(&target).await;

        let existing = self.find_existing_merge_request(repository_url).await?;
        if let Some(mr) = &existing {
            if self.should_skip(mr).await? {
                tracing::info!("!{} 被标记为 {}，跳过", mr.iid, LABEL_SKIP_AUTOBOT);
                return Ok((ComponentOutcome::Skipped, PassControl::Continue));
            }
        }

        let result = self
            .updater
            .update(&self.options.declarations_root, repository_url)
            .await;
        tracing::info!("Update Component Result: {} ({} entries)", result.status, result.entries.len());
        self.log_diff(&target).await;

        let entry = match (result.status, result.primary_entry()) {
            (UpdateStatus::Error, _) => {
                tracing::error!("Error while updating component {}", repository_url);
                return Ok((ComponentOutcome::UpdateFailed, PassControl::Continue));
            }
            (UpdateStatus::UpToDate, _) => {
                tracing::info!("Target branch already has latest git ref for component {}", repository_url);
                return Ok((ComponentOutcome::UpToDate, PassControl::Continue));
            }
            (UpdateStatus::Updated, None) => {
                tracing::info!(
                    "Only GIT_SHALLOW changed for component {}, git ref unchanged; not proposing a merge request",
                    repository_url
                );
                return Ok((ComponentOutcome::UpToDate, PassControl::Continue));
            }
            (UpdateStatus::Updated, Some(entry)) => entry.clone(),
        };

        if let Some(license_file) = &self.options.license_file {
            if let Err(e) = update_license(license_file, repository_url, &entry.updated_ref) {
                tracing::warn!("同步 {} 失败: {}", license_file.display(), e);
            }
        }

        let branch = match &existing {
            Some(mr) => mr.source_branch.clone(),
            None => self.new_branch_name(&entry.component_label).await?,
        };

        self.repo
            .checkout_new_branch(&temporary_branch_name(&branch))
            .await?;
        self.repo
            .commit_all(&commit_message(&entry.component_label, &entry.updated_ref))
            .await?;
        self.log_diff(&target).await;

        let (outcome, iid, latest_sha) = match existing {
            None => {
                tracing::info!("Create MR for component {}", repository_url);
                self.push(&branch, false).await?;
                let request = NewMergeRequest {
                    source_branch: branch.clone(),
                    target_branch: self.options.target_branch.clone(),
                    title: draft_title(&entry.component_label),
                    labels: vec![LABEL_AUTOBOT.to_string(), LABEL_SKIP_CHANGELOG.to_string()],
                    description: merge_request_description(repository_url),
                };
                let mr = self.server.create_merge_request(&request).await?;
                tracing::info!("已创建合并请求 !{}: {}", mr.iid, mr.title);
                let sha = Some(self.repo.head_sha().await?);
                (ComponentOutcome::Created { iid: mr.iid }, mr.iid, sha)
            }
            Some(mr) => {
                let source = format!("{}/{}", self.repo.remote_name(), mr.source_branch);
                let diff = self.repo.diff(&source).await?;
                if diff.is_empty() {
                    tracing::info!("No new changes identified for component {}", repository_url);
                    (ComponentOutcome::Unchanged { iid: mr.iid }, mr.iid, mr.sha.clone())
                } else {
                    tracing::info!("Push new changes identified for component {}", repository_url);
                    self.push(&mr.source_branch, true).await?;
                    let sha = Some(self.repo.head_sha().await?);
                    (ComponentOutcome::Pushed { iid: mr.iid }, mr.iid, sha)
                }
            }
        };

        let control = if self.options.auto_merge {
            self.evaluate_auto_merge(iid, latest_sha).await?
        } else {
            PassControl::Continue
        };
        Ok((outcome, control))
    }

    /// 按描述中的标识串与目标分支查找打开的合并请求
    async fn find_existing_merge_request(
        &self,
        repository_url: &str,
    ) -> Result<Option<MergeRequest>, AppError> {
        tracing::info!("Check if an MR present for {}", repository_url);
        let open = self.server.open_merge_requests().await?;
        Ok(open.into_iter().find(|mr| {
            mr.target_branch == self.options.target_branch
                && mr
                    .description
                    .as_deref()
                    .and_then(extract_identification)
                    == Some(repository_url)
        }))
    }

    /// 已有 SKIP_AUTOBOT 标签，或者有他人提交（此时补上标签）时返回真
    async fn should_skip(&self, mr: &MergeRequest) -> Result<bool, AppError> {
        if mr.has_label(LABEL_SKIP_AUTOBOT) {
            return Ok(true);
        }

        let commits = self.server.merge_request_commits(mr.iid).await?;
        let foreign = commits
            .iter()
            .find(|commit| commit.author_name != self.options.bot_author);
        match foreign {
            Some(commit) => {
                tracing::info!(
                    "!{} 包含 {} 的提交 {}，添加 {}",
                    mr.iid,
                    commit.author_name,
                    commit.id,
                    LABEL_SKIP_AUTOBOT
                );
                let update = MergeRequestUpdate {
                    add_labels: Some(vec![LABEL_SKIP_AUTOBOT.to_string()]),
                    ..Default::default()
                };
                self.server.update_merge_request(mr.iid, &update).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn new_branch_name(&self, label: &str) -> Result<String, AppError> {
        let branch = branch_name(label);
        if self.repo.remote_branch_exists(&branch).await? {
            let branch = disambiguated_branch_name(label, chrono::Utc::now().timestamp());
            tracing::info!("Branch name exists, create with {}", branch);
            return Ok(branch);
        }
        Ok(branch)
    }

    async fn push(&self, branch: &str, force: bool) -> Result<(), AppError> {
        let repo = &self.repo;
        let refspec = format!("HEAD:{branch}");
        let refspec = refspec.as_str();
        retry_git(&self.options.push_retry, &format!("push {refspec}"), move || {
            repo.push(refspec, force)
        })
        .await
    }

    async fn evaluate_auto_merge(
        &self,
        iid: u64,
        latest_sha: Option<String>,
    ) -> Result<PassControl, AppError> {
        let sha = latest_sha.unwrap_or_default();
        let pipelines = self.server.merge_request_pipelines(iid).await?;
        let status = pipelines
            .iter()
            .find(|pipeline| pipeline.sha == sha)
            .map(|pipeline| pipeline.status);

        match status {
            Some(PipelineStatus::Success) => {}
            Some(status) if status.is_unsuccessful() => {
                tracing::info!("!{} 的流水线状态为 {:?}，继续下一个组件", iid, status);
                return Ok(PassControl::Continue);
            }
            other => {
                tracing::info!("!{} 在 {} 上的流水线尚未结束: {:?}", iid, sha, other);
                return Ok(PassControl::Halt(HaltReason::PipelinePending { iid, sha }));
            }
        }

        let mr = match self.wait_until_mergeable(iid).await? {
            Some(mr) => mr,
            None => {
                tracing::warn!("!{} 在等待时间内没有变为可合并", iid);
                return Ok(PassControl::Halt(HaltReason::NotMergeable { iid }));
            }
        };

        if let Some(title) = ready_title(&mr.title) {
            let update = MergeRequestUpdate {
                title: Some(title),
                ..Default::default()
            };
            self.server.update_merge_request(iid, &update).await?;
        }
        if let Err(e) = self.server.approve_merge_request(iid).await {
            tracing::warn!("批准 !{} 失败: {}", iid, e);
        }
        let options = MergeOptions {
            merge_when_pipeline_succeeds: true,
            should_remove_source_branch: true,
        };
        if let Err(e) = self.server.merge_merge_request(iid, &options).await {
            tracing::warn!("合并 !{} 失败: {}", iid, e);
        }
        Ok(PassControl::Halt(HaltReason::MergeAttempted { iid }))
    }

    /// 轮询合并状态，直到可合并或超过等待上限
    async fn wait_until_mergeable(&self, iid: u64) -> Result<Option<MergeRequest>, AppError> {
        let step = self.options.merge_poll_interval.max(Duration::from_millis(1));
        let mut waited = Duration::ZERO;
        while waited < self.options.merge_wait {
            let mr = self.server.merge_request(iid).await?;
            tracing::info!("!{} merge status: {}", iid, mr.merge_status);
            if mr.can_be_merged() {
                return Ok(Some(mr));
            }
            sleep(step).await;
            waited += step;
        }
        Ok(None)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
