use crate::errors::GitError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// 一次 git 命令的输出
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// 对账引擎需要的工作副本操作
///
/// 所有调用都是串行的；实现不需要考虑并发访问同一个工作副本。
#[async_trait]
pub trait WorkingCopy: Send + Sync {
    /// 工作副本根目录
    fn root(&self) -> &Path;

    /// 远端名称，通常是 `origin`
    fn remote_name(&self) -> &str;

    async fn fetch(&self) -> Result<(), GitError>;

    async fn reset_hard(&self, revision: &str) -> Result<(), GitError>;

    /// 工作区相对 `revision` 的差异
    async fn diff(&self, revision: &str) -> Result<String, GitError>;

    async fn remote_branch_exists(&self, branch: &str) -> Result<bool, GitError>;

    /// 创建（或重置）并切换到本地分支
    async fn checkout_new_branch(&self, branch: &str) -> Result<(), GitError>;

    /// 提交所有已跟踪文件的修改
    async fn commit_all(&self, message: &str) -> Result<(), GitError>;

    async fn push(&self, refspec: &str, force: bool) -> Result<(), GitError>;

    async fn head_sha(&self) -> Result<String, GitError>;
}

/// 基于 git 命令行的默认实现
#[derive(Debug, Clone)]
pub struct GitOps {
    repository_path: PathBuf,
    remote: String,
}

impl GitOps {
    pub fn new(repository_path: impl AsRef<Path>) -> Self {
        Self {
            repository_path: repository_path.as_ref().to_path_buf(),
            remote: "origin".to_string(),
        }
    }

    /// 克隆仓库到 `destination`，返回指向该目录的实例
    pub async fn clone_from(url: &str, destination: &Path) -> Result<Self, GitError> {
        let destination_str = destination.to_string_lossy().to_string();
        run_git(None, &["clone", url, &destination_str]).await?;
        Ok(Self::new(destination))
    }

    /// 检查是否在 Git 仓库中
    pub fn is_git_repository(&self) -> bool {
        self.repository_path.join(".git").exists()
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.execute_git_command(&["config", key, value]).await?;
        Ok(())
    }

    pub async fn execute_git_command(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        run_git(Some(&self.repository_path), args).await
    }
}

/// 执行 git 命令；失败时携带完整的命令、退出码和输出
pub async fn run_git(cwd: Option<&Path>, args: &[&str]) -> Result<CommandOutput, GitError> {
    let mut cmd = Command::new("git");
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.env("GIT_PAGER", "cat")
        .env("GIT_TERMINAL_PROMPT", "0")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let cmd_str = redact(&format!("git {}", args.join(" ")));
    tracing::debug!("执行 Git 命令: {}", cmd_str);

    let output = cmd
        .output()
        .await
        .map_err(|e| GitError::Spawn(cmd_str.clone(), e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: cmd_str,
            status_code: output.status.code(),
            stdout,
            stderr: redact(&stderr),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

/// 去掉 URL 中 `user:token@` 形式的凭据，避免写进日志
fn redact(text: &str) -> String {
    text.split(' ')
        .map(|word| match (word.find("://"), word.find('@')) {
            (Some(scheme), Some(at)) if at > scheme => {
                format!("{}://***@{}", &word[..scheme], &word[at + 1..])
            }
            _ => word.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl WorkingCopy for GitOps {
    fn root(&self) -> &Path {
        &self.repository_path
    }

    fn remote_name(&self) -> &str {
        &self.remote
    }

    async fn fetch(&self) -> Result<(), GitError> {
        if !self.is_git_repository() {
            return Err(GitError::NotARepository(self.repository_path.clone()));
        }
        self.execute_git_command(&["fetch", &self.remote]).await?;
        Ok(())
    }

    async fn reset_hard(&self, revision: &str) -> Result<(), GitError> {
        self.execute_git_command(&["reset", "--hard", revision]).await?;
        Ok(())
    }

    async fn diff(&self, revision: &str) -> Result<String, GitError> {
        let output = self.execute_git_command(&["diff", revision]).await?;
        Ok(output.stdout)
    }

    async fn remote_branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        let output = self
            .execute_git_command(&["branch", "-r", "--format=%(refname:short)"])
            .await?;
        let wanted = format!("{}/{}", self.remote, branch);
        Ok(output.stdout.lines().any(|line| line.trim() == wanted))
    }

    async fn checkout_new_branch(&self, branch: &str) -> Result<(), GitError> {
        self.execute_git_command(&["checkout", "-B", branch]).await?;
        Ok(())
    }

    async fn commit_all(&self, message: &str) -> Result<(), GitError> {
        self.execute_git_command(&["commit", "-a", "-m", message])
            .await?;
        Ok(())
    }

    async fn push(&self, refspec: &str, force: bool) -> Result<(), GitError> {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.push(&self.remote);
        args.push(refspec);
        self.execute_git_command(&args).await?;
        Ok(())
    }

    async fn head_sha(&self) -> Result<String, GitError> {
        let output = self.execute_git_command(&["rev-parse", "HEAD"]).await?;
        Ok(output.stdout.trim().to_string())
    }
}
