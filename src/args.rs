use crate::config::PartialConfig;
use clap::builder::BoolishValueParser;
use clap::Parser;
use std::path::PathBuf;

/// autobot - 自动升级 CMake 依赖并维护合并请求
#[derive(Parser, Debug)]
#[command(name = "autobot")]
#[command(about = "把 CMake 依赖声明升级到上游最新版本，并为每个组件维护一个合并请求")]
pub struct Args {
    /// 克隆目录中声明文件所在的相对路径
    #[arg(long, alias = "workspace_path")]
    pub workspace_path: Option<PathBuf>,

    /// GitLab 服务器地址
    #[arg(long)]
    pub server_url: Option<String>,

    /// GitLab API 访问令牌
    #[arg(long)]
    pub private_token: Option<String>,

    /// GitLab 项目 ID 或路径
    #[arg(long)]
    pub project_id: Option<String>,

    /// 合并请求的目标分支
    #[arg(long)]
    pub target_branch: Option<String>,

    /// 流水线通过后自动合并 (true|false)
    #[arg(long, value_parser = BoolishValueParser::new())]
    pub auto_merge: Option<bool>,

    /// 同步 LICENSE.md 中的组件版本 (true|false)
    #[arg(long, value_parser = BoolishValueParser::new())]
    pub update_license_md: Option<bool>,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 配置文件路径
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 克隆项目的父目录
    #[arg(long)]
    pub clone_root: Option<PathBuf>,

    /// 使用已有的检出目录，不再克隆
    #[arg(long)]
    pub repository_dir: Option<PathBuf>,
}

impl Args {
    /// 命令行中给出的设置，优先级最高
    pub fn to_partial_config(&self) -> PartialConfig {
        PartialConfig {
            server_url: self.server_url.clone(),
            private_token: self.private_token.clone(),
            project_id: self.project_id.clone(),
            target_branch: self.target_branch.clone(),
            workspace_path: self.workspace_path.clone(),
            auto_merge: self.auto_merge,
            update_license_md: self.update_license_md,
            clone_root: self.clone_root.clone(),
            repository_dir: self.repository_dir.clone(),
            ..Default::default()
        }
    }
}
