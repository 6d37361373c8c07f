//! 远端仓库最新引用的解析
//!
//! 取远端 `HEAD` 指向的提交；若有标签指向同一个提交，则返回标签名，
//! 否则返回提交哈希。多个标签指向同一提交时，以服务端列出的顺序取第一个，
//! 不做任何语义化版本排序。

use crate::errors::GitError;
use crate::git::{GitRemote, RemoteRefs};
use crate::types::ResolvedReference;
use async_trait::async_trait;

/// 声明改写器依赖的解析接口
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, repository_url: &str) -> Result<ResolvedReference, GitError>;
}

#[derive(Debug, Clone)]
pub struct ReferenceResolver<R = GitRemote> {
    remote: R,
}

impl Default for ReferenceResolver<GitRemote> {
    fn default() -> Self {
        Self::new(GitRemote)
    }
}

impl<R: RemoteRefs> ReferenceResolver<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<R: RemoteRefs> Resolve for ReferenceResolver<R> {
    async fn resolve(&self, repository_url: &str) -> Result<ResolvedReference, GitError> {
        let latest_commit = self.remote.head_commit(repository_url).await?;
        tracing::debug!("Last HEAD commit for {}: {}", repository_url, latest_commit);

        let tags = self.remote.tag_refs(repository_url).await?;
        tracing::debug!("{} 共有 {} 条标签引用", repository_url, tags.len());

        let resolved = match tags.iter().find(|t| t.sha == latest_commit) {
            Some(tag) => {
                tracing::debug!("Latest ref for {} is {}", latest_commit, tag.name);
                ResolvedReference {
                    repository_url: repository_url.to_string(),
                    is_tag: true,
                    reference: tag.tag_name().to_string(),
                }
            }
            None => ResolvedReference {
                repository_url: repository_url.to_string(),
                is_tag: false,
                reference: latest_commit,
            },
        };
        Ok(resolved)
    }
}
