use super::operations::run_git;
use crate::errors::GitError;
use async_trait::async_trait;

const TAG_PREFIX: &str = "refs/tags/";
const PEELED_SUFFIX: &str = "^{}";

/// `git ls-remote` 输出中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub sha: String,
    pub name: String,
}

impl RemoteRef {
    /// 解析 `<sha>\t<refname>`，空行或格式不对时返回 None
    pub fn from_ls_remote_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let sha = parts.next()?;
        let name = parts.next()?;
        Some(RemoteRef {
            sha: sha.to_string(),
            name: name.to_string(),
        })
    }

    /// 去掉 `refs/tags/` 前缀和附注标签的 `^{}` 后缀
    pub fn tag_name(&self) -> &str {
        let name = self.name.strip_prefix(TAG_PREFIX).unwrap_or(&self.name);
        name.strip_suffix(PEELED_SUFFIX).unwrap_or(name)
    }
}

pub fn parse_ls_remote(output: &str) -> Vec<RemoteRef> {
    output
        .lines()
        .filter_map(RemoteRef::from_ls_remote_line)
        .collect()
}

/// 远端引用查询
#[async_trait]
pub trait RemoteRefs: Send + Sync {
    /// 远端 `HEAD` 指向的提交
    async fn head_commit(&self, url: &str) -> Result<String, GitError>;

    /// 远端所有标签引用，保持服务端返回的顺序
    async fn tag_refs(&self, url: &str) -> Result<Vec<RemoteRef>, GitError>;
}

/// 通过 `git ls-remote` 查询，不需要本地仓库
#[derive(Debug, Clone, Default)]
pub struct GitRemote;

#[async_trait]
impl RemoteRefs for GitRemote {
    async fn head_commit(&self, url: &str) -> Result<String, GitError> {
        let output = run_git(None, &["ls-remote", url, "HEAD"]).await?;
        parse_ls_remote(&output.stdout)
            .into_iter()
            .next()
            .map(|r| r.sha)
            .ok_or_else(|| GitError::RefNotFound {
                url: url.to_string(),
                reference: "HEAD".to_string(),
            })
    }

    async fn tag_refs(&self, url: &str) -> Result<Vec<RemoteRef>, GitError> {
        let output = run_git(None, &["ls-remote", "--tags", url]).await?;
        Ok(parse_ls_remote(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ls_remote_keeps_order_and_skips_blank_lines() {
        let output = "\
1111111111111111111111111111111111111111\trefs/tags/v1.0
2222222222222222222222222222222222222222\trefs/tags/v1.0^{}

3333333333333333333333333333333333333333\trefs/tags/v2.0
";
        let refs = parse_ls_remote(output);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].name, "refs/tags/v1.0");
        assert_eq!(refs[1].sha, "2222222222222222222222222222222222222222");
        assert_eq!(refs[2].tag_name(), "v2.0");
    }

    #[test]
    fn test_tag_name_strips_peeled_suffix() {
        let r = RemoteRef::from_ls_remote_line("abc\trefs/tags/release/2024.1^{}").unwrap();
        assert_eq!(r.tag_name(), "release/2024.1");
    }

    #[test]
    fn test_malformed_line() {
        assert!(RemoteRef::from_ls_remote_line("abc").is_none());
        assert!(RemoteRef::from_ls_remote_line("   ").is_none());
    }
}
