use super::block::scan_blocks;
use super::locator::find_declaration_files;
use super::rewriter::rewrite_block;
use crate::errors::GitError;
use crate::resolver::Resolve;
use crate::types::{UpdateEntry, UpdateResult, UpdateStatus};
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 更新一个组件在工作区中的所有声明
#[async_trait]
pub trait ComponentUpdater: Send + Sync {
    async fn update(&self, root: &Path, repository_url: &str) -> UpdateResult;
}

/// 使用真实解析器的默认实现
pub struct DeclarationUpdater<R> {
    resolver: R,
}

impl<R: Resolve> DeclarationUpdater<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl<R: Resolve> ComponentUpdater for DeclarationUpdater<R> {
    async fn update(&self, root: &Path, repository_url: &str) -> UpdateResult {
        update_component(root, repository_url, &self.resolver).await
    }
}

/// 把 `root` 下所有引用 `repository_url` 的声明更新到最新引用
///
/// 版本控制层面的任何错误（包括远端查询失败）都记为 `Error`，
/// 已经写回的文件不会回滚，由调用方在下一个组件前重置工作区。
pub async fn update_component<R>(root: &Path, repository_url: &str, resolver: &R) -> UpdateResult
where
    R: Resolve + ?Sized,
{
    match try_update_component(root, repository_url, resolver).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("更新 {} 失败: {}", repository_url, e);
            UpdateResult::error()
        }
    }
}

async fn try_update_component<R>(
    root: &Path,
    repository_url: &str,
    resolver: &R,
) -> Result<UpdateResult, GitError>
where
    R: Resolve + ?Sized,
{
    let files = find_declaration_files(root)?;
    tracing::info!("Found {} cmake files in {}", files.len(), root.display());

    let mut entries: Vec<UpdateEntry> = Vec::new();
    let mut status = UpdateStatus::UpToDate;

    for path in files {
        tracing::info!("Processing {}", path.display());
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("无法读取 {}: {}", path.display(), e);
                continue;
            }
        };

        let mut replaced = String::with_capacity(text.len());
        let mut cursor = 0;
        for block in scan_blocks(&text) {
            if !block.text().contains(repository_url) {
                continue;
            }
            replaced.push_str(&text[cursor..block.span.start]);
            replaced.push_str(&rewrite_block(&block, resolver, &mut entries).await?);
            cursor = block.span.end;
        }
        replaced.push_str(&text[cursor..]);

        if replaced != text {
            write_atomically(&path, &replaced)?;
            status = UpdateStatus::Updated;
        }
    }

    Ok(UpdateResult { status, entries })
}

/// 先写同目录下的临时文件再改名，保留原文件权限
fn write_atomically(path: &Path, contents: &str) -> Result<(), GitError> {
    let to_err = |e: std::io::Error| GitError::FileWrite(path.to_path_buf(), e);
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(to_err)?;
    tmp.write_all(contents.as_bytes()).map_err(to_err)?;
    tmp.as_file().sync_all().map_err(to_err)?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(to_err)?;
    }
    tmp.persist(path).map_err(|e| to_err(e.error))?;
    Ok(())
}
