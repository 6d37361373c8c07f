use super::block::{scan_blocks, FieldName};
use crate::errors::GitError;
use crate::types::{Declaration, ShallowFlag};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// 需要处理的构建配置文件后缀
pub const DECLARATION_FILE_SUFFIXES: [&str; 2] = [".cmake", "CMakeLists.txt"];

fn is_declaration_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .file_name()
            .to_str()
            .map(|name| DECLARATION_FILE_SUFFIXES.iter().any(|s| name.ends_with(s)))
            .unwrap_or(false)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

/// 遍历 `root`，返回所有构建配置文件，按文件名排序保证结果稳定
pub fn find_declaration_files(root: &Path) -> Result<Vec<PathBuf>, GitError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_git_dir(e));

    for entry in walker {
        let entry = entry.map_err(|e| GitError::Walk(e.to_string()))?;
        if is_declaration_file(&entry) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// 读取 `root` 下所有带 `GIT_REPOSITORY` 的声明
pub fn scan_declarations(root: &Path) -> Result<Vec<Declaration>, GitError> {
    let mut declarations = Vec::new();
    for path in find_declaration_files(root)? {
        tracing::info!("Processing {}", path.display());
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("无法读取 {}: {}", path.display(), e);
                continue;
            }
        };

        for block in scan_blocks(&text) {
            let Some(repository_url) = block.repository_url() else {
                continue;
            };
            declarations.push(Declaration {
                file_path: path.clone(),
                label: block.label().unwrap_or_default(),
                repository_url: repository_url.to_string(),
                current_ref: block.field(FieldName::Tag).map(|f| f.value().to_string()),
                shallow_flag: ShallowFlag::parse(
                    block.field(FieldName::Shallow).map(|f| f.value()),
                ),
            });
        }
    }
    Ok(declarations)
}

/// 所有声明中的仓库地址，保持出现顺序，不去重
pub fn find_declarations(root: &Path) -> Result<Vec<String>, GitError> {
    Ok(scan_declarations(root)?
        .into_iter()
        .map(|d| d.repository_url)
        .collect())
}
