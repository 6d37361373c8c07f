use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// `GIT_SHALLOW` 字段的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShallowFlag {
    On,
    Off,
    Absent,
}

impl ShallowFlag {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("ON") => ShallowFlag::On,
            Some("OFF") => ShallowFlag::Off,
            _ => ShallowFlag::Absent,
        }
    }

    /// 标签可以浅克隆，任意提交哈希不行
    pub fn for_reference(is_tag: bool) -> &'static str {
        if is_tag {
            "ON"
        } else {
            "OFF"
        }
    }
}

/// 构建文件中的一个依赖声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub file_path: PathBuf,
    pub label: String,
    pub repository_url: String,
    pub current_ref: Option<String>,
    pub shallow_flag: ShallowFlag,
}

/// 远端仓库的最新引用，`reference` 在 `is_tag` 时是标签名，否则是完整提交哈希
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub repository_url: String,
    pub is_tag: bool,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateEntry {
    pub component_label: String,
    pub repository_url: String,
    pub original_ref: String,
    pub updated_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateStatus {
    UpToDate,
    Updated,
    Error,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateStatus::UpToDate => "already_up-to-date",
            UpdateStatus::Updated => "updated",
            UpdateStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub status: UpdateStatus,
    pub entries: Vec<UpdateEntry>,
}

impl UpdateResult {
    pub fn error() -> Self {
        Self {
            status: UpdateStatus::Error,
            entries: Vec::new(),
        }
    }

    /// 第一个条目决定分支名、提交信息以及 LICENSE 中的版本
    pub fn primary_entry(&self) -> Option<&UpdateEntry> {
        self.entries.first()
    }
}
