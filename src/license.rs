//! LICENSE.md 中第三方组件表的版本同步
//!
//! 文件中有且只有一个 ```` ```json:table ```` 代码块，内容形如
//! `{"items": [{"Origin": "...", "Version": "..."}]}`。按 `Origin` 找到组件
//! 后改写 `Version`，其余字段和键顺序保持不变。

use crate::errors::LicenseError;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

const TABLE_START: &str = "```json:table";
const FENCE: &str = "```";

/// 仓库地址去掉 `.git` 后缀后与 `Origin` 比较
fn origin_of(repository_url: &str) -> &str {
    repository_url.strip_suffix(".git").unwrap_or(repository_url)
}

fn to_pretty_json(value: &Value) -> Result<String, LicenseError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json 只会输出合法 UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// 改写文本；没有表格或没有匹配的组件时返回 `None`
pub fn patch_license_text(
    contents: &str,
    repository_url: &str,
    version: &str,
) -> Result<Option<String>, LicenseError> {
    let count = contents.matches(TABLE_START).count();
    if count == 0 {
        return Ok(None);
    }
    if count > 1 {
        return Err(LicenseError::MultipleTables {
            path: String::new(),
            count,
        });
    }

    let body_start = match contents.find(TABLE_START) {
        Some(pos) => pos + TABLE_START.len(),
        None => return Ok(None),
    };
    let body_end = match contents[body_start..].find(FENCE) {
        Some(pos) => body_start + pos,
        None => return Ok(None),
    };

    let mut table: Value = serde_json::from_str(&contents[body_start..body_end])?;
    let items = table
        .get_mut("items")
        .and_then(Value::as_array_mut)
        .ok_or(LicenseError::MissingItems)?;

    let origin = origin_of(repository_url);
    let item = items
        .iter_mut()
        .find(|item| item.get("Origin").and_then(Value::as_str) == Some(origin));
    match item {
        Some(item) => {
            item["Version"] = Value::String(version.to_string());
        }
        None => {
            tracing::info!("LICENSE 表中没有 {} 的条目", origin);
            return Ok(None);
        }
    }

    let mut patched = String::with_capacity(contents.len());
    patched.push_str(&contents[..body_start]);
    patched.push('\n');
    patched.push_str(&to_pretty_json(&table)?);
    patched.push('\n');
    patched.push_str(&contents[body_end..]);
    Ok(Some(patched))
}

/// 更新 `license_file` 中 `repository_url` 对应组件的版本，返回文件是否被改写
pub fn update_license(
    license_file: &Path,
    repository_url: &str,
    version: &str,
) -> Result<bool, LicenseError> {
    let path = license_file.display().to_string();
    let contents =
        fs::read_to_string(license_file).map_err(|e| LicenseError::Read(path.clone(), e))?;

    let patched = match patch_license_text(&contents, repository_url, version) {
        Ok(Some(patched)) => patched,
        Ok(None) => return Ok(false),
        Err(LicenseError::MultipleTables { count, .. }) => {
            return Err(LicenseError::MultipleTables { path, count })
        }
        Err(e) => return Err(e),
    };
    if patched == contents {
        return Ok(false);
    }

    fs::write(license_file, patched).map_err(|e| LicenseError::Write(path, e))?;
    tracing::info!("已将 {} 中 {} 的版本更新为 {}", license_file.display(), repository_url, version);
    Ok(true)
}
