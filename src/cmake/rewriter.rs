use super::block::{DeclarationBlock, FieldName};
use crate::errors::GitError;
use crate::resolver::Resolve;
use crate::types::{ShallowFlag, UpdateEntry};
use std::ops::Range;

/// 把单个声明块的 `GIT_TAG` 改写为上游最新引用
///
/// 缺少 `GIT_REPOSITORY` 或 `GIT_TAG` 的块原样返回，也不会去查询远端。
/// 引用发生变化时向 `entries` 追加一条记录；`entries` 由调用方持有，
/// 只在一次组件更新内有效。
pub async fn rewrite_block<R>(
    block: &DeclarationBlock<'_>,
    resolver: &R,
    entries: &mut Vec<UpdateEntry>,
) -> Result<String, GitError>
where
    R: Resolve + ?Sized,
{
    let text = block.text();
    let (repository, tag) = match (
        block.field(FieldName::Repository),
        block.field(FieldName::Tag),
    ) {
        (Some(repository), Some(tag)) => (repository, tag),
        _ => return Ok(text.to_string()),
    };

    let repository_url = repository.value();
    let resolved = resolver.resolve(repository_url).await?;
    let original_ref = tag.value();

    let new_tag = if tag.is_quoted() {
        format!("\"{}\"", resolved.reference)
    } else {
        resolved.reference.clone()
    };
    let mut edits: Vec<(Range<usize>, String)> = vec![(tag.range.clone(), new_tag)];

    if let Some(shallow) = block.field(FieldName::Shallow) {
        edits.push((
            shallow.range.clone(),
            ShallowFlag::for_reference(resolved.is_tag).to_string(),
        ));
    }

    if original_ref != resolved.reference {
        let label = block.label().unwrap_or_else(|| repository_url.to_string());
        tracing::debug!(
            "{}: {} -> {} ({})",
            label,
            original_ref,
            resolved.reference,
            if resolved.is_tag { "tag" } else { "commit" }
        );
        entries.push(UpdateEntry {
            component_label: label,
            repository_url: repository_url.to_string(),
            original_ref: original_ref.to_string(),
            updated_ref: resolved.reference.clone(),
        });
    }

    let replaced = splice(text, edits);
    tracing::debug!("String After update:\n {}", replaced);
    Ok(replaced)
}

/// 按区间替换文本，区间互不重叠
fn splice(text: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&text[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}
