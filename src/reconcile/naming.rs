//! 合并请求的标签、标识串、分支名与提交信息

pub const LABEL_AUTOBOT: &str = "AUTOBOT";
pub const LABEL_SKIP_CHANGELOG: &str = "SKIP_CHANGELOG";
pub const LABEL_SKIP_AUTOBOT: &str = "SKIP_AUTOBOT";

pub const DRAFT_PREFIX: &str = "Draft:";
const BRANCH_PREFIX: &str = "scheduled/bot/";
const TEMPORARY_BRANCH_PREFIX: &str = "tmp_";
const TOKEN_START: &str = "BEGIN_ID:";
const TOKEN_END: &str = ":END_ID";
const BODY_WIDTH: usize = 72;

/// 组件与合并请求之间跨运行的关联标识
pub fn identification_token(repository_url: &str) -> String {
    format!("{TOKEN_START}{repository_url}{TOKEN_END}")
}

/// 从合并请求描述中取出标识串里的仓库地址
pub fn extract_identification(description: &str) -> Option<&str> {
    let start = description.find(TOKEN_START)? + TOKEN_START.len();
    let rest = &description[start..];
    let end = rest.find(TOKEN_END)?;
    Some(&rest[..end])
}

pub fn merge_request_description(repository_url: &str) -> String {
    format!(
        "Do not delete the line below.\nThis is used by autobot to find the merge request of a component. {}\n",
        identification_token(repository_url)
    )
}

pub fn merge_request_title(label: &str) -> String {
    format!("autobot: Update {label}")
}

pub fn draft_title(label: &str) -> String {
    format!("{DRAFT_PREFIX} {}", merge_request_title(label))
}

/// 去掉 `Draft:` 前缀，标题本来就不是草稿时返回 `None`
pub fn ready_title(title: &str) -> Option<String> {
    title
        .strip_prefix(DRAFT_PREFIX)
        .map(|rest| rest.trim_start().to_string())
}

pub fn commit_message(label: &str, reference: &str) -> String {
    let body = textwrap::fill(&format!("Update {label} to {reference}."), BODY_WIDTH);
    format!("{}\n\n{}", merge_request_title(label), body)
}

/// 标签中不适合出现在分支名里的字符替换为 `-`
fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '-' || c == '.');
    if cleaned.is_empty() {
        "component".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn branch_name(label: &str) -> String {
    format!("{BRANCH_PREFIX}{}", sanitize(label))
}

/// 同名远端分支已存在时追加的时间戳后缀
pub fn disambiguated_branch_name(label: &str, unix_seconds: i64) -> String {
    format!("{}_{unix_seconds}", branch_name(label))
}

pub fn temporary_branch_name(branch: &str) -> String {
    format!("{TEMPORARY_BRANCH_PREFIX}{branch}")
}
