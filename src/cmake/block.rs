//! 声明块定位
//!
//! 只做够用的词法扫描：识别 `FetchContent_Declare(...)` / `ExternalProject_Add(...)`，
//! 按括号配对确定块边界，跳过字符串、行注释和括号注释。块内字段用正则在
//! 去掉注释的视图上读取（注释替换为等长空白，字节偏移不变），
//! 改写时按字节区间拼接，块外以及块内无关的文本保持原样。

use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

pub const DECLARATION_KEYWORDS: [&str; 2] = ["FetchContent_Declare", "ExternalProject_Add"];

lazy_static! {
    static ref RE_REPOSITORY: Regex =
        Regex::new(r##"\bGIT_REPOSITORY\s+("[^"]*"|[^\s()"#]+)"##).unwrap();
    static ref RE_TAG: Regex = Regex::new(r##"\bGIT_TAG\s+("[^"]*"|[^\s()"#]+)"##).unwrap();
    static ref RE_SHALLOW: Regex = Regex::new(r"\bGIT_SHALLOW\s+(ON|OFF)\b").unwrap();
    static ref RE_FIRST_ARG: Regex = Regex::new(r##"^\s*("[^"]*"|[^\s()"#]+)"##).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Repository,
    Tag,
    Shallow,
}

impl FieldName {
    fn regex(self) -> &'static Regex {
        match self {
            FieldName::Repository => &RE_REPOSITORY,
            FieldName::Tag => &RE_TAG,
            FieldName::Shallow => &RE_SHALLOW,
        }
    }
}

/// 块内某个字段的值及其在块文本中的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<'a> {
    pub raw: &'a str,
    pub range: Range<usize>,
}

impl<'a> Field<'a> {
    pub fn is_quoted(&self) -> bool {
        self.raw.len() >= 2 && self.raw.starts_with('"') && self.raw.ends_with('"')
    }

    pub fn value(&self) -> &'a str {
        if self.is_quoted() {
            &self.raw[1..self.raw.len() - 1]
        } else {
            self.raw
        }
    }
}

/// 一个声明块，`span` 是在整个文件中的位置（从关键字到右括号）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationBlock<'a> {
    pub keyword: &'static str,
    pub span: Range<usize>,
    text: &'a str,
    body: Range<usize>,
}

impl<'a> DeclarationBlock<'a> {
    /// 块的完整文本
    pub fn text(&self) -> &'a str {
        self.text
    }

    fn body(&self) -> &'a str {
        &self.text[self.body.clone()]
    }

    /// 查找字段，返回的区间相对于 [`text`](Self::text)
    ///
    /// 注释中的 `GIT_TAG` 等文字不算字段。
    pub fn field(&self, name: FieldName) -> Option<Field<'a>> {
        let body = self.body();
        let masked = mask_comments(body);
        let caps = name.regex().captures(&masked)?;
        let m = caps.get(1)?;
        let offset = self.body.start;
        Some(Field {
            raw: &body[m.start()..m.end()],
            range: offset + m.start()..offset + m.end(),
        })
    }

    pub fn repository_url(&self) -> Option<&'a str> {
        self.field(FieldName::Repository).map(|f| f.value())
    }

    /// 组件名：声明的第一个参数；若第一个参数就是关键字段，退回到仓库名
    pub fn label(&self) -> Option<String> {
        let body = self.body();
        let masked = mask_comments(body);
        let first = RE_FIRST_ARG
            .captures(&masked)
            .and_then(|c| c.get(1))
            .map(|m| body[m.start()..m.end()].trim_matches('"'))
            .filter(|s| !s.is_empty() && !s.starts_with("GIT_"));
        match first {
            Some(name) => Some(name.to_string()),
            None => self.repository_url().map(repository_name),
        }
    }
}

/// `https://host/group/foo.git` -> `foo`
pub fn repository_name(url: &str) -> String {
    let tail = url.trim_end_matches('/').rsplit(['/', ':']).next().unwrap_or(url);
    tail.strip_suffix(".git").unwrap_or(tail).to_string()
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// 跳过从 `start`（指向 `"`）开始的字符串，返回结束引号之后的位置
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// 跳过从 `start`（指向 `#`）开始的注释，支持 `#[[ ... ]]` 括号注释
fn skip_comment(text: &str, start: usize) -> usize {
    let rest = &text[start..];
    if let Some(bracket) = rest.strip_prefix("#[") {
        let equals = bracket.bytes().take_while(|b| *b == b'=').count();
        if bracket.as_bytes().get(equals) == Some(&b'[') {
            let close = format!("]{}]", "=".repeat(equals));
            let body_start = start + 2 + equals + 1;
            return match text[body_start..].find(&close) {
                Some(pos) => body_start + pos + close.len(),
                None => text.len(),
            };
        }
    }
    match rest.find('\n') {
        Some(pos) => start + pos,
        None => text.len(),
    }
}

/// `#` 只有出现在参数边界时才是注释
fn starts_comment(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace() || bytes[i - 1] == b'(')
}

/// 把注释替换为等长的空格，字符串中的 `#` 保持原样
fn mask_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut masked = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_quoted(bytes, i),
            b'#' if starts_comment(bytes, i) => {
                let end = skip_comment(text, i);
                masked[i..end].fill(b' ');
                i = end;
            }
            _ => i += 1,
        }
    }
    // 注释区间以 ASCII 字符开头和结尾，替换后仍是合法 UTF-8
    String::from_utf8(masked).unwrap_or_else(|_| text.to_string())
}

/// 从 `open`（指向 `(`）开始找配对的 `)`
fn find_matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'#' if starts_comment(bytes, i) => {
                i = skip_comment(text, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// 按出现顺序列出文本中的所有声明块
pub fn scan_blocks(text: &str) -> Vec<DeclarationBlock<'_>> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            i = skip_quoted(bytes, i);
            continue;
        }
        if starts_comment(bytes, i) {
            i = skip_comment(text, i);
            continue;
        }
        if !(b.is_ascii_alphabetic() || b == b'_') {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && is_ident_byte(bytes[i]) {
            i += 1;
        }
        let word = &text[start..i];
        let keyword = match DECLARATION_KEYWORDS
            .iter()
            .find(|k| k.eq_ignore_ascii_case(word))
        {
            Some(k) => *k,
            None => continue,
        };

        let mut open = i;
        while open < bytes.len() && bytes[open].is_ascii_whitespace() {
            open += 1;
        }
        if bytes.get(open) != Some(&b'(') {
            continue;
        }

        match find_matching_paren(text, open) {
            Some(close) => {
                let span = start..close + 1;
                blocks.push(DeclarationBlock {
                    keyword,
                    text: &text[span.clone()],
                    body: open + 1 - start..close - start,
                    span,
                });
                i = close + 1;
            }
            None => {
                tracing::warn!("{} 在偏移 {} 处的括号不配对，已忽略", keyword, start);
                i = open + 1;
            }
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BLOCKS: &str = r#"
include(FetchContent)

FetchContent_Declare(
    foo
    GIT_REPOSITORY https://example.com/foo.git
    GIT_TAG        v1.0
    GIT_SHALLOW    ON
)

# FetchContent_Declare(commented GIT_REPOSITORY https://example.com/nope.git)
ExternalProject_Add(bar
    GIT_REPOSITORY "https://example.com/bar.git"
    GIT_TAG 0123456789abcdef
    CONFIGURE_COMMAND ${CMAKE_COMMAND} -E echo "not (balanced"
    BUILD_COMMAND ""
)
"#;

    #[test]
    fn test_scan_finds_blocks_in_order() {
        let blocks = scan_blocks(TWO_BLOCKS);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].keyword, "FetchContent_Declare");
        assert_eq!(blocks[1].keyword, "ExternalProject_Add");
        assert!(blocks[0].text().starts_with("FetchContent_Declare("));
        assert!(blocks[0].text().ends_with(')'));
        assert_eq!(&TWO_BLOCKS[blocks[1].span.clone()], blocks[1].text());
        assert!(blocks[1].text().ends_with("BUILD_COMMAND \"\"\n)"));
    }

    #[test]
    fn test_fields_and_label() {
        let blocks = scan_blocks(TWO_BLOCKS);
        let foo = &blocks[0];
        assert_eq!(foo.label().as_deref(), Some("foo"));
        assert_eq!(foo.repository_url(), Some("https://example.com/foo.git"));
        let tag = foo.field(FieldName::Tag).unwrap();
        assert_eq!(tag.value(), "v1.0");
        assert_eq!(&foo.text()[tag.range.clone()], "v1.0");
        assert_eq!(foo.field(FieldName::Shallow).unwrap().value(), "ON");

        let bar = &blocks[1];
        assert_eq!(bar.label().as_deref(), Some("bar"));
        assert_eq!(bar.repository_url(), Some("https://example.com/bar.git"));
        assert!(bar.field(FieldName::Repository).unwrap().is_quoted());
        assert!(bar.field(FieldName::Shallow).is_none());
    }

    #[test]
    fn test_adjacent_blocks_do_not_merge() {
        let text = "FetchContent_Declare(a GIT_REPOSITORY https://x/a.git)\nFetchContent_Declare(b GIT_REPOSITORY https://x/b.git GIT_TAG v1)";
        let blocks = scan_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].field(FieldName::Tag).is_none());
        assert_eq!(blocks[1].field(FieldName::Tag).unwrap().value(), "v1");
    }

    #[test]
    fn test_keyword_is_case_insensitive_and_whole_word() {
        let text = "fetchcontent_declare (x GIT_REPOSITORY u GIT_TAG t)\nmy_FetchContent_Declare(y GIT_REPOSITORY v)";
        let blocks = scan_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].keyword, "FetchContent_Declare");
        assert_eq!(blocks[0].label().as_deref(), Some("x"));
    }

    #[test]
    fn test_unbalanced_block_is_ignored() {
        let blocks = scan_blocks("FetchContent_Declare(foo GIT_REPOSITORY https://x/foo.git\n");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_bracket_comment_is_skipped() {
        let text = "#[[ FetchContent_Declare(a GIT_REPOSITORY u) ) ]]\nFetchContent_Declare(b GIT_REPOSITORY w GIT_TAG t)";
        let blocks = scan_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].label().as_deref(), Some("b"));
    }

    #[test]
    fn test_label_falls_back_to_repository_name() {
        let text = "FetchContent_Declare(\n  GIT_REPOSITORY https://example.com/group/baz.git\n  GIT_TAG v1\n)";
        let blocks = scan_blocks(text);
        assert_eq!(blocks[0].label().as_deref(), Some("baz"));
    }

    #[test]
    fn test_commented_fields_inside_block_are_ignored() {
        let text = "FetchContent_Declare(foo\n  # GIT_REPOSITORY https://mirror.internal/foo.git\n  GIT_REPOSITORY https://example.com/foo.git\n  # GIT_TAG v0.9 is broken\n  GIT_TAG v1.0 # GIT_SHALLOW OFF\n  GIT_SHALLOW ON\n)";
        let blocks = scan_blocks(text);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.repository_url(), Some("https://example.com/foo.git"));

        let tag = block.field(FieldName::Tag).unwrap();
        assert_eq!(tag.value(), "v1.0");
        assert_eq!(&block.text()[tag.range.clone()], "v1.0");
        assert!(block.text()[..tag.range.start].ends_with("\n  GIT_TAG "));

        let shallow = block.field(FieldName::Shallow).unwrap();
        assert_eq!(shallow.value(), "ON");
        assert_eq!(&block.text()[shallow.range.clone()], "ON");
    }

    #[test]
    fn test_commented_only_fields_are_missing() {
        let text = "FetchContent_Declare(foo\n  GIT_REPOSITORY https://example.com/foo.git\n  #[[ GIT_TAG v1.0\n  GIT_SHALLOW ON ]]\n)";
        let blocks = scan_blocks(text);
        assert!(blocks[0].field(FieldName::Tag).is_none());
        assert!(blocks[0].field(FieldName::Shallow).is_none());
    }

    #[test]
    fn test_hash_inside_string_is_not_a_comment() {
        let text = "FetchContent_Declare(foo\n  GIT_REPOSITORY \"https://example.com/a#b.git\"\n  GIT_TAG v1\n)";
        let blocks = scan_blocks(text);
        assert_eq!(blocks[0].repository_url(), Some("https://example.com/a#b.git"));
        assert_eq!(blocks[0].field(FieldName::Tag).unwrap().value(), "v1");
    }

    #[test]
    fn test_label_skips_leading_comment() {
        let text = "FetchContent_Declare( # vendored\n  foo\n  GIT_REPOSITORY https://x/foo.git\n)";
        let blocks = scan_blocks(text);
        assert_eq!(blocks[0].label().as_deref(), Some("foo"));
    }

    #[test]
    fn test_repository_name() {
        assert_eq!(repository_name("https://example.com/g/foo.git"), "foo");
        assert_eq!(repository_name("git@example.com:foo"), "foo");
        assert_eq!(repository_name("https://example.com/g/bar/"), "bar");
    }
}
