//! 按字符（而非字节）截断文本的工具函数

use std::sync::LazyLock;

use regex::Regex;

static URL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>()\[\]{},]+"#).ok());

/// 截取前 `max_chars` 个字符
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// 截取前 `max_chars` 个字符，发生截断时追加 `...`
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let head = truncate_chars(text, max_chars);
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head.to_string()
    }
}

/// 保留末尾 `max_chars` 个字符
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    match text.char_indices().nth(total - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// 提取文本中出现的 http(s) 链接，保持出现顺序
pub fn extract_urls(text: &str) -> Vec<String> {
    let Some(pattern) = URL_PATTERN.as_ref() else {
        return Vec::new();
    };
    pattern
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ';', ':']).to_string())
        .collect()
}

/// 去重并保持首次出现的顺序
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("研究报告", 2), "研究");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 2), "ef");
        assert_eq!(tail_chars("公司概况", 2), "概况");
        assert_eq!(tail_chars("ab", 5), "ab");
    }

    #[test]
    fn test_extract_urls_from_tool_output() {
        let output = r#"[{"title": "Tesla", "href": "https://www.tesla.com/about"}, see http://ir.tesla.com.]"#;
        assert_eq!(
            extract_urls(output),
            vec!["https://www.tesla.com/about", "http://ir.tesla.com"]
        );
    }

    #[test]
    fn test_dedup_preserving_order() {
        let items = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_preserving_order(items), vec!["b", "a"]);
    }
}
