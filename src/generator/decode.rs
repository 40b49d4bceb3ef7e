//! 从模型输出中解析结构化决策
//!
//! 模型常把JSON包在 ```json 代码块中或前后附带说明文字，这里统一剥离后再反序列化。

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// 解析结果；解析失败时 `diagnostic` 记录原因，`value` 为回退值
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub diagnostic: Option<String>,
}

impl<T> Decoded<T> {
    pub fn is_fallback(&self) -> bool {
        self.diagnostic.is_some()
    }
}

/// 去掉首尾的 markdown 代码围栏
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 跳过语言标记所在行
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// 截取第一个JSON对象或数组的完整片段
pub fn json_slice(raw: &str) -> Option<&str> {
    let text = strip_code_fences(raw);
    let start = text.find(['{', '['])?;
    let open = text[start..].chars().next()?;
    let close = if open == '{' { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end >= start).then(|| &text[start..=end])
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let slice = json_slice(raw).ok_or_else(|| "no JSON payload in model output".to_string())?;
    serde_json::from_str(slice).map_err(|e| e.to_string())
}

/// 解析失败时使用回退值，并保留诊断信息
pub fn decode_or_else<T, F>(raw: &str, fallback: F) -> Decoded<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match decode(raw) {
        Ok(value) => Decoded {
            value,
            diagnostic: None,
        },
        Err(e) => Decoded {
            value: fallback(),
            diagnostic: Some(e),
        },
    }
}

/// 渲染用于提示词的JSON Schema
pub fn schema_hint<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Verdict {
        status: String,
    }

    #[test]
    fn test_strip_fenced_json() {
        let raw = "```json\n{\"status\": \"CLEAR\"}\n```";
        assert_eq!(strip_code_fences(raw), "{\"status\": \"CLEAR\"}");
    }

    #[test]
    fn test_decode_with_surrounding_prose() {
        let raw = "Here is my verdict:\n{\"status\": \"CONFLICT\"} Hope this helps.";
        let verdict: Verdict = decode(raw).unwrap();
        assert_eq!(verdict.status, "CONFLICT");
    }

    #[test]
    fn test_decode_array() {
        let plan: Vec<String> = decode("```\n[\"a\", \"b\"]\n```").unwrap();
        assert_eq!(plan, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_or_else_records_diagnostic() {
        let decoded = decode_or_else::<Verdict, _>("not json at all", || Verdict {
            status: "CLEAR".to_string(),
        });
        assert!(decoded.is_fallback());
        assert_eq!(decoded.value.status, "CLEAR");
    }

    #[test]
    fn test_schema_hint_mentions_fields() {
        assert!(schema_hint::<Verdict>().contains("status"));
    }
}
