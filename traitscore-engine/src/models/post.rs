//! Posts and trait lists read from input files

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use traitscore_common::{Error, Result};

/// Id used when an input record carries none
pub const UNKNOWN_POST_ID: &str = "unknown";

/// One post to score; identity is `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: String,
    pub content: String,
}

impl Post {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Input line: either `{"id", "content"}` or `{"post": {"id", "content"}}`
#[derive(Debug, Default, Deserialize)]
struct PostLine {
    #[serde(default)]
    post: Option<RawPost>,
    #[serde(flatten)]
    flat: RawPost,
}

#[derive(Debug, Default, Deserialize)]
struct RawPost {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    content: Option<String>,
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        let id = match raw.id {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => UNKNOWN_POST_ID.to_string(),
        };
        Post {
            id,
            content: raw.content.unwrap_or_default(),
        }
    }
}

impl<'de> Deserialize<'de> for Post {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let line = PostLine::deserialize(deserializer)?;
        Ok(line.post.unwrap_or(line.flat).into())
    }
}

/// Read posts from a JSON Lines file, skipping blank lines
pub fn read_posts_jsonl(path: &Path) -> Result<Vec<Post>> {
    let content = std::fs::read_to_string(path)?;
    parse_posts_jsonl(&content)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))
}

/// Parse JSON Lines text into posts
pub fn parse_posts_jsonl(content: &str) -> std::result::Result<Vec<Post>, String> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Post>(line).map_err(|e| format!("line {}: {}", idx + 1, e))
        })
        .collect()
}

/// Read a trait list: one per line, blank lines and `#` comments ignored
pub fn read_traits_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_traits(&content))
}

/// Parse trait list text
pub fn parse_traits(content: &str) -> Vec<String> {
    dedupe_traits(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string),
    )
}

/// Drop repeated traits, keeping first-seen order
pub fn dedupe_traits(traits: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    traits
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_and_nested_records() {
        let posts = parse_posts_jsonl(
            r#"{"id": "a1", "content": "hello"}

{"post": {"id": "b2", "content": "world"}, "meta": {"likes": 3}}
{"post": {"id": 42}}
{"content": "no id"}"#,
        )
        .unwrap();

        assert_eq!(
            posts,
            vec![
                Post::new("a1", "hello"),
                Post::new("b2", "world"),
                Post::new("42", ""),
                Post::new(UNKNOWN_POST_ID, "no id"),
            ]
        );
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let err = parse_posts_jsonl("{\"id\": \"a\"}\nnot json").unwrap_err();
        assert!(err.starts_with("line 2:"), "got {}", err);
    }

    #[test]
    fn test_parse_traits_skips_comments_and_duplicates() {
        let traits = parse_traits("# traits\nhumor\n\n  sarcasm \nhumor\nanger\n");
        assert_eq!(traits, vec!["humor", "sarcasm", "anger"]);
    }
}
