//! Reference markers embedded in entry trees.
//!
//! Two shapes exist:
//! - typed objects, `{"type": "refClassFeature", "classFeature": "<uid>", "name"?: "..."}`
//! - string tokens, `{#refWidget Spring|PHB}`, possibly surrounded by other text

use std::ops::Range;
use std::sync::OnceLock;

use serde_json::Value;

static REF_TOKEN_REGEX: OnceLock<regex_lite::Regex> = OnceLock::new();

fn ref_token_regex() -> &'static regex_lite::Regex {
    REF_TOKEN_REGEX.get_or_init(|| {
        regex_lite::Regex::new(r"\{#(\w+)\s+([^}]*)\}")
            .expect("REF_TOKEN_REGEX pattern is invalid")
    })
}

/// A `{#tag text}` token found inside a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    pub tag: String,
    pub text: String,
    /// Byte range of the whole token in the scanned string.
    pub range: Range<usize>,
}

/// Find every `{#tag text}` token in `s`, left to right.
pub fn find_ref_tokens(s: &str) -> Vec<TagToken> {
    if !s.contains("{#") {
        return Vec::new();
    }
    ref_token_regex()
        .captures_iter(s)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(TagToken {
                tag: caps.get(1)?.as_str().to_string(),
                text: caps.get(2)?.as_str().trim().to_string(),
                range: whole.range(),
            })
        })
        .collect()
}

/// The `type` of an object marker, if `value` is an object with one.
pub fn object_type(value: &Value) -> Option<&str> {
    value.as_object()?.get("type")?.as_str()
}

/// A typed object marker, read through the uid field of its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefObject {
    pub kind: String,
    pub uid: String,
    /// Display-name override for the substituted entity.
    pub name: Option<String>,
}

impl RefObject {
    pub fn parse(value: &Value, uid_field: &str) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            kind: obj.get("type")?.as_str()?.to_string(),
            uid: obj.get(uid_field)?.as_str()?.to_string(),
            name: obj.get("name").and_then(Value::as_str).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_embedded_token() {
        let tokens = find_ref_tokens("See {#refWidget Spring|PHB} for details");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].tag, "refWidget");
        assert_eq!(tokens[0].text, "Spring|PHB");
        assert_eq!(tokens[0].range, 4..27);
    }

    #[test]
    fn finds_multiple_tokens_in_order() {
        let tokens = find_ref_tokens("{#refA x} and {#refB y|XGE}");
        let tags: Vec<_> = tokens.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(tags, vec!["refA", "refB"]);
    }

    #[test]
    fn plain_text_has_no_tokens() {
        assert!(find_ref_tokens("A coil.").is_empty());
        assert!(find_ref_tokens("{@spell fireball}").is_empty());
    }

    #[test]
    fn parses_object_marker() {
        let marker = json!({"type": "refOptionalfeature", "optionalfeature": "Agonizing Blast", "name": "Blast"});
        let parsed = RefObject::parse(&marker, "optionalfeature").expect("marker");
        assert_eq!(parsed.kind, "refOptionalfeature");
        assert_eq!(parsed.uid, "Agonizing Blast");
        assert_eq!(parsed.name.as_deref(), Some("Blast"));
        assert_eq!(object_type(&marker), Some("refOptionalfeature"));
    }

    #[test]
    fn object_without_uid_field_is_not_a_marker() {
        assert!(RefObject::parse(&json!({"type": "refItemEntry"}), "itemEntry").is_none());
    }
}
