//! `{{binding.path}}` placeholder substitution.
//!
//! Shared entry fragments (item entries) are written against a binding, e.g.
//! `"{{item.resist}} resistance"`. The first path segment names the binding and
//! the rest is looked up on the embedding entity.

use std::sync::OnceLock;

use serde_json::Value;

use crate::entity::Entity;

static PLACEHOLDER_REGEX: OnceLock<regex_lite::Regex> = OnceLock::new();

fn placeholder_regex() -> &'static regex_lite::Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        regex_lite::Regex::new(r"\{\{([^}]+)\}\}").expect("PLACEHOLDER_REGEX pattern is invalid")
    })
}

/// Substitute every placeholder in `template` with the value at its path on `entity`.
/// Placeholders whose path does not resolve to a scalar are left intact.
pub fn apply_template(entity: &Entity, template: &str) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    placeholder_regex()
        .replace_all(template, |caps: &regex_lite::Captures<'_>| {
            let path = caps.get(1).map_or("", |m| m.as_str().trim());
            lookup(entity, path).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn lookup(entity: &Entity, path: &str) -> Option<String> {
    let mut segments = path.split('.').skip(1);
    let mut current = entity.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Apply [`apply_template`] to every string within `value`.
pub fn apply_template_deep(entity: &Entity, value: &mut Value) {
    match value {
        Value::String(s) => *s = apply_template(entity, s),
        Value::Array(items) => items
            .iter_mut()
            .for_each(|item| apply_template_deep(entity, item)),
        Value::Object(map) => map
            .values_mut()
            .for_each(|item| apply_template_deep(entity, item)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn armor() -> Entity {
        Entity::from_value(json!({
            "name": "Armor of Resistance",
            "resist": ["fire"],
            "detail": {"bonus": 1}
        }))
        .expect("object")
    }

    #[test]
    fn replaces_nested_paths() {
        assert_eq!(
            apply_template(&armor(), "You have {{item.resist.0}} resistance (+{{item.detail.bonus}})."),
            "You have fire resistance (+1)."
        );
    }

    #[test]
    fn unknown_paths_are_left_intact() {
        assert_eq!(
            apply_template(&armor(), "{{item.missing}} stays"),
            "{{item.missing}} stays"
        );
    }

    #[test]
    fn deep_application_reaches_nested_entries() {
        let mut value = json!({"type": "entries", "entries": ["{{item.name}} glows."]});
        apply_template_deep(&armor(), &mut value);
        assert_eq!(value["entries"][0], "Armor of Resistance glows.");
    }
}
