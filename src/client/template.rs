//! Notification payload templates.
//!
//! A template is any JSON document. Within string values the placeholders
//! `{{openSequence}}` and `{{closeSequence}}` are replaced with the
//! comma-joined knock paths, e.g. `"/foo,/bar,/baz"`.

use crate::KnockGateError;
use serde_json::Value;

/// Placeholder for the new open sequence.
pub const OPEN_PLACEHOLDER: &str = "{{openSequence}}";

/// Placeholder for the new close sequence.
pub const CLOSE_PLACEHOLDER: &str = "{{closeSequence}}";

/// A parsed payload template.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadTemplate {
    root: Value,
}

impl PayloadTemplate {
    /// Parse a JSON template.
    pub fn parse(text: &str) -> Result<Self, KnockGateError> {
        let root = serde_json::from_str(text)
            .map_err(|e| KnockGateError::TemplateError(format!("Invalid payload template: {}", e)))?;
        Ok(Self { root })
    }

    /// Fill in the sequences.
    pub fn render(&self, open: &[String], close: &[String]) -> Value {
        let open = open.join(",");
        let close = close.join(",");
        let mut payload = self.root.clone();
        fill(&mut payload, &open, &close);
        payload
    }
}

fn fill(value: &mut Value, open: &str, close: &str) {
    match value {
        Value::String(s) => {
            if s.contains(OPEN_PLACEHOLDER) || s.contains(CLOSE_PLACEHOLDER) {
                *s = s
                    .replace(OPEN_PLACEHOLDER, open)
                    .replace(CLOSE_PLACEHOLDER, close);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| fill(item, open, close)),
        Value::Object(map) => map.values_mut().for_each(|item| fill(item, open, close)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_interpolates_strings() {
        let template = PayloadTemplate::parse(
            r#"{"text": "open: {{openSequence}} / close: {{closeSequence}}"}"#,
        )
        .unwrap();
        let payload = template.render(&seq(&["/a", "/b"]), &seq(&["/b", "/a"]));
        assert_eq!(payload, json!({"text": "open: /a,/b / close: /b,/a"}));
    }

    #[test]
    fn test_render_whole_value_placeholder() {
        let template =
            PayloadTemplate::parse(r#"{"open": "{{openSequence}}", "n": 3}"#).unwrap();
        let payload = template.render(&seq(&["/x", "/y", "/z"]), &seq(&["/z", "/y", "/x"]));
        assert_eq!(payload, json!({"open": "/x,/y,/z", "n": 3}));
    }

    #[test]
    fn test_render_nested() {
        let template = PayloadTemplate::parse(
            r#"{"blocks": [{"fields": ["{{closeSequence}}", true, null]}]}"#,
        )
        .unwrap();
        let payload = template.render(&seq(&["/1"]), &seq(&["/2"]));
        assert_eq!(payload, json!({"blocks": [{"fields": ["/2", true, null]}]}));
    }

    #[test]
    fn test_render_leaves_template_untouched() {
        let template = PayloadTemplate::parse(r#"["{{openSequence}}"]"#).unwrap();
        template.render(&seq(&["/1"]), &seq(&["/1"]));
        assert_eq!(
            template.render(&seq(&["/2"]), &seq(&["/2"])),
            json!(["/2"])
        );
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            PayloadTemplate::parse("{oops"),
            Err(KnockGateError::TemplateError(_))
        ));
    }
}
