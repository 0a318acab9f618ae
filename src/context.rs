use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::Debug;
use tracing::warn;

use crate::encode::{encode, Origin};

/// Identity of one logical unit of work. Every record produced inside a
/// scope carries a copy of this.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskContext {
    pub task_name: String,
    pub metadata: Map<String, Value>,
    pub template: Option<String>,
}

impl TaskContext {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            metadata: Map::new(),
            template: None,
        }
    }

    /// Adds one metadata entry. Values that don't encode as JSON are kept in
    /// their debug form, with a warning.
    pub fn with_metadata<V>(mut self, key: impl Into<String>, value: V) -> Self
    where
        V: Serialize + Debug,
    {
        self.metadata.insert(key.into(), encode(&value, Origin::Caller));
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Warns when the template's placeholders and the metadata keys disagree.
    /// Returns whether they matched; never fails.
    pub fn check_template(&self) -> bool {
        let Some(template) = &self.template else {
            return true;
        };

        let placeholders = placeholders(template);
        let keys: BTreeSet<&str> = self.metadata.keys().map(String::as_str).collect();

        let missing: Vec<&str> =
            placeholders.iter().copied().filter(|p| !keys.contains(p)).collect();
        let unused: Vec<&str> =
            keys.iter().copied().filter(|k| !placeholders.contains(k)).collect();

        if missing.is_empty() && unused.is_empty() {
            return true;
        }

        warn!(
            "Template for task '{}' does not match its metadata (missing: {:?}, unused: {:?})",
            self.task_name, missing, unused
        );
        false
    }
}

/// Extracts `{name}` fields. `{{` and `}}` are literal braces; format specs
/// after `:` or `!` are ignored.
pub fn placeholders(template: &str) -> BTreeSet<&str> {
    let mut found = BTreeSet::new();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => i += 2,
            b'}' if bytes.get(i + 1) == Some(&b'}') => i += 2,
            b'{' => {
                let start = i + 1;
                let Some(len) = template[start..].find('}') else {
                    break;
                };
                let field = &template[start..start + len];
                let name = field.split([':', '!']).next().unwrap_or("").trim();
                if !name.is_empty() {
                    found.insert(name);
                }
                i = start + len + 1;
            }
            _ => i += 1,
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_keeps_insertion_order() {
        let ctx = TaskContext::new("t1")
            .with_metadata("zeta", 1)
            .with_metadata("alpha", "two")
            .with_metadata("mid", vec![3, 4]);

        let keys: Vec<&String> = ctx.metadata.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(ctx.metadata["mid"], json!([3, 4]));
    }

    #[test]
    fn test_placeholder_extraction() {
        let found = placeholders("Classify {text} as {label:>10} {{literal}} {}");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["label", "text"]);
    }

    #[test]
    fn test_template_cross_check() {
        let matching = TaskContext::new("sentiment")
            .with_metadata("text", "I love it")
            .with_template("Classify: {text}");
        assert!(matching.check_template());

        let mismatched = TaskContext::new("sentiment")
            .with_metadata("body", "I love it")
            .with_template("Classify: {text}");
        assert!(!mismatched.check_template(), "Mismatch should be reported, not raised");

        assert!(TaskContext::new("no-template").check_template());
    }
}
