//! `_meta` helpers and pagination cursors.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// `_meta` key linking a payload to the task that produced it.
pub const RELATED_TASK_META_KEY: &str = "io.modelcontextprotocol/related-task";

/// Free-form `_meta` map carried by params and results.
pub type Meta = HashMap<String, Value>;

/// Opaque pagination cursor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn new(cursor: impl Into<String>) -> Self {
        Self(cursor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Insert the related-task marker into a result object's `_meta`, creating
/// `_meta` when absent. Non-object results are left untouched.
pub fn inject_related_task(result: &mut Value, task_id: &str) {
    let Some(obj) = result.as_object_mut() else {
        return;
    };
    let meta = obj
        .entry("_meta")
        .or_insert_with(|| Value::Object(Default::default()));
    if let Some(meta) = meta.as_object_mut() {
        meta.insert(
            RELATED_TASK_META_KEY.to_string(),
            json!({ "taskId": task_id }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_is_transparent() {
        let cursor = Cursor::new("task-9");
        assert_eq!(serde_json::to_value(&cursor).unwrap(), json!("task-9"));
    }

    #[test]
    fn test_inject_related_task_preserves_existing_meta() {
        let mut result = json!({
            "content": [],
            "_meta": {"trace": "abc"}
        });
        inject_related_task(&mut result, "t-1");

        assert_eq!(result["_meta"]["trace"], "abc");
        assert_eq!(result["_meta"][RELATED_TASK_META_KEY]["taskId"], "t-1");
    }

    #[test]
    fn test_inject_related_task_creates_meta() {
        let mut result = json!({"content": []});
        inject_related_task(&mut result, "t-2");
        assert_eq!(result["_meta"][RELATED_TASK_META_KEY]["taskId"], "t-2");
    }
}
