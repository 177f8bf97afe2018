//! Final sweep over the structured result: residual empty-checkbox
//! sentinels become "N/A".

use serde_json::Value;

use crate::models::NOT_AVAILABLE;

fn is_empty_marker(s: &str) -> bool {
    matches!(s.trim(), "[ ]" | "[]" | "<td>[ ]</td>")
}

/// Replace every sentinel string in `value`, recursing through objects and
/// arrays. Returns the number of replacements.
pub fn sweep_empty_markers(value: &mut Value) -> usize {
    match value {
        Value::String(s) if is_empty_marker(s) => {
            *s = NOT_AVAILABLE.to_string();
            1
        }
        Value::Array(items) => items.iter_mut().map(sweep_empty_markers).sum(),
        Value::Object(map) => map.values_mut().map(sweep_empty_markers).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_nested_sentinels() {
        let mut value = json!({
            "a": "[ ]",
            "b": { "c": ["[]", "kept", { "d": "<td>[ ]</td>" }] },
            "e": 3,
            "f": "Normal"
        });
        assert_eq!(sweep_empty_markers(&mut value), 3);
        assert_eq!(value["a"], "N/A");
        assert_eq!(value["b"]["c"][0], "N/A");
        assert_eq!(value["b"]["c"][1], "kept");
        assert_eq!(value["b"]["c"][2]["d"], "N/A");
        assert_eq!(value["f"], "Normal");
    }

    #[test]
    fn text_containing_an_empty_cell_is_kept() {
        let markdown = "<table><tr><td>Bloods</td><td>[ ]</td></tr></table>";
        let mut value = json!({ "raw_content": markdown, "note": "[ ] pending" });
        assert_eq!(sweep_empty_markers(&mut value), 0);
        assert_eq!(value["raw_content"], markdown);
        assert_eq!(value["note"], "[ ] pending");
    }

    #[test]
    fn clean_value_is_untouched() {
        let mut value = json!({ "hearing_results": "Normal", "done": true });
        let before = value.clone();
        assert_eq!(sweep_empty_markers(&mut value), 0);
        assert_eq!(value, before);
    }
}
