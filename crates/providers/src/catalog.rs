//! Model catalog helpers.
//!
//! Model listings arrive in several shapes depending on the daemon version
//! (`{"models": [...]}`, a bare array, entries as strings or as objects
//! carrying `name` or `model`). [`normalize_model_listing`] is the single
//! place that knows about those shapes; everything else sees `Vec<String>`.

use serde::Serialize;
use serde_json::Value;

/// Flatten any known model-listing shape into a list of model identifiers.
///
/// Entries without a usable name are skipped.
pub fn normalize_model_listing(listing: &Value) -> Vec<String> {
    let entries = match listing {
        Value::Object(map) => map.get("models").and_then(Value::as_array),
        Value::Array(entries) => Some(entries),
        _ => None,
    };

    entries
        .into_iter()
        .flatten()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name.as_str()),
            Value::Object(obj) => ["name", "model"]
                .iter()
                .filter_map(|key| obj.get(*key).and_then(Value::as_str))
                .find(|name| !name.is_empty()),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pick the summarizer model to use.
///
/// Walks `preferred` in order and returns the first installed model whose
/// name starts with that entry (so `phi3` matches `phi3:latest`). Falls back
/// to `fallback` when nothing matches.
pub fn select_summarizer(installed: &[String], preferred: &[String], fallback: &str) -> String {
    preferred
        .iter()
        .find_map(|pref| installed.iter().find(|name| name.starts_with(pref.as_str())))
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

/// Which preferred summarizers are installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummarizerStatus {
    /// Installed model names matching a preferred entry, in preference order
    pub available: Vec<String>,
    /// Preferred entries with no installed match
    pub missing: Vec<String>,
}

pub fn summarizer_status(installed: &[String], preferred: &[String]) -> SummarizerStatus {
    let mut status = SummarizerStatus::default();
    for pref in preferred {
        match installed.iter().find(|name| name.starts_with(pref.as_str())) {
            Some(name) => status.available.push(name.clone()),
            None => status.missing.push(pref.clone()),
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_tags_object() {
        let listing = json!({"models": [
            {"name": "qwen2:7b-instruct", "size": 4},
            {"model": "phi3:latest"},
            {"name": "", "model": "llama3.2:1b"},
            {"digest": "abc"}
        ]});
        assert_eq!(
            normalize_model_listing(&listing),
            names(&["qwen2:7b-instruct", "phi3:latest", "llama3.2:1b"])
        );
    }

    #[test]
    fn normalizes_bare_array_and_strings() {
        let listing = json!(["mxbai-embed-large", {"name": "qwen2.5:0.5b"}, 7]);
        assert_eq!(
            normalize_model_listing(&listing),
            names(&["mxbai-embed-large", "qwen2.5:0.5b"])
        );
    }

    #[test]
    fn unknown_shapes_are_empty() {
        assert!(normalize_model_listing(&json!({"data": []})).is_empty());
        assert!(normalize_model_listing(&json!("qwen")).is_empty());
        assert!(normalize_model_listing(&Value::Null).is_empty());
    }

    #[test]
    fn summarizer_follows_preference_order() {
        let preferred = names(&["qwen2.5:0.5b-instruct", "llama3.2:1b", "phi3"]);
        let installed = names(&["phi3:latest", "llama3.2:1b"]);
        assert_eq!(
            select_summarizer(&installed, &preferred, "qwen2.5:0.5b-instruct"),
            "llama3.2:1b"
        );
    }

    #[test]
    fn summarizer_prefix_match_returns_installed_name() {
        let preferred = names(&["phi3"]);
        let installed = names(&["phi3:latest"]);
        assert_eq!(select_summarizer(&installed, &preferred, "fallback"), "phi3:latest");
    }

    #[test]
    fn summarizer_falls_back() {
        let preferred = names(&["qwen2.5:0.5b-instruct"]);
        assert_eq!(
            select_summarizer(&names(&["mistral"]), &preferred, "qwen2.5:0.5b-instruct"),
            "qwen2.5:0.5b-instruct"
        );
        assert_eq!(select_summarizer(&[], &preferred, "x"), "x");
    }

    #[test]
    fn status_splits_available_and_missing() {
        let preferred = names(&["qwen2.5:0.5b-instruct", "llama3.2:1b", "phi3"]);
        let installed = names(&["phi3:latest", "qwen2.5:0.5b-instruct"]);
        let status = summarizer_status(&installed, &preferred);
        assert_eq!(status.available, names(&["qwen2.5:0.5b-instruct", "phi3:latest"]));
        assert_eq!(status.missing, names(&["llama3.2:1b"]));
    }
}
