use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
            .expect("fence regex is valid")
    })
}

/// Return the body of the first markdown code fence in `s`, or `s` unchanged.
pub fn strip_code_fence(s: &str) -> &str {
    match fence_regex().captures(s).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => s,
    }
}

/// Shallow-merge JSON object outputs in order; later keys win.
///
/// Outputs that are empty, fail to parse, or are not objects are skipped.
/// The merged object is pretty-printed with two-space indentation.
pub fn merge_json_outputs<'a, I>(outputs: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = Map::new();

    for (pos, output) in outputs.into_iter().enumerate() {
        let body = strip_code_fence(output).trim();
        if body.is_empty() {
            tracing::debug!(dependency = pos, "skipping empty output in structured merge");
            continue;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(obj)) => {
                for (k, v) in obj {
                    merged.insert(k, v);
                }
            }
            Ok(other) => {
                tracing::warn!(
                    dependency = pos,
                    kind = json_kind(&other),
                    "skipping non-object output in structured merge"
                );
            }
            Err(e) => {
                tracing::warn!(dependency = pos, "failed to parse phase output: {}", e);
            }
        }
    }

    serde_json::to_string_pretty(&Value::Object(merged)).unwrap_or_else(|_| "{}".to_string())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
