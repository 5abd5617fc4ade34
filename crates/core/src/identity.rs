//! Canonical JSON serialization and contract identity.
//!
//! A ctxpack URI is `ctx://sha256:<hex>`, the SHA-256 of a contract's
//! canonical JSON form once `outputs` has been stripped and every
//! `inputs[].path` has been replaced by its computed `digest`. Canonical
//! here means: object keys sorted at every nesting level, no insignificant
//! whitespace, and non-ASCII characters escaped as `\uXXXX` — matching the
//! output of Python's `json.dumps(..., sort_keys=True)` with its default
//! `ensure_ascii=True`, which is what the original reference hashed.

use crate::digest::digest_dir;
use crate::errors::{CtxPackError, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Serialize a JSON value into canonical form: keys sorted recursively,
/// compact, ASCII-only.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_ascii() => out.push(c),
            c => {
                let cp = c as u32;
                if cp <= 0xFFFF {
                    out.push_str(&format!("\\u{:04x}", cp));
                } else {
                    let cp = cp - 0x10000;
                    let high = 0xD800 + (cp >> 10);
                    let low = 0xDC00 + (cp & 0x3FF);
                    out.push_str(&format!("\\u{:04x}\\u{:04x}", high, low));
                }
            }
        }
    }
    out.push('"');
}

/// Strip `outputs` and replace every `inputs[].path` with a computed
/// `digest`, turning a contract that references the filesystem into one
/// whose identity depends only on file content.
fn resolve_inputs(contract: &Value) -> Result<Value> {
    let mut contract = contract.clone();
    let Some(obj) = contract.as_object_mut() else {
        return Err(CtxPackError::other("contract must be a JSON object"));
    };

    obj.remove("outputs");

    if let Some(Value::Array(inputs)) = obj.get_mut("inputs") {
        for input in inputs.iter_mut() {
            let Some(input_obj) = input.as_object_mut() else {
                continue;
            };
            if let Some(path_value) = input_obj.remove("path") {
                let path_str = path_value.as_str().ok_or_else(|| {
                    CtxPackError::other("inputs[].path must be a string")
                })?;
                let digest = digest_dir(Path::new(path_str))?;
                input_obj.insert("digest".to_string(), Value::String(digest));
            }
        }
    }

    Ok(contract)
}

/// Compute the `ctx://sha256:<hex>` identity of a contract.
pub fn get_uri(contract: &Value) -> Result<String> {
    let resolved = resolve_inputs(contract)?;
    let canonical = canonical_json(&resolved);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("ctx://sha256:{:x}", hasher.finalize()))
}

/// Extract the bare `sha256:<hex>` portion of a `ctx://` URI.
pub fn digest_from_uri(uri: &str) -> Result<&str> {
    uri.strip_prefix("ctx://")
        .ok_or_else(|| CtxPackError::other(format!("not a ctx:// uri: {uri}")))
}

/// Extract the bare hex digest (no `sha256:` prefix) from a `ctx://` URI,
/// suitable for use as a cache directory name.
pub fn hex_from_uri(uri: &str) -> Result<&str> {
    digest_from_uri(uri)?
        .strip_prefix("sha256:")
        .ok_or_else(|| CtxPackError::other(format!("unsupported digest algorithm in {uri}")))
}

/// The first 12 hex characters of a URI's digest, used as the registry
/// tag — short enough to type, long enough that collisions aren't a
/// practical concern for a single repo.
pub fn short_id_from_uri(uri: &str) -> Result<&str> {
    let hex = hex_from_uri(uri)?;
    hex.get(..12).ok_or_else(|| {
        CtxPackError::other(format!("digest too short to derive a short id: {uri}"))
    })
}

/// Build an empty skeleton JSON object used by callers constructing a
/// fresh contract map before filling it in.
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        assert_eq!(canonical_json(&value), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn canonical_json_escapes_non_ascii() {
        let value = json!({"name": "café"});
        assert_eq!(canonical_json(&value), r#"{"name":"caf\u00e9"}"#);
    }

    #[test]
    fn canonical_json_has_no_insignificant_whitespace() {
        let value = json!({"a": [1, 2, 3]});
        assert_eq!(canonical_json(&value), r#"{"a":[1,2,3]}"#);
    }

    #[test]
    fn get_uri_is_deterministic_under_key_reordering() {
        let a = json!({"transforms": [{"tool": "x"}], "params": {"n": 1}});
        let b = json!({"params": {"n": 1}, "transforms": [{"tool": "x"}]});
        assert_eq!(get_uri(&a).unwrap(), get_uri(&b).unwrap());
    }

    #[test]
    fn get_uri_strips_outputs() {
        let with_outputs = json!({"transforms": [], "outputs": {"path": "/tmp/whatever"}});
        let without_outputs = json!({"transforms": []});
        assert_eq!(
            get_uri(&with_outputs).unwrap(),
            get_uri(&without_outputs).unwrap()
        );
    }

    #[test]
    fn get_uri_is_sensitive_to_input_content() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "v1").unwrap();
        let contract = json!({
            "inputs": [{"path": dir.path().to_string_lossy()}],
            "transforms": [{"tool": "t", "version": "1"}]
        });
        let uri1 = get_uri(&contract).unwrap();

        std::fs::write(dir.path().join("data.txt"), "v2").unwrap();
        let uri2 = get_uri(&contract).unwrap();

        assert_ne!(uri1, uri2);
    }

    #[test]
    fn hex_from_uri_extracts_hash() {
        let uri = "ctx://sha256:deadbeef";
        assert_eq!(hex_from_uri(uri).unwrap(), "deadbeef");
    }

    #[test]
    fn short_id_from_uri_takes_first_twelve_hex_chars() {
        let uri = "ctx://sha256:0123456789abcdefdeadbeef";
        assert_eq!(short_id_from_uri(uri).unwrap(), "0123456789ab");
    }
}
