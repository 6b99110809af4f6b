//! Canonical JSON serialization and SHA-256 based fingerprinting
//! (spec.md §4.7).
//!
//! `canonical_json` sorts object keys lexicographically at every nesting
//! level and uses a fixed numeric representation, so that two JSON values
//! that differ only in key order or number formatting serialize
//! identically. `inputs_hash`/`fingerprint` take the first 16 hex
//! characters of the SHA-256 digest of that canonical form.

use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Length, in hex characters, of a fingerprint (spec.md §3: "sha256
/// prefix, 16 hex chars").
pub const FINGERPRINT_LEN: usize = 16;

/// Serialize `value` into a canonical JSON string: object keys sorted
/// lexicographically at every level, integers rendered without a decimal
/// point, floats rendered with at least one digit after the point.
#[must_use]
pub fn canonical_json(value: &Json) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Json, out: &mut String) {
    match value {
        Json::Null => out.push_str("null"),
        Json::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Json::Number(n) => write_number(n, out),
        Json::String(s) => write_escaped_string(s, out),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Json::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped_string(k, out);
                out.push(':');
                write_canonical(&map[*k], out);
            }
            out.push('}');
        }
    }
}

fn write_number(n: &serde_json::Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    } else {
        let f = n.as_f64().unwrap_or(0.0);
        if f.fract() == 0.0 && f.is_finite() {
            let _ = write!(out, "{f:.1}");
        } else {
            let _ = write!(out, "{f}");
        }
    }
}

fn write_escaped_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// SHA-256 hex digest of an arbitrary byte slice.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// First [`FINGERPRINT_LEN`] hex characters of the SHA-256 digest of
/// `canonical_json(value)` (spec.md §4.7).
#[must_use]
pub fn fingerprint(value: &Json) -> String {
    let full = sha256_hex(canonical_json(value).as_bytes());
    full[..FINGERPRINT_LEN].to_string()
}

/// Alias for [`fingerprint`] matching the spec.md §3 field name
/// `inputs_hash`.
#[must_use]
pub fn inputs_hash(value: &Json) -> String {
    fingerprint(value)
}

/// Combine two fingerprints into a single cache key (spec.md §4.9:
/// "fingerprint(context) ⨁ fingerprint(sorted_policy_id_subset)").
#[must_use]
pub fn combine_fingerprints(a: &str, b: &str) -> String {
    format!("{a}:{b}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn nested_key_order_does_not_change_hash() {
        let a = json!({"outer": {"z": 1, "a": [1, 2, {"y": 1, "x": 2}]}});
        let b = json!({"outer": {"a": [1, 2, {"x": 2, "y": 1}], "z": 1}});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let f = fingerprint(&json!({"x": 1}));
        assert_eq!(f.len(), FINGERPRINT_LEN);
        assert!(f.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_values_differ() {
        assert_ne!(fingerprint(&json!({"x": 1})), fingerprint(&json!({"x": 2})));
    }

    #[test]
    fn canonical_json_is_idempotent() {
        let v = json!({"z": 1.0, "a": [3, 2, 1], "m": {"q": "t"}});
        let once = canonical_json(&v);
        let reparsed: Json = serde_json::from_str(&once).unwrap();
        let twice = canonical_json(&reparsed);
        assert_eq!(once, twice);
    }

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(canonical_json(&json!(2.0)), "2.0");
        assert_eq!(canonical_json(&json!(2.5)), "2.5");
    }
}
