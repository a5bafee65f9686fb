//! Canonical encoding of revision properties
//!
//! The digest in a `RevisionId` is only meaningful across replicas if every
//! replica encodes the same properties to the same bytes. The encoding itself
//! is pluggable; the core only relies on determinism.

use serde_json::{Map, Value};

/// Document body at a revision: an opaque JSON object.
pub type Properties = Map<String, Value>;

/// Metadata keys that never contribute to a revision digest.
pub const RESERVED_KEYS: &[&str] = &["_id", "_rev", "_revisions", "_local_seq", "_deleted"];

/// Produces the deterministic byte encoding fed into revision digests.
pub trait Canonicalizer: Send + Sync {
    /// Encode `properties`. Equal property maps must yield equal bytes.
    fn canonicalize(&self, properties: &Properties) -> Vec<u8>;
}

/// Compact JSON with object keys in sorted order and reserved keys removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalJson;

impl Canonicalizer for CanonicalJson {
    fn canonicalize(&self, properties: &Properties) -> Vec<u8> {
        let body: Map<String, Value> = properties
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut out = Vec::with_capacity(64);
        write_value(&mut out, &Value::Object(body));
        out
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, &Value::String(key.clone()));
                out.push(b':');
                write_value(out, item);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        scalar => {
            // Scalars have exactly one compact serde_json rendering.
            if let Ok(bytes) = serde_json::to_vec(scalar) {
                out.extend_from_slice(&bytes);
            }
        }
    }
}
