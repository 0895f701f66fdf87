//! Semantic fingerprinting of settings trees.
//!
//! Two trees that describe the same job produce the same fingerprint, no
//! matter how their mappings are ordered, whether scalars were quoted, or
//! what their cosmetic fields say. Files referenced through a `file` key are
//! identified by their content rather than their path.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::domain::error::HashError;
use crate::domain::models::{Fingerprint, SettingsTree};

/// Keys that never affect a job's outcome.
pub const COSMETIC_KEYS: [&str; 5] = ["author", "url", "comment", "description", "license"];

/// Key whose value names a file to hash by content.
pub const FILE_KEY: &str = "file";

/// Computes canonical fingerprints of settings trees.
#[derive(Debug, Clone)]
pub struct SemanticHasher {
    base_dir: PathBuf,
}

impl Default for SemanticHasher {
    fn default() -> Self {
        Self::new(".")
    }
}

impl SemanticHasher {
    /// Relative `file` references resolve against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Fingerprint of `tree`.
    pub fn fingerprint(&self, tree: &SettingsTree) -> Result<Fingerprint, HashError> {
        let canonical = self.canonical_text(tree)?;
        Ok(Fingerprint::from_hex(truncated_digest(canonical.as_bytes())))
    }

    /// The canonical text the fingerprint is computed over.
    pub fn canonical_text(&self, tree: &SettingsTree) -> Result<String, HashError> {
        let mut out = String::new();
        self.write_canonical(tree.as_value(), "", &mut out)?;
        Ok(out)
    }

    fn write_canonical(&self, value: &Value, key_path: &str, out: &mut String) -> Result<(), HashError> {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map
                    .iter()
                    .filter(|(k, _)| !COSMETIC_KEYS.contains(&k.as_str()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                out.push('{');
                for (key, child) in entries {
                    let child_path = if key_path.is_empty() {
                        key.clone()
                    } else {
                        format!("{key_path}.{key}")
                    };
                    push_quoted(key, out);
                    out.push(':');
                    if key == FILE_KEY {
                        let digest = self.file_digest(child, &child_path)?;
                        push_quoted(&digest, out);
                    } else {
                        self.write_canonical(child, &child_path, out)?;
                    }
                    out.push(',');
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    self.write_canonical(item, &format!("{key_path}[{i}]"), out)?;
                    out.push(',');
                }
                out.push(']');
            }
            Value::String(s) => push_quoted(s, out),
            scalar => push_quoted(&scalar.to_string(), out),
        }
        Ok(())
    }

    fn file_digest(&self, value: &Value, key_path: &str) -> Result<String, HashError> {
        let Value::String(reference) = value else {
            return Err(HashError::InvalidFileReference {
                key_path: key_path.to_string(),
            });
        };

        let path = self.base_dir.join(reference);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(truncated_digest(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(HashError::FileNotFound { path })
            }
            Err(source) => Err(HashError::FileRead { path, source }),
        }
    }
}

fn truncated_digest(bytes: &[u8]) -> String {
    let mut hex = hex::encode(Sha256::digest(bytes));
    hex.truncate(Fingerprint::LEN);
    hex
}

fn push_quoted(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hash(value: Value) -> Fingerprint {
        SemanticHasher::default()
            .fingerprint(&SettingsTree::new(value))
            .expect("hashing should succeed")
    }

    #[test]
    fn test_fingerprint_shape() {
        let fp = hash(json!({"a": 1}));
        assert_eq!(fp.as_str().len(), Fingerprint::LEN);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_scalars_are_stringified() {
        assert_eq!(hash(json!({"n": 1})), hash(json!({"n": "1"})));
        assert_eq!(hash(json!({"b": true})), hash(json!({"b": "true"})));
        assert_ne!(hash(json!({"n": 1})), hash(json!({"n": 2})));
    }

    #[test]
    fn test_sequence_order_matters() {
        assert_ne!(hash(json!({"l": [1, 2]})), hash(json!({"l": [2, 1]})));
    }

    #[test]
    fn test_structure_is_not_flattened() {
        assert_ne!(hash(json!({"a": ["b"]})), hash(json!({"a": "b"})));
        assert_ne!(hash(json!({"a": {"b": "c"}})), hash(json!({"a.b": "c"})));
    }

    #[test]
    fn test_non_string_file_reference_is_rejected() {
        let err = SemanticHasher::default()
            .fingerprint(&SettingsTree::new(json!({"rtl": {"sources": [{"file": 42}]}})))
            .unwrap_err();
        match err {
            HashError::InvalidFileReference { key_path } => {
                assert_eq!(key_path, "rtl.sources[0].file");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
