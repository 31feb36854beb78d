//! Deduplication keys for records.
//!
//! A record's key is a hex digest over the concatenation, in this order, of
//! `repository.updated_at`, `issue.updated_at` and `comment.updated_at`. A
//! missing section or field contributes the literal `"0"`. Records with the
//! same three timestamps share a key, which is what makes store upserts
//! idempotent across repeated walks and replayed webhook events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::record::{Attributes, Record};

/// Placeholder contributed by an absent timestamp.
pub const ABSENT_TIMESTAMP: &str = "0";

/// Hash algorithm used to derive record keys.
///
/// Changing the algorithm of an existing store re-keys every record, so a
/// deployment should pick one and keep it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// 160-bit SHA-1, compatible with stores written by earlier gitdump releases.
    #[default]
    Sha1,
    /// 256-bit SHA-2.
    Sha256,
}

impl KeyAlgorithm {
    /// Lowercase hex digest of `input`.
    pub fn hex_digest(self, input: &[u8]) -> String {
        match self {
            Self::Sha1 => format!("{:x}", Sha1::digest(input)),
            Self::Sha256 => format!("{:x}", Sha256::digest(input)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unknown key algorithm: {other}")),
        }
    }
}

/// A record's deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Derive a key from the three sections that participate in it.
    pub fn derive(
        algorithm: KeyAlgorithm,
        repository: Option<&Attributes>,
        issue: Option<&Attributes>,
        comment: Option<&Attributes>,
    ) -> Self {
        let material = format!(
            "{}{}{}",
            updated_at_component(repository),
            updated_at_component(issue),
            updated_at_component(comment)
        );
        Self(algorithm.hex_digest(material.as_bytes()))
    }

    /// Derive the key for an existing record from its content.
    ///
    /// The stored `id` is not consulted, so this also serves to verify one.
    pub fn for_record(record: &Record, algorithm: KeyAlgorithm) -> Self {
        Self::derive(
            algorithm,
            record.repository(),
            record.issue(),
            record.comment(),
        )
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Text a section's `updated_at` contributes to the key material.
fn updated_at_component(section: Option<&Attributes>) -> String {
    match section.and_then(|s| s.get("updated_at")) {
        None | Some(Value::Null) => ABSENT_TIMESTAMP.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("test attributes must be an object"),
        }
    }

    #[test]
    fn test_sha1_matches_known_vectors() {
        let ts = attrs(json!({"updated_at": "21-04-14"}));

        let full = RecordKey::derive(KeyAlgorithm::Sha1, Some(&ts), Some(&ts), Some(&ts));
        assert_eq!(full.as_str(), "1c4882d4c922bcfdc070de97de03706c9276f8eb");

        let empty = Attributes::new();
        let repo_only = RecordKey::derive(
            KeyAlgorithm::Sha1,
            Some(&ts),
            Some(&empty),
            Some(&empty),
        );
        assert_eq!(repo_only.as_str(), "8acfc9c43a5c9f64ee2070007591811f4048c907");

        let nothing = RecordKey::derive(KeyAlgorithm::Sha1, None, None, None);
        assert_eq!(nothing.as_str(), "8aefb06c426e07a0a671a1e2488b4858d694a730");
    }

    #[test]
    fn test_missing_section_and_missing_field_are_equivalent() {
        let without_field = attrs(json!({"id": 7}));
        let null_field = attrs(json!({"updated_at": null}));

        let a = RecordKey::derive(KeyAlgorithm::Sha1, None, None, None);
        let b = RecordKey::derive(
            KeyAlgorithm::Sha1,
            Some(&without_field),
            Some(&null_field),
            None,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_timestamps_collide_regardless_of_other_fields() {
        let repo_a = attrs(json!({"id": 1, "updated_at": "2020-01-01T00:00:00Z"}));
        let repo_b = attrs(json!({"id": 2, "name": "other", "updated_at": "2020-01-01T00:00:00Z"}));
        let issue = attrs(json!({"updated_at": "2020-02-01T00:00:00Z"}));

        for algorithm in [KeyAlgorithm::Sha1, KeyAlgorithm::Sha256] {
            assert_eq!(
                RecordKey::derive(algorithm, Some(&repo_a), Some(&issue), None),
                RecordKey::derive(algorithm, Some(&repo_b), Some(&issue), None),
            );
        }
    }

    #[test]
    fn test_concatenation_order_matters() {
        let early = attrs(json!({"updated_at": "A"}));
        let late = attrs(json!({"updated_at": "B"}));

        let ab = RecordKey::derive(KeyAlgorithm::Sha1, Some(&early), Some(&late), None);
        let ba = RecordKey::derive(KeyAlgorithm::Sha1, Some(&late), Some(&early), None);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_sha256_digest_length() {
        let key = RecordKey::derive(KeyAlgorithm::Sha256, None, None, None);
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_numeric_timestamp_uses_json_text() {
        let numeric = attrs(json!({"updated_at": 1700000000}));
        let textual = attrs(json!({"updated_at": "1700000000"}));
        assert_eq!(
            RecordKey::derive(KeyAlgorithm::Sha1, Some(&numeric), None, None),
            RecordKey::derive(KeyAlgorithm::Sha1, Some(&textual), None, None),
        );
    }

    #[test]
    fn test_key_algorithm_from_str() {
        assert_eq!("sha1".parse::<KeyAlgorithm>(), Ok(KeyAlgorithm::Sha1));
        assert_eq!(" SHA256 ".parse::<KeyAlgorithm>(), Ok(KeyAlgorithm::Sha256));
        assert!("md5".parse::<KeyAlgorithm>().is_err());
        assert_eq!(KeyAlgorithm::default(), KeyAlgorithm::Sha1);
    }
}
