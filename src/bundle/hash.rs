//! Bundle hashing.
//!
//! Maps in [`BundleData`] are ordered, so serializing a bundle is
//! deterministic and its SHA-256 identifies the desired topology.

use sha2::{Digest, Sha256};

use super::spec::BundleData;

/// Hasher for computing bundle hashes.
#[derive(Debug, Default)]
pub struct BundleHasher;

impl BundleHasher {
    /// Creates a new bundle hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hash of a whole bundle.
    #[must_use]
    pub fn hash_bundle(&self, bundle: &BundleData) -> String {
        let mut hasher = Sha256::new();

        // serde_json only fails on non-string map keys, which BundleData does not have
        let encoded = serde_json::to_vec(bundle).unwrap_or_default();
        hasher.update(&encoded);

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::ServiceSpec;

    fn bundle_with(charm: &str) -> BundleData {
        let mut bundle = BundleData::default();
        bundle.services.insert(
            String::from("mysql"),
            ServiceSpec {
                charm: charm.to_string(),
                num_units: 1,
                ..ServiceSpec::default()
            },
        );
        bundle
    }

    #[test]
    fn test_hash_deterministic() {
        let hasher = BundleHasher::new();
        let bundle = bundle_with("cs:trusty/mysql-10");
        assert_eq!(hasher.hash_bundle(&bundle), hasher.hash_bundle(&bundle.clone()));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let hasher = BundleHasher::new();
        let a = hasher.hash_bundle(&bundle_with("cs:trusty/mysql-10"));
        let b = hasher.hash_bundle(&bundle_with("cs:trusty/mysql-11"));
        assert_ne!(a, b);
        assert_eq!(hasher.short_hash(&a).len(), 8);
    }
}
