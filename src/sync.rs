//! Optional collaborator for OAuth-synced credentials.
//!
//! An external sync process (enabled by `ADEN_API_KEY`) populates store
//! entries under opaque hashed identities rather than human-chosen variable
//! names. The resolver consults this collaborator through [`SyncLookup`];
//! when it is not installed, the sync portion of validation is a no-op
//! success and the rest of the system keeps working.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::registry::CredentialSpec;

/// Environment variable that enables the sync collaborator.
pub const SYNC_API_KEY_ENV: &str = "ADEN_API_KEY";

/// Stable store identity for a synced credential.
///
/// Synced entries are keyed by a truncated SHA-256 digest of the
/// credential's logical id, so the same credential always lands on the same
/// store key regardless of which session synced it.
pub fn synced_identity(spec_id: &str) -> String {
    let digest = Sha256::digest(spec_id.as_bytes());
    format!("synced:{}", hex::encode(&digest[..16]))
}

/// Lookup of credentials managed by the external sync process.
///
/// Inputs are sorted name lists; outputs are `(store identity, spec)` pairs
/// for sync-managed credentials that are still missing.
#[async_trait]
pub trait SyncLookup: Send + Sync {
    async fn missing_for_tools(
        &self,
        tools: &[String],
    ) -> anyhow::Result<Vec<(String, CredentialSpec)>>;

    async fn missing_for_node_types(
        &self,
        node_types: &[String],
    ) -> anyhow::Result<Vec<(String, CredentialSpec)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synced_identity_is_stable() {
        assert_eq!(synced_identity("google/oauth"), synced_identity("google/oauth"));
    }

    #[test]
    fn synced_identity_distinguishes_ids() {
        assert_ne!(synced_identity("google/oauth"), synced_identity("hubspot/oauth"));
    }

    #[test]
    fn synced_identity_is_prefixed_and_opaque() {
        let identity = synced_identity("google/oauth");
        assert!(identity.starts_with("synced:"));
        assert!(!identity.contains("google"));
        assert_eq!(identity.len(), "synced:".len() + 32);
    }
}
