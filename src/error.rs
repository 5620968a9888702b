//! Error types for the credential subsystem.
//!
//! Collaborator absence (the shell-config fallback, the sync service) is
//! never an error here; those paths degrade to "not found" and resolution
//! continues. Everything that does fail carries enough structure for the
//! embedding runner to decide between prompting interactively and aborting.

use thiserror::Error;

use crate::validation::MissingCredentialsError;

/// Result type for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// No key source succeeded and generation was disallowed.
    #[error("no master key available: HIVE_CREDENTIAL_KEY is not set and key generation is disabled")]
    KeyUnavailable,

    /// Key material was present but malformed.
    #[error("invalid master key: {0}")]
    InvalidKey(String),

    /// Ciphertext exists for the identity but the current key cannot open it.
    ///
    /// Distinct from an absent entry: a wrong or rotated key must surface
    /// here instead of returning garbled plaintext.
    #[error("failed to decrypt credential `{identity}`: wrong key or corrupted entry")]
    DecryptionFailed { identity: String },

    /// A decrypt or encrypt was attempted before the store had a key.
    #[error("credential store is locked: no master key has been provided")]
    Locked,

    /// The store file could not be read or written.
    #[error("credential store I/O error: {0}")]
    Store(#[from] std::io::Error),

    /// The store file exists but could not be parsed.
    #[error("credential store at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The sync collaborator was installed but its lookup failed.
    #[error("credential sync lookup failed: {cause}")]
    Sync { cause: anyhow::Error },

    /// One or more required credentials are absent from the store.
    #[error(transparent)]
    Missing(#[from] MissingCredentialsError),
}
