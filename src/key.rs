//! Master key resolution for the encrypted credential store.
//!
//! Resolution order:
//! 1. `HIVE_CREDENTIAL_KEY` in the process environment
//! 2. an optional fallback lookup (shell startup files written by the setup
//!    tooling) — a missing collaborator is a skip, not an error
//! 3. on-demand generation, exported back into the process environment so
//!    subprocesses spawned afterwards inherit it
//!
//! Resolve the key *before* launching any subprocess that needs it;
//! environment inheritance is snapshot-at-spawn.

use std::fmt;
use std::sync::Arc;

use crate::crypto::{self, KEY_LENGTH};
use crate::env::EnvAccess;
use crate::error::CredentialError;

/// Environment variable holding the store master key.
pub const CREDENTIAL_KEY_ENV: &str = "HIVE_CREDENTIAL_KEY";

/// Symmetric key for the credential store, held only in process memory.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LENGTH]);

impl MasterKey {
    /// Parse key material from hex or base64.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        crypto::parse_key(raw).map(Self)
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(crypto::generate_key())
    }

    /// Hex encoding, for export into the environment.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

// Key material never appears in logs or panic messages.
impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey(..)")
    }
}

/// Discovery of previously-configured variables outside the process
/// environment, e.g. shell startup files written by the setup tooling.
///
/// The implementation is external; when no fallback is installed the
/// provider simply moves on to the next key source.
pub trait KeyFallback: Send + Sync {
    /// Look up `var_name`, returning `(found, value)`.
    fn lookup(&self, var_name: &str) -> (bool, Option<String>);

    /// Record a newly generated value so later sessions find it.
    ///
    /// The default implementation does nothing; read-only fallbacks need
    /// not override it.
    fn persist(&self, _var_name: &str, _value: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Resolves the master key from the environment, a fallback source, or
/// fresh generation.
pub struct KeyProvider {
    env: Arc<dyn EnvAccess>,
    fallback: Option<Arc<dyn KeyFallback>>,
    allow_generate: bool,
}

impl KeyProvider {
    pub fn new(env: Arc<dyn EnvAccess>) -> Self {
        Self {
            env,
            fallback: None,
            allow_generate: true,
        }
    }

    /// Install the fallback lookup collaborator.
    pub fn with_fallback(mut self, fallback: Arc<dyn KeyFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Allow or forbid generating a key when no source yields one.
    /// Generation is allowed by default.
    pub fn generation_allowed(mut self, allow: bool) -> Self {
        self.allow_generate = allow;
        self
    }

    /// Obtain the master key.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::KeyUnavailable` when no source yields a key
    /// and generation is disallowed, or `InvalidKey` when key material is
    /// present but malformed.
    pub fn obtain_key(&self) -> Result<MasterKey, CredentialError> {
        // 1. Process environment
        if let Some(raw) = self.env.var(CREDENTIAL_KEY_ENV) {
            return MasterKey::parse(&raw);
        }

        // 2. Fallback source; a found value is written back into the
        //    environment so subprocesses inherit it.
        if let Some(fallback) = &self.fallback {
            let (found, value) = fallback.lookup(CREDENTIAL_KEY_ENV);
            if found {
                if let Some(raw) = value {
                    let key = MasterKey::parse(&raw)?;
                    self.env.set_var(CREDENTIAL_KEY_ENV, raw.trim());
                    tracing::debug!("Loaded {} from fallback source", CREDENTIAL_KEY_ENV);
                    return Ok(key);
                }
            }
        }

        // 3. Generation
        if !self.allow_generate {
            return Err(CredentialError::KeyUnavailable);
        }

        let key = MasterKey::generate();
        let key_hex = key.to_hex();
        self.env.set_var(CREDENTIAL_KEY_ENV, &key_hex);
        if let Some(fallback) = &self.fallback {
            if let Err(e) = fallback.persist(CREDENTIAL_KEY_ENV, &key_hex) {
                tracing::warn!("Failed to persist generated {}: {}", CREDENTIAL_KEY_ENV, e);
            }
        }
        tracing::info!("Generated new {}", CREDENTIAL_KEY_ENV);
        Ok(key)
    }
}
