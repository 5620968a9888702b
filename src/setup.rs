//! Operator-driven setup session for missing credentials.
//!
//! Session states: `Idle → KeyEnsured → Collecting → {Saved | Cancelled}`.
//! The session first ensures a master key exists (fatal if it cannot),
//! collects one reply per missing credential through the [`Prompter`]
//! collaborator, and only then commits the accepted values to the store.
//! A cancelled session writes nothing; a per-entry write failure is
//! reported in the summary and never aborts the remaining entries.
//!
//! Re-running setup after a partial save is safe: callers resolve a fresh
//! missing list first, so only still-absent entries are prompted again.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CredentialError;
use crate::key::KeyProvider;
use crate::resolver::MissingCredential;
use crate::store::CredentialStore;

/// Operator reply for one missing credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    /// A value was entered (surrounding whitespace not yet trimmed).
    Submitted(String),
    /// The entry was left blank.
    Skipped,
    /// Abort the whole session; nothing is written.
    Cancel,
}

/// Presentation collaborator.
///
/// Receives one missing credential at a time, in presentation order, with
/// its identity, affected tools/types, description, and help URL; returns
/// the operator's reply. Rendering is entirely the implementor's concern.
/// The wait has no timeout; cancellation is operator-driven.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, credential: &MissingCredential) -> PromptReply;
}

/// A store write that failed during the save phase.
#[derive(Debug)]
pub struct FailedWrite {
    pub env_var: String,
    pub error: CredentialError,
}

/// How a setup session ended.
#[derive(Debug)]
pub enum SetupOutcome {
    /// At least one non-blank value was processed.
    Saved {
        configured: usize,
        failed: Vec<FailedWrite>,
    },
    /// Explicit cancel, or every entry left blank. Nothing was written.
    Cancelled,
}

impl SetupOutcome {
    /// One-line summary for session reporting.
    pub fn summary(&self) -> String {
        match self {
            SetupOutcome::Saved { configured, failed } => {
                format!("{} configured, {} failed", configured, failed.len())
            }
            SetupOutcome::Cancelled => "cancelled, nothing saved".to_string(),
        }
    }
}

/// Orchestrates master-key setup and collection of missing credentials.
pub struct SetupSession {
    provider: KeyProvider,
    store: Arc<CredentialStore>,
}

impl SetupSession {
    pub fn new(provider: KeyProvider, store: Arc<CredentialStore>) -> Self {
        Self { provider, store }
    }

    /// Run the session over a freshly resolved missing list.
    ///
    /// # Errors
    ///
    /// Fails fatally only when no master key can be obtained; store write
    /// failures are per-entry and land in the returned outcome instead.
    pub async fn run(
        &self,
        missing: &[MissingCredential],
        prompter: &dyn Prompter,
    ) -> Result<SetupOutcome, CredentialError> {
        // Idle → KeyEnsured
        let key = self.provider.obtain_key()?;
        self.store.unlock(key).await;

        // KeyEnsured → Collecting. Values are committed only after the
        // operator finishes, so a cancel leaves the store untouched.
        let mut accepted: Vec<(&MissingCredential, String)> = Vec::new();
        for credential in missing {
            match prompter.prompt(credential).await {
                PromptReply::Cancel => return Ok(SetupOutcome::Cancelled),
                PromptReply::Skipped => continue,
                PromptReply::Submitted(raw) => {
                    let value = raw.trim();
                    if value.is_empty() {
                        // Blank after trim is a skip, not a stored empty
                        continue;
                    }
                    accepted.push((credential, value.to_string()));
                }
            }
        }

        if accepted.is_empty() {
            return Ok(SetupOutcome::Cancelled);
        }

        // Collecting → Saved
        let mut configured = 0usize;
        let mut failed = Vec::new();
        for (credential, value) in accepted {
            let env_var = credential.spec.env_var.as_str();
            match self.store.put(env_var, &value).await {
                Ok(()) => {
                    configured += 1;
                    tracing::info!("Configured credential {}", env_var);
                }
                Err(error) => {
                    tracing::warn!("Failed to store credential {}: {}", env_var, error);
                    failed.push(FailedWrite {
                        env_var: env_var.to_string(),
                        error,
                    });
                }
            }
        }

        Ok(SetupOutcome::Saved { configured, failed })
    }
}
