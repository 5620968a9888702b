//! Workload credential validation.
//!
//! The embedding runner calls [`validate_workload`] before executing a
//! workload; a non-empty missing list becomes a [`MissingCredentialsError`]
//! whose rendered message is part of the terminal contract. The runner
//! decides whether to abort with that message or hand the list to a
//! [`crate::setup::SetupSession`].

use std::fmt;

use crate::env::EnvAccess;
use crate::error::CredentialError;
use crate::key::{KeyFallback, CREDENTIAL_KEY_ENV};
use crate::resolver::{
    MissingCredential, RequirementResolver, WorkloadRequirements, WorkloadSpec,
};
use crate::sync::SYNC_API_KEY_ENV;

/// Load `HIVE_CREDENTIAL_KEY` and `ADEN_API_KEY` from the fallback source
/// when they are not already in the environment.
///
/// The setup flow records these outside the process (shell startup files);
/// a session that has not re-sourced its shell still needs them so the
/// runner — and any subprocess it spawns — can unlock the store and reach
/// the sync service. Call this before spawning those subprocesses.
pub fn ensure_credential_env(env: &dyn EnvAccess, fallback: Option<&dyn KeyFallback>) {
    let Some(fallback) = fallback else {
        return;
    };
    for var_name in [CREDENTIAL_KEY_ENV, SYNC_API_KEY_ENV] {
        if env.var(var_name).is_some() {
            continue;
        }
        let (found, value) = fallback.lookup(var_name);
        if found {
            if let Some(value) = value {
                env.set_var(var_name, &value);
                tracing::debug!("Loaded {} from fallback source", var_name);
            }
        }
    }
}

/// One or more required credentials are absent.
///
/// Carries the full ordered missing list; the `Display` output is the
/// terminal message contract: a header, one two-space-indented line per
/// credential (`ENV_VAR for <comma-joined affected names>`, with a ` nodes`
/// suffix when node types triggered the entry, and an optional
/// four-space-indented `Get it at:` line), then the remediation hint.
#[derive(Debug, Clone)]
pub struct MissingCredentialsError {
    pub missing: Vec<MissingCredential>,
}

impl fmt::Display for MissingCredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = vec!["Missing required credentials:\n".to_string()];

        for credential in &self.missing {
            let mut names: Vec<&str> = credential
                .affected_tools
                .iter()
                .map(String::as_str)
                .collect();
            names.extend(credential.affected_node_types.iter().map(String::as_str));

            let mut entry = format!(
                "  {} for {}",
                credential.spec.env_var,
                names.join(", ")
            );
            if !credential.affected_node_types.is_empty() {
                entry.push_str(" nodes");
            }
            if let Some(url) = &credential.spec.help_url {
                entry.push_str(&format!("\n    Get it at: {}", url));
            }
            lines.push(entry);
        }

        lines.push(
            "\nTo fix: run /hive-credentials in Claude Code.\nIf you've already set up \
             credentials, restart your terminal to load them."
                .to_string(),
        );

        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for MissingCredentialsError {}

/// Validate that every credential the workload requires is available.
///
/// Aggregates tool and node-type requirements across `units`, resolves
/// them, and converts a non-empty missing list into
/// `CredentialError::Missing`. An empty workload always validates.
pub async fn validate_workload(
    resolver: &RequirementResolver,
    units: &[WorkloadSpec],
) -> Result<(), CredentialError> {
    let requirements = WorkloadRequirements::aggregate(units);
    let missing = resolver.resolve(&requirements).await?;
    if missing.is_empty() {
        Ok(())
    } else {
        tracing::debug!("Workload is missing {} credential(s)", missing.len());
        Err(MissingCredentialsError { missing }.into())
    }
}
