//! # Hive Credentials
//!
//! Encrypted credential storage and workload validation for agent runners.
//!
//! This library provides:
//! - An AES-256-GCM encrypted store for API credentials under a single master key
//! - A declarative registry mapping credentials to the tools and node types that need them
//! - A resolver that reports exactly which credentials a workload is missing
//! - A setup session that collects missing values from an operator and writes them back
//!
//! ## Validation Flow
//!
//! ```text
//!   workload nodes ──► aggregate tools / node types
//!                            │
//!                            ▼
//!                  ┌──────────────────────┐
//!                  │ RequirementResolver   │──► registry + store (+ sync)
//!                  └──────────┬───────────┘
//!                             │ missing list
//!                             ▼
//!        MissingCredentialsError ──or──► SetupSession ──► store
//! ```
//!
//! 1. Aggregate tool and node-type requirements across the workload
//! 2. Resolve them against the spec registry and the encrypted store
//! 3. Either surface `MissingCredentialsError` with remediation text, or run
//!    a `SetupSession` to collect the missing values and re-validate
//!
//! ## Environment
//! - `HIVE_CREDENTIAL_KEY` - Master key for the encrypted store (hex or base64).
//! - `ADEN_API_KEY` - Enables the optional OAuth sync collaborator.
//!
//! Both are read if present and written back when discovered through the
//! fallback lookup, so subprocesses spawned afterwards inherit them.
//!
//! ## Modules
//! - `store`: encrypted credential store
//! - `registry`: declarative credential spec table
//! - `resolver`: workload requirement resolution
//! - `setup`: operator-driven setup session
//! - `key`: master key resolution and generation
//! - `validation`: validation entry point and terminal error message

pub mod crypto;
pub mod env;
pub mod error;
pub mod key;
pub mod registry;
pub mod resolver;
pub mod setup;
pub mod store;
pub mod sync;
pub mod validation;

pub use env::{EnvAccess, MemoryEnv, ProcessEnv};
pub use error::CredentialError;
pub use key::{KeyFallback, KeyProvider, MasterKey, CREDENTIAL_KEY_ENV};
pub use registry::{CredentialSpec, SpecRegistry};
pub use resolver::{
    MissingCredential, RequirementResolver, WorkloadRequirements, WorkloadSpec,
};
pub use setup::{FailedWrite, PromptReply, Prompter, SetupOutcome, SetupSession};
pub use store::{CredentialStore, Secret, StoreEntry, StoreStatus};
pub use sync::{synced_identity, SyncLookup, SYNC_API_KEY_ENV};
pub use validation::{ensure_credential_env, validate_workload, MissingCredentialsError};
