//! Encrypted, file-backed credential store.
//!
//! Secrets are sealed with AES-256-GCM under the session master key and
//! persisted to a single JSON file:
//!
//! ```text
//! ~/.hive/credentials.json
//! {
//!   "version": 1,
//!   "entries": {
//!     "TAVILY_API_KEY": { "ciphertext": "...", "nonce": "...", "created_at": "..." },
//!     "synced:9f2c...":  { "ciphertext": "...", "nonce": "...", "created_at": "..." }
//!   }
//! }
//! ```
//!
//! The store is identity-agnostic: entries are keyed by whatever identity
//! they were written under, either an environment-variable name or the
//! opaque hash of a synced credential. Presence checks never decrypt.
//!
//! Writes go through a temp file and an atomic rename, serialized by an
//! in-process mutex and a `fs2` exclusive lock on a sibling lock file so
//! concurrent processes cannot interleave writes. Readers only touch the
//! in-memory snapshot and never wait on writers beyond a single write.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::crypto;
use crate::error::CredentialError;
use crate::key::MasterKey;

/// Store file format version.
const STORE_VERSION: u32 = 1;

/// A decrypted secret value.
///
/// `Debug` is redacted; the plaintext is only reachable through
/// [`Secret::expose`], keeping accidental logging from leaking values.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// One encrypted entry as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Base64-encoded ciphertext.
    pub ciphertext: String,
    /// Base64-encoded 96-bit nonce.
    pub nonce: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    version: u32,
    entries: HashMap<String, StoreEntry>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// Diagnostic summary of the store. Carries no secret material.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub path: String,
    pub entry_count: usize,
    pub unlocked: bool,
    /// Whether the current key opens the existing entries (vacuously true
    /// for an empty store; false while locked).
    pub can_decrypt: bool,
}

/// Encrypted persistent map from credential identity to secret value.
pub struct CredentialStore {
    path: PathBuf,
    key: RwLock<Option<MasterKey>>,
    entries: RwLock<HashMap<String, StoreEntry>>,
    persist_lock: Mutex<()>,
}

impl CredentialStore {
    /// Open the store at `path`, locked (no key yet).
    ///
    /// A missing file is an empty store; an unreadable or unparsable file
    /// is an error, never silently discarded.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let entries = match fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: StoreSnapshot =
                    serde_json::from_slice(&bytes).map_err(|e| CredentialError::Corrupt {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                tracing::debug!(
                    "Loaded credential store from {} ({} entries)",
                    path.display(),
                    snapshot.entries.len()
                );
                snapshot.entries
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            key: RwLock::new(None),
            entries: RwLock::new(entries),
            persist_lock: Mutex::new(()),
        })
    }

    /// Open the store and unlock it with `key` in one step.
    pub async fn open_unlocked(
        path: impl Into<PathBuf>,
        key: MasterKey,
    ) -> Result<Self, CredentialError> {
        let store = Self::open(path).await?;
        store.unlock(key).await;
        Ok(store)
    }

    /// Default store location under the user's home directory.
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
        Path::new(&home).join(".hive").join("credentials.json")
    }

    /// Provide the master key for encrypt/decrypt operations.
    pub async fn unlock(&self, key: MasterKey) {
        *self.key.write().await = Some(key);
    }

    /// Drop the in-memory key; presence checks keep working.
    pub async fn lock(&self) {
        *self.key.write().await = None;
    }

    pub async fn is_unlocked(&self) -> bool {
        self.key.read().await.is_some()
    }

    /// Decrypt and return the secret stored under `identity`.
    ///
    /// Returns `Ok(None)` when no entry exists. An entry that the current
    /// key cannot open is a `DecryptionFailed` error, distinguishable from
    /// absence.
    pub async fn get(&self, identity: &str) -> Result<Option<Secret>, CredentialError> {
        let entry = match self.entries.read().await.get(identity) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };

        let key_guard = self.key.read().await;
        let key = key_guard.as_ref().ok_or(CredentialError::Locked)?;

        let nonce = BASE64
            .decode(&entry.nonce)
            .map_err(|_| CredentialError::DecryptionFailed {
                identity: identity.to_string(),
            })?;
        let ciphertext =
            BASE64
                .decode(&entry.ciphertext)
                .map_err(|_| CredentialError::DecryptionFailed {
                    identity: identity.to_string(),
                })?;

        let plaintext = crypto::open(key.bytes(), &nonce, &ciphertext, identity)?;
        let value =
            String::from_utf8(plaintext).map_err(|_| CredentialError::DecryptionFailed {
                identity: identity.to_string(),
            })?;

        Ok(Some(Secret(value)))
    }

    /// Encrypt `value` under the current key and persist it, overwriting
    /// any prior entry for `identity`.
    pub async fn put(&self, identity: &str, value: &str) -> Result<(), CredentialError> {
        let entry = {
            let key_guard = self.key.read().await;
            let key = key_guard.as_ref().ok_or(CredentialError::Locked)?;
            let (nonce, ciphertext) = crypto::seal(key.bytes(), value.as_bytes())?;
            StoreEntry {
                ciphertext: BASE64.encode(ciphertext),
                nonce: BASE64.encode(nonce),
                created_at: Utc::now().to_rfc3339(),
            }
        };

        self.entries
            .write()
            .await
            .insert(identity.to_string(), entry);
        self.persist().await
    }

    /// Remove the entry for `identity`. Returns whether one existed.
    pub async fn delete(&self, identity: &str) -> Result<bool, CredentialError> {
        let removed = self.entries.write().await.remove(identity).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Whether an entry exists for `identity`. Never decrypts.
    pub async fn contains(&self, identity: &str) -> bool {
        self.entries.read().await.contains_key(identity)
    }

    /// The subset of `identities` that have entries. Never decrypts.
    pub async fn contains_any_of(&self, identities: &BTreeSet<String>) -> BTreeSet<String> {
        let entries = self.entries.read().await;
        identities
            .iter()
            .filter(|identity| entries.contains_key(identity.as_str()))
            .cloned()
            .collect()
    }

    /// All stored identities, sorted. Metadata only.
    pub async fn identities(&self) -> Vec<String> {
        let mut out: Vec<String> = self.entries.read().await.keys().cloned().collect();
        out.sort();
        out
    }

    /// Diagnostic summary: entry count and whether the current key opens
    /// the existing entries.
    pub async fn status(&self) -> StoreStatus {
        let unlocked = self.is_unlocked().await;
        let identities = self.identities().await;
        let can_decrypt = if !unlocked {
            false
        } else {
            match identities.first() {
                None => true,
                Some(identity) => matches!(self.get(identity).await, Ok(Some(_))),
            }
        };

        StoreStatus {
            path: self.path.display().to_string(),
            entry_count: identities.len(),
            unlocked,
            can_decrypt,
        }
    }

    /// Write the current snapshot to disk: temp file, then atomic rename,
    /// under an exclusive advisory lock shared with other processes.
    async fn persist(&self) -> Result<(), CredentialError> {
        let _guard = self.persist_lock.lock().await;

        let snapshot = StoreSnapshot {
            version: STORE_VERSION,
            entries: self.entries.read().await.clone(),
        };
        let data = serde_json::to_vec_pretty(&snapshot).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let lock_path = self.path.with_extension("json.lock");
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive()?;

        let tmp_path = self.path.with_extension("json.tmp");
        let result = async {
            fs::write(&tmp_path, &data).await?;
            fs::rename(&tmp_path, &self.path).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = lock_file.unlock() {
            tracing::warn!("Failed to release store lock {}: {}", lock_path.display(), e);
        }

        result?;
        tracing::debug!("Persisted credential store to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_key() -> MasterKey {
        MasterKey::parse("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")
            .unwrap()
    }

    fn other_key() -> MasterKey {
        MasterKey::parse("ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff")
            .unwrap()
    }

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("credentials.json")
    }

    #[tokio::test]
    async fn missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open_unlocked(store_path(&dir), test_key())
            .await
            .unwrap();

        assert!(store.identities().await.is_empty());
        assert!(store.get("ANYTHING").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open_unlocked(store_path(&dir), test_key())
            .await
            .unwrap();

        store.put("TAVILY_API_KEY", "tvly-abc123").await.unwrap();
        let secret = store.get("TAVILY_API_KEY").await.unwrap().unwrap();
        assert_eq!(secret.expose(), "tvly-abc123");
    }

    #[tokio::test]
    async fn put_overwrites_prior_entry() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open_unlocked(store_path(&dir), test_key())
            .await
            .unwrap();

        store.put("SVC_KEY", "old").await.unwrap();
        store.put("SVC_KEY", "new").await.unwrap();

        let secret = store.get("SVC_KEY").await.unwrap().unwrap();
        assert_eq!(secret.expose(), "new");
        assert_eq!(store.identities().await.len(), 1);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        {
            let store = CredentialStore::open_unlocked(&path, test_key())
                .await
                .unwrap();
            store.put("SVC_KEY", "persisted").await.unwrap();
        }

        let reopened = CredentialStore::open_unlocked(&path, test_key())
            .await
            .unwrap();
        let secret = reopened.get("SVC_KEY").await.unwrap().unwrap();
        assert_eq!(secret.expose(), "persisted");
    }

    #[tokio::test]
    async fn wrong_key_is_decryption_error_not_absence() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        {
            let store = CredentialStore::open_unlocked(&path, test_key())
                .await
                .unwrap();
            store.put("SVC_KEY", "secret").await.unwrap();
        }

        let store = CredentialStore::open_unlocked(&path, other_key())
            .await
            .unwrap();
        let result = store.get("SVC_KEY").await;

        assert!(matches!(
            result,
            Err(CredentialError::DecryptionFailed { ref identity }) if identity == "SVC_KEY"
        ));
        // Absent entries still read as None, not as an error
        assert!(store.get("OTHER_KEY").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn locked_store_refuses_crypto_but_answers_presence() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        {
            let store = CredentialStore::open_unlocked(&path, test_key())
                .await
                .unwrap();
            store.put("SVC_KEY", "secret").await.unwrap();
        }

        let store = CredentialStore::open(&path).await.unwrap();
        assert!(!store.is_unlocked().await);
        assert!(store.contains("SVC_KEY").await);
        assert!(matches!(
            store.get("SVC_KEY").await,
            Err(CredentialError::Locked)
        ));
        assert!(matches!(
            store.put("SVC_KEY", "x").await,
            Err(CredentialError::Locked)
        ));
    }

    #[tokio::test]
    async fn contains_any_of_reports_present_subset() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open_unlocked(store_path(&dir), test_key())
            .await
            .unwrap();

        store.put("A_KEY", "a").await.unwrap();
        store.put("C_KEY", "c").await.unwrap();

        let asked: BTreeSet<String> = ["A_KEY", "B_KEY", "C_KEY"]
            .into_iter()
            .map(String::from)
            .collect();
        let present = store.contains_any_of(&asked).await;

        let expected: BTreeSet<String> =
            ["A_KEY", "C_KEY"].into_iter().map(String::from).collect();
        assert_eq!(present, expected);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open_unlocked(store_path(&dir), test_key())
            .await
            .unwrap();

        store.put("SVC_KEY", "secret").await.unwrap();
        assert!(store.delete("SVC_KEY").await.unwrap());
        assert!(!store.delete("SVC_KEY").await.unwrap());
        assert!(store.get("SVC_KEY").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_surfaced() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        std::fs::write(&path, b"not json at all").unwrap();

        let result = CredentialStore::open(&path).await;
        assert!(matches!(result, Err(CredentialError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let store = CredentialStore::open_unlocked(&path, test_key())
            .await
            .unwrap();
        store.put("SVC_KEY", "secret").await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn status_reports_counts_and_decryptability() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        let store = CredentialStore::open_unlocked(&path, test_key())
            .await
            .unwrap();
        let status = store.status().await;
        assert_eq!(status.entry_count, 0);
        assert!(status.can_decrypt);

        store.put("SVC_KEY", "secret").await.unwrap();

        // Reopen with the wrong key: entries exist but cannot be opened
        let wrong = CredentialStore::open_unlocked(&path, other_key())
            .await
            .unwrap();
        let status = wrong.status().await;
        assert_eq!(status.entry_count, 1);
        assert!(status.unlocked);
        assert!(!status.can_decrypt);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret("super-sensitive".to_string());
        assert_eq!(format!("{:?}", secret), "Secret(***)");
    }
}
