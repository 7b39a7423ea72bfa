//! Local session key material.

use crate::{error::KeyStoreError, types::normalize_public_key};
use alloy_primitives::{B256, hex};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A session key's private scalar. Never printed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PrivateKey(B256);

impl PrivateKey {
    pub const fn new(bytes: B256) -> Self {
        Self(bytes)
    }

    pub const fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Keyed blob store for session key material.
///
/// Public keys are normalized with [`normalize_public_key`] before use, so lookups are
/// insensitive to case and to a missing `0x` prefix.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait KeyStore: Send + Sync + fmt::Debug {
    /// Stores material, replacing any previous entry.
    fn put(&self, public_key: &str, private_key: PrivateKey) -> Result<(), KeyStoreError>;

    fn get(&self, public_key: &str) -> Result<Option<PrivateKey>, KeyStoreError>;

    /// Deletes material. Absent entries are not an error.
    fn remove(&self, public_key: &str) -> Result<(), KeyStoreError>;

    fn has_material(&self, public_key: &str) -> Result<bool, KeyStoreError> {
        self.get(public_key).map(|key| key.is_some())
    }

    /// Normalized public keys of all stored entries.
    fn public_keys(&self) -> Result<Vec<String>, KeyStoreError>;
}

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: Mutex<HashMap<String, PrivateKey>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn put(&self, public_key: &str, private_key: PrivateKey) -> Result<(), KeyStoreError> {
        self.keys.lock().insert(validate_public_key(public_key)?, private_key);
        Ok(())
    }

    fn get(&self, public_key: &str) -> Result<Option<PrivateKey>, KeyStoreError> {
        Ok(self.keys.lock().get(&normalize_public_key(public_key)).copied())
    }

    fn remove(&self, public_key: &str) -> Result<(), KeyStoreError> {
        self.keys.lock().remove(&normalize_public_key(public_key));
        Ok(())
    }

    fn public_keys(&self) -> Result<Vec<String>, KeyStoreError> {
        let mut keys: Vec<_> = self.keys.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// On-disk record of a single key.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyFile {
    public_key: String,
    private_key: B256,
}

/// Stores each key as `session-key.<publicKey>.json` in a directory.
///
/// Writes go to a temporary file that is renamed into place. Operations on the same public
/// key are serialized through a per-key lock.
#[derive(Debug)]
pub struct FileKeyStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileKeyStore {
    const PREFIX: &'static str = "session-key.";
    const EXTENSION: &'static str = ".json";

    /// Opens the store, creating `dir` if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| KeyStoreError::Io { path: dir.clone(), source })?;
        Ok(Self { dir, locks: Default::default() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `public_key`'s material.
    pub fn key_path(&self, public_key: &str) -> Result<PathBuf, KeyStoreError> {
        let public_key = validate_public_key(public_key)?;
        Ok(self.dir.join(format!("{}{public_key}{}", Self::PREFIX, Self::EXTENSION)))
    }

    /// Runs `f` holding `public_key`'s lock. The lock entry is dropped once no caller holds it.
    fn with_lock<T>(&self, public_key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.lock().entry(public_key.to_string()).or_default().clone();
        let out = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        let mut locks = self.locks.lock();
        if locks.get(public_key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(public_key);
        }
        out
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), KeyStoreError> {
        let io_err = |source| KeyStoreError::Io { path: path.to_path_buf(), source };
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600)).map_err(io_err)?;
        }
        file.write_all(contents).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, path).map_err(io_err)
    }
}

impl KeyStore for FileKeyStore {
    fn put(&self, public_key: &str, private_key: PrivateKey) -> Result<(), KeyStoreError> {
        let public_key = validate_public_key(public_key)?;
        let path = self.key_path(&public_key)?;
        let record = KeyFile { public_key: public_key.clone(), private_key: private_key.0 };
        let contents = serde_json::to_vec_pretty(&record)
            .map_err(|source| KeyStoreError::Json { public_key: public_key.clone(), source })?;

        self.with_lock(&public_key, || self.write_atomic(&path, &contents))?;
        trace!(target: "fastpath::store", %public_key, "stored key material");
        Ok(())
    }

    fn get(&self, public_key: &str) -> Result<Option<PrivateKey>, KeyStoreError> {
        let public_key = normalize_public_key(public_key);
        if validate_public_key(&public_key).is_err() {
            return Ok(None);
        }
        let path = self.key_path(&public_key)?;

        let contents = match self.with_lock(&public_key, || fs::read(&path)) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(KeyStoreError::Io { path, source }),
        };
        let record: KeyFile = serde_json::from_slice(&contents)
            .map_err(|source| KeyStoreError::Json { public_key: public_key.clone(), source })?;
        if normalize_public_key(&record.public_key) != public_key {
            return Err(KeyStoreError::InvalidPrivateKey(public_key));
        }
        Ok(Some(PrivateKey(record.private_key)))
    }

    fn remove(&self, public_key: &str) -> Result<(), KeyStoreError> {
        let public_key = normalize_public_key(public_key);
        if validate_public_key(&public_key).is_err() {
            return Ok(());
        }
        let path = self.key_path(&public_key)?;

        match self.with_lock(&public_key, || fs::remove_file(&path)) {
            Ok(()) => {
                trace!(target: "fastpath::store", %public_key, "removed key material");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(KeyStoreError::Io { path, source }),
        }
    }

    fn public_keys(&self) -> Result<Vec<String>, KeyStoreError> {
        let io_err = |source| KeyStoreError::Io { path: self.dir.clone(), source };
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let name = entry.map_err(io_err)?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(public_key) =
                name.strip_prefix(Self::PREFIX).and_then(|rest| rest.strip_suffix(Self::EXTENSION))
                && validate_public_key(public_key).is_ok()
            {
                keys.push(public_key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Normalizes `public_key` and rejects anything that is not `0x`-prefixed hex.
fn validate_public_key(public_key: &str) -> Result<String, KeyStoreError> {
    let normalized = normalize_public_key(public_key);
    match normalized.strip_prefix("0x") {
        Some(digits) if !digits.is_empty() && hex::decode(digits).is_ok() => Ok(normalized),
        _ => Err(KeyStoreError::InvalidPublicKey(public_key.to_string())),
    }
}
