//! File-backed configuration provider.
//!
//! [`FileBackedProvider`] reads the external properties file resolved by
//! [`resolve_location`](crate::resolver::resolve_location), decrypts
//! `ENC(...)` values, and persists runtime mutations back to the file.
//!
//! # Persistence
//!
//! Mutations re-read the raw file, apply the change, and rewrite it with keys
//! in sorted order below a header comment recording the operation. Values
//! that were encrypted on disk are written back unchanged. The new content
//! goes to a temporary file next to the symlink-resolved target, created with
//! the target's permissions, which is then renamed over it.
//!
//! A value is refused before anything is written if the next load would
//! reject the file because of it: `ENC(` text without a configured key, or a
//! wrapped value that does not decrypt under the current key.
//!
//! Read-modify-rewrite cycles on the same path are serialized process-wide.
//!
//! # Encoding
//!
//! Files are read as UTF-8, falling back to ISO-8859-1 when the bytes are not
//! valid UTF-8. Rewrites are always UTF-8.

use std::fmt;
use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use conflux_core::{
    ApplicationIdentity, ConfigContext, ConfigResult, ConfigurationError, ConfigurationMap,
    ConfigurationSource, DeleteOutcome, MutableSource, PutOutcome,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::crypto::{self, CryptoError, ValueCipher};
use crate::properties;
use crate::resolver::resolve_location;

static FILE_LOCKS: OnceLock<DashMap<PathBuf, Arc<Mutex<()>>>> = OnceLock::new();

fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    FILE_LOCKS
        .get_or_init(DashMap::new)
        .entry(path.to_path_buf())
        .or_default()
        .clone()
}

/// Reads `path` as UTF-8, or as ISO-8859-1 if it is not valid UTF-8.
fn read_text(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8(bytes)
        .unwrap_or_else(|e| e.into_bytes().into_iter().map(char::from).collect()))
}

/// A configuration source backed by an external properties file.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use conflux_config::FileBackedProvider;
/// use conflux_core::{ApplicationIdentity, ConfigContext, ConfigurationSource};
///
/// let context = Arc::new(ConfigContext::default());
/// context.establish_identity(ApplicationIdentity::new("demo"));
///
/// let provider = FileBackedProvider::new(context);
/// let entries = provider.contribute()?;
/// # Ok::<(), conflux_core::ConfigurationError>(())
/// ```
pub struct FileBackedProvider {
    context: Arc<ConfigContext>,
    name: String,
    file_name: Option<String>,
    path: OnceLock<PathBuf>,
    cache: RwLock<Option<ConfigurationMap>>,
}

impl FileBackedProvider {
    /// Creates a provider for the identity's properties file.
    pub fn new(context: Arc<ConfigContext>) -> Self {
        Self {
            context,
            name: "file".to_string(),
            file_name: None,
            path: OnceLock::new(),
            cache: RwLock::new(None),
        }
    }

    /// Uses `file_name` in the configuration directory instead of the
    /// identity's properties file.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        self.name = format!("file:{file_name}");
        self.file_name = Some(file_name);
        self
    }

    /// Resolves the backing file path; memoized after the first success.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error if no directory can be found.
    pub fn path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = self.path.get() {
            return Ok(path.clone());
        }
        let location = resolve_location(&self.context, self.file_name.as_deref())?;
        Ok(self.path.get_or_init(|| location.file).clone())
    }

    /// Reads, decrypts and returns the file's entries.
    ///
    /// The contribution also carries `<app>.config.dir` set to the resolved
    /// directory. A successful load replaces the cached entries.
    ///
    /// # Errors
    ///
    /// - `MissingApplicationIdentity` / `MissingConfigDirectory` if the file
    ///   cannot be located
    /// - `ConfigurationFileNotFound` if it cannot be read
    /// - `MissingDecryptionKey` if it holds `ENC(` but no key is configured
    /// - `DecryptionFailed` if an encrypted value does not decrypt
    pub fn load(&self) -> ConfigResult<ConfigurationMap> {
        let identity = self.context.require_identity()?;
        let path = self.path()?;

        let raw = read_text(&path).map_err(|e| ConfigurationError::file_not_found(&path, e))?;

        let key = self.context.decryption_key();
        if properties::has_encrypted_marker(&raw) && !key.is_defined() {
            error!(
                path = %path.display(),
                property = %identity.decryption_key_property,
                "encrypted properties present but no decryption key configured"
            );
            return Err(ConfigurationError::missing_decryption_key(
                &path,
                &identity.decryption_key_property,
            ));
        }

        let cipher = ValueCipher::from_key(key);
        let mut entries = properties::parse(&raw);

        for (name, value) in &mut entries {
            let Some(ciphertext) = crypto::unwrap_marker(value) else {
                continue;
            };
            let cipher = cipher.as_ref().ok_or_else(|| {
                ConfigurationError::missing_decryption_key(&path, &identity.decryption_key_property)
            })?;
            *value = cipher
                .decrypt(ciphertext)
                .map_err(|e| ConfigurationError::decryption_failed(name.as_str(), e.to_string()))?;
        }

        if let Some(directory) = path.parent() {
            entries.insert(
                identity.config_dir_property(),
                directory.display().to_string(),
            );
        }

        debug!(path = %path.display(), entries = entries.len(), "configuration file loaded");
        *self.cache.write() = Some(entries.clone());
        Ok(entries)
    }

    /// Entries from the last successful load.
    #[must_use]
    pub fn cached(&self) -> Option<ConfigurationMap> {
        self.cache.read().clone()
    }

    /// Checks that `value` will load back, returning the plaintext it reads
    /// back as.
    fn readable_value(
        &self,
        path: &Path,
        identity: &ApplicationIdentity,
        key: &str,
        value: &str,
    ) -> ConfigResult<String> {
        let decryption_key = self.context.decryption_key();
        if properties::has_encrypted_marker(value) && !decryption_key.is_defined() {
            return Err(ConfigurationError::missing_decryption_key(
                path,
                &identity.decryption_key_property,
            ));
        }
        crypto::reveal(decryption_key, value).map_err(|e| match e {
            CryptoError::MissingKey => {
                ConfigurationError::missing_decryption_key(path, &identity.decryption_key_property)
            }
            e => ConfigurationError::decryption_failed(key, e.to_string()),
        })
    }

    fn read_for_update(path: &Path) -> ConfigResult<ConfigurationMap> {
        read_text(path)
            .map(|raw| properties::parse(&raw))
            .map_err(|e| ConfigurationError::persistence_failed(path, e))
    }

    fn rewrite(path: &Path, entries: &ConfigurationMap, header: &str) -> ConfigResult<()> {
        let content = properties::store(entries, &[header]);
        let (target, permissions) = fs::canonicalize(path)
            .and_then(|target| {
                let permissions = fs::metadata(&target)?.permissions();
                Ok((target, permissions))
            })
            .map_err(|e| ConfigurationError::persistence_failed(path, e))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = target.with_file_name(format!(".{file_name}.tmp"));

        let written = Self::write_temp(&temp, &content, permissions)
            .and_then(|()| fs::rename(&temp, &target));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            error!(path = %target.display(), error = %e, "failed to rewrite configuration file");
            return Err(ConfigurationError::persistence_failed(path, e));
        }
        Ok(())
    }

    fn write_temp(temp: &Path, content: &str, permissions: Permissions) -> io::Result<()> {
        let mut file = File::create(temp)?;
        file.set_permissions(permissions)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()
    }
}

impl fmt::Debug for FileBackedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBackedProvider")
            .field("name", &self.name)
            .field("path", &self.path.get())
            .field("loaded", &self.cache.read().is_some())
            .finish_non_exhaustive()
    }
}

impl ConfigurationSource for FileBackedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn contribute(&self) -> ConfigResult<ConfigurationMap> {
        self.load()
    }
}

impl MutableSource for FileBackedProvider {
    fn save(&self, key: &str, value: &str) -> ConfigResult<PutOutcome> {
        let identity = self.context.require_identity()?;
        let path = self.path()?;
        let plaintext = self
            .readable_value(&path, identity, key, value)
            .map_err(|err| {
                error!(
                    path = %path.display(),
                    key,
                    error = %err,
                    "value would not load back; not saved"
                );
                err
            })?;

        let lock = file_lock(&path);
        let _guard = lock.lock();

        let mut entries = Self::read_for_update(&path)?;
        let outcome = if entries.insert(key.to_string(), value.to_string()).is_some() {
            PutOutcome::Updated
        } else {
            PutOutcome::Created
        };

        let header = format!(
            " -- property: {key} was added or updated at runtime on: {}",
            Utc::now().to_rfc3339()
        );
        Self::rewrite(&path, &entries, &header)?;

        if let Some(cached) = self.cache.write().as_mut() {
            cached.insert(key.to_string(), plaintext);
        }

        info!(path = %path.display(), key, outcome = %outcome, "configuration file updated");
        Ok(outcome)
    }

    fn delete(&self, key: &str) -> ConfigResult<DeleteOutcome> {
        let path = self.path()?;
        let lock = file_lock(&path);
        let _guard = lock.lock();

        let mut entries = Self::read_for_update(&path)?;
        if entries.remove(key).is_none() {
            debug!(path = %path.display(), key, "key not present in configuration file");
            return Ok(DeleteOutcome::NotFound);
        }

        let header = format!(
            " -- property: {key} was deleted at runtime on: {}",
            Utc::now().to_rfc3339()
        );
        Self::rewrite(&path, &entries, &header)?;

        if let Some(cached) = self.cache.write().as_mut() {
            cached.remove(key);
        }

        info!(path = %path.display(), key, "configuration file entry deleted");
        Ok(DeleteOutcome::Deleted)
    }
}
