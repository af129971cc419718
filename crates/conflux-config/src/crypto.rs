//! Encrypted property values.
//!
//! Values of the form `ENC(<ciphertext>)` are decrypted with the key
//! resolved from the application's decryption key property.
//!
//! # Format
//!
//! `<ciphertext>` is unpadded base64 of `salt (16) || nonce (12) || sealed`,
//! where `sealed` is the ChaCha20-Poly1305 output (ciphertext and tag). The
//! cipher key is derived as `HKDF-SHA256(secret, salt, "conflux/value/v1")`,
//! so every encryption of the same plaintext produces different text.
//!
//! # Example
//!
//! ```
//! use conflux_config::crypto::{self, ValueCipher};
//!
//! let cipher = ValueCipher::new("s3cret");
//! let wrapped = cipher.encrypt_wrapped("hunter2").unwrap();
//! assert!(wrapped.starts_with("ENC("));
//!
//! let inner = crypto::unwrap_marker(&wrapped).unwrap();
//! assert_eq!(cipher.decrypt(inner).unwrap(), "hunter2");
//! ```

use std::fmt;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use conflux_core::DecryptionKey;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// HKDF context for value key derivation.
const CONTEXT_VALUE_KEY: &[u8] = b"conflux/value/v1";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

const MARKER_PREFIX: &str = "ENC(";
const MARKER_SUFFIX: &str = ")";

/// Errors from encrypting or decrypting a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The ciphertext is not valid base64.
    #[error("ciphertext is not valid base64")]
    Encoding,

    /// The decoded ciphertext is shorter than salt, nonce and tag.
    #[error("ciphertext is truncated ({0} bytes)")]
    Truncated(usize),

    /// Authentication failed; wrong key or tampered value.
    #[error("authentication failed (wrong key or corrupted value)")]
    Authentication,

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,

    /// Key derivation or sealing failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The value is encrypted but no key is configured.
    #[error("no decryption key is configured")]
    MissingKey,
}

/// Returns the ciphertext inside `ENC(...)`, or `None` for plain values.
#[must_use]
pub fn unwrap_marker(value: &str) -> Option<&str> {
    value
        .trim()
        .strip_prefix(MARKER_PREFIX)?
        .strip_suffix(MARKER_SUFFIX)
}

/// Wraps ciphertext as `ENC(...)`.
#[must_use]
pub fn wrap_marker(ciphertext: &str) -> String {
    format!("{MARKER_PREFIX}{ciphertext}{MARKER_SUFFIX}")
}

/// Returns what `value` reads back as under `key`.
///
/// `ENC(...)` values are decrypted; anything else is returned unchanged.
///
/// # Errors
///
/// Returns `CryptoError::MissingKey` for a wrapped value when `key` is
/// undefined, or the decryption error if it does not decrypt.
pub fn reveal(key: &DecryptionKey, value: &str) -> Result<String, CryptoError> {
    let Some(ciphertext) = unwrap_marker(value) else {
        return Ok(value.to_string());
    };
    ValueCipher::from_key(key)
        .ok_or(CryptoError::MissingKey)?
        .decrypt(ciphertext)
}

/// Encrypts `plaintext` under `secret` and wraps it as `ENC(...)`.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if key derivation or sealing fails.
pub fn encrypt_value(secret: &str, plaintext: &str) -> Result<String, CryptoError> {
    ValueCipher::new(secret).encrypt_wrapped(plaintext)
}

/// Password-based value cipher.
pub struct ValueCipher {
    secret: String,
}

impl ValueCipher {
    /// Creates a cipher from a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Creates a cipher if the key is defined.
    #[must_use]
    pub fn from_key(key: &DecryptionKey) -> Option<Self> {
        key.expose_secret().map(Self::new)
    }

    /// Encrypts `plaintext`, returning bare base64 ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if key derivation or sealing fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = self.cipher(&salt)?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);

        Ok(STANDARD_NO_PAD.encode(blob))
    }

    /// Encrypts `plaintext` and wraps it as `ENC(...)`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if key derivation or sealing fails.
    pub fn encrypt_wrapped(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.encrypt(plaintext).map(|ciphertext| wrap_marker(&ciphertext))
    }

    /// Decrypts bare base64 ciphertext (without the `ENC(...)` wrapper).
    ///
    /// # Errors
    ///
    /// Fails if the text is not base64, is truncated, does not authenticate
    /// under this key, or does not decrypt to UTF-8.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let blob = STANDARD_NO_PAD
            .decode(ciphertext.trim().trim_end_matches('='))
            .map_err(|_| CryptoError::Encoding)?;

        if blob.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Truncated(blob.len()));
        }

        let (salt, rest) = blob.split_at(SALT_LEN);
        let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);

        let plaintext = self
            .cipher(salt)?
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CryptoError::Authentication)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    fn cipher(&self, salt: &[u8]) -> Result<ChaCha20Poly1305, CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(salt), self.secret.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(CONTEXT_VALUE_KEY, &mut key)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
    }
}

impl fmt::Debug for ValueCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCipher")
            .field("secret", &"<redacted>")
            .finish()
    }
}
