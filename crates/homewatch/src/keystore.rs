//! Encryption key lifecycle and record encryption.
//!
//! One key exists per installation. It is generated on first run, written
//! with owner-only permissions, and loaded unchanged on every later start.
//! A key file that exists but cannot be read is fatal; it is never replaced,
//! since a fresh key would orphan everything already written.
//!
//! Records are `base64url(version || nonce || ciphertext+tag)` using
//! XChaCha20-Poly1305 with a random 24-byte nonce per record.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Length of the symmetric key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the per-record nonce in bytes.
const NONCE_LEN: usize = 24;

/// Length of the Poly1305 authentication tag in bytes.
const TAG_LEN: usize = 16;

/// Format version stored as the first byte of every record.
const RECORD_VERSION: u8 = 1;

/// Holds the installation key and encrypts/decrypts records with it.
///
/// The key is read-only after construction and can be shared across tasks
/// behind an `Arc` without locking.
pub struct KeyStore {
    path: PathBuf,
    key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("path", &self.path)
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Load the key at `key_path`, generating it on first run.
    ///
    /// An existing file is read as-is; whether its bytes form a usable key is
    /// discovered on first use (see [`KeyStore::verify`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFile`] if the key cannot be read, or if a new key
    /// cannot be written.
    pub fn open(key_path: impl AsRef<Path>) -> Result<Self> {
        let path = key_path.as_ref().to_path_buf();

        if path.exists() {
            let key = fs::read(&path).map_err(|source| Error::KeyFile {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "Loaded encryption key");
            return Ok(Self {
                path,
                key: Zeroizing::new(key),
            });
        }

        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key);
        write_key_file(&path, &key)?;
        info!(path = %path.display(), "Generated new encryption key");

        Ok(Self { path, key })
    }

    /// Build a key store from raw key bytes without touching the filesystem.
    #[must_use]
    pub fn from_bytes(key: Vec<u8>) -> Self {
        Self {
            path: PathBuf::new(),
            key: Zeroizing::new(key),
        }
    }

    /// Path the key was loaded from (empty for in-memory keys).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short BLAKE3 fingerprint identifying the key without revealing it.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.key).to_hex()[..16].to_string()
    }

    /// Encrypt `plaintext` into a single self-contained record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the loaded key has the wrong length.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| Error::internal("record encryption failed"))?;

        let mut raw = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        raw.push(RECORD_VERSION);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);

        Ok(URL_SAFE.encode(raw).into_bytes())
    }

    /// Decrypt a record produced by [`KeyStore::encrypt`].
    ///
    /// Surrounding ASCII whitespace is ignored so a log line can be passed
    /// with its separator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCiphertext`] if the record is malformed,
    /// truncated, tampered with, or sealed under a different key, and
    /// [`Error::InvalidKey`] if the loaded key has the wrong length.
    pub fn decrypt(&self, record: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;

        let raw = URL_SAFE
            .decode(trim_record(record))
            .map_err(|e| Error::invalid_ciphertext(format!("malformed encoding: {e}")))?;

        if raw.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(Error::invalid_ciphertext(format!(
                "record too short ({} bytes)",
                raw.len()
            )));
        }

        let (version, rest) = raw.split_at(1);
        if version[0] != RECORD_VERSION {
            return Err(Error::invalid_ciphertext(format!(
                "unknown record version {}",
                version[0]
            )));
        }

        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| Error::invalid_ciphertext("authentication failed"))
    }

    /// Encrypt and decrypt a probe to prove the key is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the key has the wrong length.
    pub fn verify(&self) -> Result<()> {
        const PROBE: &[u8] = b"homewatch-key-probe";
        let record = self.encrypt(PROBE)?;
        if self.decrypt(&record)? == PROBE {
            Ok(())
        } else {
            Err(Error::internal("key probe round trip mismatch"))
        }
    }

    fn cipher(&self) -> Result<XChaCha20Poly1305> {
        if self.key.len() != KEY_LEN {
            return Err(Error::InvalidKey {
                expected: KEY_LEN,
                found: self.key.len(),
            });
        }
        Ok(XChaCha20Poly1305::new(Key::from_slice(&self.key)))
    }
}

fn trim_record(record: &[u8]) -> &[u8] {
    let start = record
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(record.len());
    let end = record
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &record[start..end]
}

fn write_key_file(path: &Path, key: &[u8]) -> Result<()> {
    let key_err = |source| Error::KeyFile {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(key_err)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(key_err)?;
    file.write_all(key).map_err(key_err)?;
    file.sync_all().map_err(key_err)?;
    Ok(())
}
