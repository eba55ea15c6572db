//! Reading back encrypted records.
//!
//! Keyword logs are decrypted line by line. A line that fails to decrypt is
//! reported on its own and does not stop the rest of the file from being
//! read.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::keystore::KeyStore;

/// One line of a decrypted keyword log.
#[derive(Debug)]
pub struct KeywordLine {
    /// 1-based line number in the encrypted file.
    pub line_number: usize,
    /// The plaintext, or why this line could not be decrypted.
    pub text: Result<String>,
}

/// Decrypt every record in the keyword log at `path`.
///
/// Blank lines are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read. Per-line failures are
/// reported in [`KeywordLine::text`].
pub fn decrypt_keyword_log(keys: &KeyStore, path: &Path) -> Result<Vec<KeywordLine>> {
    let raw = fs::read(path)?;

    Ok(raw
        .split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .map(|(idx, line)| KeywordLine {
            line_number: idx + 1,
            text: decrypt_line(keys, line),
        })
        .collect())
}

fn decrypt_line(keys: &KeyStore, line: &[u8]) -> Result<String> {
    let plain = keys.decrypt(line)?;
    let text = String::from_utf8(plain)
        .map_err(|_| Error::invalid_ciphertext("plaintext is not UTF-8"))?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

/// Decrypt the screenshot file at `path` back to image bytes.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not decrypt.
pub fn decrypt_screenshot(keys: &KeyStore, path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path)?;
    keys.decrypt(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::KEY_LEN;

    #[test]
    fn test_bad_line_does_not_stop_the_rest() {
        let keys = KeyStore::from_bytes(vec![9u8; KEY_LEN]);
        let other = KeyStore::from_bytes(vec![8u8; KEY_LEN]);

        let mut content = Vec::new();
        for (store, text) in [(&keys, "first"), (&other, "foreign"), (&keys, "third")] {
            content.extend(store.encrypt(text.as_bytes()).unwrap());
            content.push(b'\n');
        }
        content.extend_from_slice(b"not base64 at all!\n\n");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.log.enc");
        fs::write(&path, content).unwrap();

        let lines = decrypt_keyword_log(&keys, &path).unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].text.as_deref().unwrap(), "first");
        assert!(lines[1].text.as_ref().unwrap_err().is_invalid_ciphertext());
        assert_eq!(lines[2].text.as_deref().unwrap(), "third");
        assert_eq!(lines[3].line_number, 4);
        assert!(lines[3].text.is_err());
    }

    #[test]
    fn test_missing_log_is_an_error() {
        let keys = KeyStore::from_bytes(vec![9u8; KEY_LEN]);
        let dir = tempfile::tempdir().unwrap();
        assert!(decrypt_keyword_log(&keys, &dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_screenshot_wrong_key() {
        let keys = KeyStore::from_bytes(vec![9u8; KEY_LEN]);
        let other = KeyStore::from_bytes(vec![1u8; KEY_LEN]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png.enc");
        fs::write(&path, keys.encrypt(b"png").unwrap()).unwrap();

        assert_eq!(decrypt_screenshot(&keys, &path).unwrap(), b"png");
        assert!(decrypt_screenshot(&other, &path)
            .unwrap_err()
            .is_invalid_ciphertext());
    }
}
