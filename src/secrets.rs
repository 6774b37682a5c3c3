//! Symmetric encryption for the free-text secret users store at registration.
//!
//! The AES-256-GCM key lives in a single hex-encoded key file. It is generated on
//! first start and loaded afterwards. Losing the file makes every stored secret
//! unrecoverable; nothing here tries to prevent that.

use crate::errors::DashError;
use crate::settings::Keys;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Load the key file named in `cfg`, generating and persisting a fresh key if it is missing.
    pub fn load_or_generate(cfg: &Keys) -> Result<Self, DashError> {
        let key_path = &cfg.secret_key_path;
        if let Some(parent) = key_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let key = if key_path.exists() {
            let key = read_key(key_path)?;
            tracing::info!(path = %key_path.display(), "Loaded encryption key");
            key
        } else {
            let mut key = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut key);
            write_key(key_path, &key)?;
            tracing::info!(path = %key_path.display(), "Generated new encryption key");
            key
        };

        Self::from_key(&key)
    }

    pub fn from_key(key: &[u8; KEY_LEN]) -> Result<Self, DashError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| DashError::Crypto(format!("Failed to create cipher: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext`. Output is `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, DashError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| DashError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<String, DashError> {
        if blob.len() < NONCE_LEN {
            return Err(DashError::Crypto(format!(
                "Encrypted value too short: {} bytes",
                blob.len()
            )));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| DashError::Crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| DashError::Crypto(format!("Decrypted value is not UTF-8: {}", e)))
    }
}

fn read_key(path: &Path) -> Result<[u8; KEY_LEN], DashError> {
    let hex_key = fs::read_to_string(path)?;
    let bytes = hex::decode(hex_key.trim())?;
    if bytes.len() != KEY_LEN {
        return Err(DashError::Crypto(format!(
            "Invalid key file at {}: expected {} bytes, got {}",
            path.display(),
            KEY_LEN,
            bytes.len()
        )));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn write_key(path: &Path, key: &[u8; KEY_LEN]) -> Result<(), DashError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(hex::encode(key).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys_in(dir: &TempDir) -> Keys {
        Keys {
            secret_key_path: dir.path().join("keys").join("encryption.key"),
        }
    }

    #[test]
    fn test_generates_key_file_once() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let keys = keys_in(&dir);

        let first = SecretCipher::load_or_generate(&keys).expect("Failed to generate key");
        let on_disk = fs::read_to_string(&keys.secret_key_path).expect("Key file missing");
        assert_eq!(on_disk.len(), KEY_LEN * 2);

        let second = SecretCipher::load_or_generate(&keys).expect("Failed to load key");
        assert_eq!(
            fs::read_to_string(&keys.secret_key_path).unwrap(),
            on_disk,
            "Existing key must not be replaced"
        );

        let blob = first.encrypt("launch codes").unwrap();
        assert_eq!(second.decrypt(&blob).unwrap(), "launch codes");
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("Failed to create temp dir");
        let keys = keys_in(&dir);
        SecretCipher::load_or_generate(&keys).expect("Failed to generate key");

        let mode = fs::metadata(&keys.secret_key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_rejects_malformed_key_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let keys = keys_in(&dir);
        fs::create_dir_all(keys.secret_key_path.parent().unwrap()).unwrap();

        fs::write(&keys.secret_key_path, "abcd").unwrap();
        assert!(matches!(
            SecretCipher::load_or_generate(&keys),
            Err(DashError::Crypto(_))
        ));

        fs::write(&keys.secret_key_path, "not hex at all").unwrap();
        assert!(matches!(
            SecretCipher::load_or_generate(&keys),
            Err(DashError::Crypto(_))
        ));
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = SecretCipher::from_key(&[7u8; KEY_LEN]).unwrap();
        let a = cipher.encrypt("same text").unwrap();
        let b = cipher.encrypt("same text").unwrap();

        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), "same text");
        assert_eq!(cipher.decrypt(&b).unwrap(), "same text");
    }

    #[test]
    fn test_wrong_key_or_tampering_fails() {
        let cipher = SecretCipher::from_key(&[1u8; KEY_LEN]).unwrap();
        let other = SecretCipher::from_key(&[2u8; KEY_LEN]).unwrap();
        let mut blob = cipher.encrypt("secret").unwrap();

        assert!(other.decrypt(&blob).is_err());

        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(cipher.decrypt(&blob).is_err());
        assert!(cipher.decrypt(&[0u8; 4]).is_err());
    }
}
