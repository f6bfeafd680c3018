use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::TokenStoreError;

const NONCE_LEN: usize = 12;

/// AES-256-GCM encryption for tokens at rest.
///
/// The key is the SHA-256 digest of a passphrase. Output is
/// `base64(nonce || ciphertext)` with a fresh random nonce per message.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn from_passphrase(passphrase: &str) -> Result<Self, TokenStoreError> {
        let key = Sha256::digest(passphrase.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|error| TokenStoreError::Encrypt(error.to_string()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, TokenStoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|error| TokenStoreError::Encrypt(error.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(nonce.as_slice());
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, TokenStoreError> {
        let payload = BASE64
            .decode(encoded.trim())
            .map_err(|error| TokenStoreError::Decrypt(format!("invalid base64: {error}")))?;
        if payload.len() <= NONCE_LEN {
            return Err(TokenStoreError::Decrypt(String::from(
                "ciphertext is truncated",
            )));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                TokenStoreError::Decrypt(String::from(
                    "authentication failed (wrong key or tampered data)",
                ))
            })
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher(AES-256-GCM)")
    }
}
