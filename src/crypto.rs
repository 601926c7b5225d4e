use openssl::symm::{decrypt_aead, Cipher};
use thiserror::Error;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Decryption failed: {0}")]
    DecryptFailed(#[from] openssl::error::ErrorStack),
    #[error("Decrypted value is not UTF-8")]
    NotUtf8,
}

pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}

/// AES-256-GCM over values stored as `hex(iv):hex(tag):hex(ciphertext)`.
pub struct AesGcmDecryptor {
    key: Vec<u8>,
}

impl AesGcmDecryptor {
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CryptoError> {
        let key = hex::decode(hex_key.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        Ok(Self { key })
    }
}

impl Decryptor for AesGcmDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let mut parts = ciphertext.trim().split(':');
        let (iv, tag, data) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(iv), Some(tag), Some(data), None) => (iv, tag, data),
            _ => return Err(CryptoError::Malformed("expected iv:tag:data".to_string())),
        };

        let iv = hex::decode(iv).map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let tag = hex::decode(tag).map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let data = hex::decode(data).map_err(|e| CryptoError::Malformed(e.to_string()))?;

        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(CryptoError::Malformed("bad iv or tag length".to_string()));
        }

        let plain = decrypt_aead(Cipher::aes_256_gcm(), &self.key, Some(iv.as_slice()), &[], &data, &tag)?;
        String::from_utf8(plain).map_err(|_| CryptoError::NotUtf8)
    }
}
