//! Content encryption using ChaCha20-Poly1305
//!
//! Every encrypted node and file chunk is sealed with a [`Secret`]. Secrets
//! also act as key material for the deterministic key hierarchy:
//! - **Root keys** come from caller supplied material via [`Secret::from_key_material`]
//! - **Revision keys** are produced with [`Secret::ratchet`]
//! - **Child keys** are produced with [`Secret::derive_child`]

use std::fmt;
use std::ops::Deref;

use chacha20poly1305::Key;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Serialize};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of ChaCha20-Poly1305 key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of BLAKE3 hash in bytes (256 bits)
pub const BLAKE3_HASH_SIZE: usize = 32;
/// Size of the Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

const ROOT_KEY_CONTEXT: &str = "privfs 2024-06-01 root directory revision key";
const RATCHET_DOMAIN: &[u8] = b"privfs/ratchet";
const CHILD_DOMAIN: &[u8] = b"privfs/child";

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("invalid secret size, expected {SECRET_SIZE}, got {0}")]
    InvalidSize(usize),
    #[error("ciphertext too short: {0} bytes")]
    Truncated(usize),
    #[error("authentication failed: wrong key or tampered ciphertext")]
    Authentication,
    #[error("hash verification failed - data corrupted")]
    HashMismatch,
}

/// A 256-bit symmetric key
///
/// The encrypted format is: `nonce (12 bytes) || encrypted(hash(32 bytes) || plaintext) || tag (16 bytes)`.
/// The BLAKE3 hash of the plaintext is sealed along with the data and checked on
/// decryption, so a ciphertext that authenticates but carries a bad payload is
/// still rejected.
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate();
/// let ciphertext = secret.encrypt(b"sensitive data")?;
/// let recovered = secret.decrypt(&ciphertext)?;
/// assert_eq!(b"sensitive data", &recovered[..]);
/// ```
#[derive(PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Secret([u8; SECRET_SIZE]);

// Key bytes never show up in logs or panic messages
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl Default for Secret {
    fn default() -> Self {
        Secret([0; SECRET_SIZE])
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using a cryptographically secure RNG
    pub fn generate() -> Result<Self, SecretError> {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
        Ok(Self(buff))
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        if data.len() != SECRET_SIZE {
            return Err(SecretError::InvalidSize(data.len()));
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Derive the first revision key of a root directory from caller supplied
    /// key material of any length.
    pub fn from_key_material(material: &[u8]) -> Self {
        Self(blake3::derive_key(ROOT_KEY_CONTEXT, material))
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Keyed BLAKE3 over a domain tag and a length-prefixed input
    pub(crate) fn keyed_hash(&self, domain: &[u8], input: &[u8]) -> [u8; BLAKE3_HASH_SIZE] {
        let mut hasher = blake3::Hasher::new_keyed(&self.0);
        hasher.update(&(domain.len() as u64).to_le_bytes());
        hasher.update(domain);
        hasher.update(&(input.len() as u64).to_le_bytes());
        hasher.update(input);
        *hasher.finalize().as_bytes()
    }

    /// The key of the next revision of the node this key belongs to
    pub fn ratchet(&self) -> Self {
        Self(self.keyed_hash(RATCHET_DOMAIN, &[]))
    }

    /// The key of a child written under `segment` by a parent holding this key
    pub fn derive_child(&self, segment: &str) -> Self {
        Self(self.keyed_hash(CHILD_DOMAIN, segment.as_bytes()))
    }

    /// Encrypt data using ChaCha20-Poly1305 AEAD
    ///
    /// A BLAKE3 hash of the plaintext is computed and prepended to the data before encryption.
    /// A random nonce is generated for each encryption operation.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let plaintext_hash = blake3::hash(data);

        let mut data_with_hash = Vec::with_capacity(BLAKE3_HASH_SIZE + data.len());
        data_with_hash.extend_from_slice(plaintext_hash.as_bytes());
        data_with_hash.extend_from_slice(data);

        let key = Key::from_slice(self.bytes());
        let cipher = ChaCha20Poly1305::new(key);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, data_with_hash.as_ref())
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(ciphertext.as_ref());

        Ok(out)
    }

    /// Decrypt data using ChaCha20-Poly1305 AEAD
    ///
    /// Returns only the plaintext (hash is stripped but verified for integrity).
    ///
    /// # Errors
    ///
    /// - `Truncated` if the data cannot hold a nonce and a tag
    /// - `Authentication` if the tag does not verify (tampering or wrong key)
    /// - `HashMismatch` if the sealed plaintext hash does not match
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SecretError::Truncated(data.len()));
        }

        let key = Key::from_slice(self.bytes());
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let cipher = ChaCha20Poly1305::new(key);
        let decrypted = cipher
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| SecretError::Authentication)?;

        if decrypted.len() < BLAKE3_HASH_SIZE {
            return Err(SecretError::HashMismatch);
        }

        let stored_hash = &decrypted[..BLAKE3_HASH_SIZE];
        let plaintext = &decrypted[BLAKE3_HASH_SIZE..];

        let computed_hash = blake3::hash(plaintext);
        if stored_hash != computed_hash.as_bytes() {
            return Err(SecretError::HashMismatch);
        }

        Ok(plaintext.to_vec())
    }
}
