//! Cryptographic primitives
//!
//! Symmetric only: every node and chunk is sealed with a 256-bit
//! ChaCha20-Poly1305 [`Secret`], and BLAKE3 drives the deterministic key
//! hierarchy.
//!
//! # Key Hierarchy
//!
//! ```text
//! wnfs key (caller material)
//!     |  derive_key
//!     v
//! root revision key k0 --ratchet--> k1 --ratchet--> k2 ...
//!     |
//!     +--derive_child("root")--> child revision key
//!                                    |
//!                                    +--derive_child("file.txt")--> ...
//! ```
//!
//! Parents keep each child's key inside their own ciphertext, so holding
//! one node's key grants access to its whole subtree and nothing above it.

mod secret;

pub use secret::{Secret, SecretError, BLAKE3_HASH_SIZE, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};
