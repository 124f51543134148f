//! pdc-aead: ChaCha20-Poly1305 (RFC 7539)
//!
//! The context enforces the order in which the MAC input is laid out:
//!
//! ```text
//! new ──► SetNonce ──set_nonce──► Aad ──encrypt──► Encrypt ──finalize──► Final
//!            ▲                     │ └──decrypt──► Decrypt ──verify────►   │
//!            │                     └──────────finalize / verify──────────► │
//!            └────────────────────────────── reset ◄──────────────────────┘
//! ```
//!
//! Poly1305 input: `AAD ‖ pad16 ‖ ciphertext ‖ pad16 ‖ le64(len AAD) ‖ le64(len ciphertext)`.

pub mod chachapoly;

pub use chachapoly::{
    decrypt_oneshot, encrypt_oneshot, AeadState, ChaChaPoly, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
    TEXT_MAX_BYTES,
};
