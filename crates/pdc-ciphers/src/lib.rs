//! pdc-ciphers: block-cipher capabilities for the pdc mode layer
//!
//! Each capability is a zero-sized descriptor pairing an algorithm with a
//! direction. The descriptors are `Copy` and can live in `const`s, so mode
//! descriptors built from them need no allocation.
//!
//! ```text
//! Aes / Ecb<C>            static dispatch, algorithm fixed at compile time
//! AnyCipher               runtime selection (enum of algorithms, enum of key schedules)
//! ```

pub mod aes;
pub mod any;
pub mod ecb;

pub use crate::aes::{Aes, AesKey, AES_DECRYPT, AES_ENCRYPT};
pub use any::{Algorithm, AnyCipher, AnyKey};
pub use ecb::{
    Blowfish, Des, Ecb, TripleDes2, TripleDes3, BLOWFISH_DECRYPT, BLOWFISH_ENCRYPT, DES_DECRYPT,
    DES_ENCRYPT, TDES2_DECRYPT, TDES2_ENCRYPT, TDES3_DECRYPT, TDES3_ENCRYPT,
};
