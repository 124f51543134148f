//! pdc-kdf: key derivation over a configurable digest
//!
//! - `hkdf`: RFC 5869 extract / expand
//! - `pbkdf2`: RFC 8018 PBKDF2 with HMAC as the PRF
//!
//! The digest is picked at runtime with [`DigestAlgorithm`]; each entry point
//! dispatches to a monomorphised implementation.

/// Run `$f::<Digest>($args...)` for the digest named by `$alg`.
macro_rules! with_digest {
    ($alg:expr, $f:ident($($arg:expr),* $(,)?)) => {
        match $alg {
            ::pdc_core::DigestAlgorithm::Sha1 => $f::<::sha1::Sha1>($($arg),*),
            ::pdc_core::DigestAlgorithm::Sha224 => $f::<::sha2::Sha224>($($arg),*),
            ::pdc_core::DigestAlgorithm::Sha256 => $f::<::sha2::Sha256>($($arg),*),
            ::pdc_core::DigestAlgorithm::Sha384 => $f::<::sha2::Sha384>($($arg),*),
            ::pdc_core::DigestAlgorithm::Sha512 => $f::<::sha2::Sha512>($($arg),*),
        }
    };
}
pub(crate) use with_digest;

pub mod hkdf;
pub mod pbkdf2;

pub use self::hkdf::{expand, extract, hkdf};
pub use self::pbkdf2::{derive_key, pbkdf2_hmac, Pbkdf2Params};
pub use pdc_core::DigestAlgorithm;

/// Largest digest output any [`DigestAlgorithm`] produces.
pub const MAX_DIGEST_SIZE: usize = 64;
