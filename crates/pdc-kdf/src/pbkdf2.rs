//! PBKDF2 (RFC 8018 §5.2) with HMAC over the selected digest.

use hmac::digest::{core_api::BlockSizeUser, Digest, KeyInit};
use hmac::{Mac, SimpleHmac};
use pdc_core::bytes::xor_in_place;
use pdc_core::{DigestAlgorithm, KdfConfig, PdcError, PdcResult};
use zeroize::Zeroize;

/// PBKDF2 parameters, usually taken from the `[kdf]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pbkdf2Params {
    pub digest: DigestAlgorithm,
    pub iterations: u32,
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self::from(&KdfConfig::default())
    }
}

impl From<&KdfConfig> for Pbkdf2Params {
    fn from(config: &KdfConfig) -> Self {
        Self {
            digest: config.digest,
            iterations: config.pbkdf2_iterations,
        }
    }
}

/// Reject lengths PBKDF2 cannot produce: the block index is a 32-bit counter.
fn check_dk_len(dk_len: usize, hash_len: usize) -> PdcResult<()> {
    if dk_len == 0 {
        return Err(PdcError::invalid("pbkdf2: derived key length must be non-zero"));
    }
    let max = u64::from(u32::MAX) * hash_len as u64;
    if dk_len as u64 > max {
        return Err(PdcError::Overflow(format!(
            "pbkdf2: {dk_len} bytes requested, at most {max} allowed"
        )));
    }
    Ok(())
}

fn pbkdf2_with<D>(password: &[u8], salt: &[u8], iterations: u32, dk: &mut [u8]) -> PdcResult<()>
where
    D: Digest + BlockSizeUser + Clone,
{
    let hash_len = <D as Digest>::output_size();
    check_dk_len(dk.len(), hash_len)?;

    let prf = <SimpleHmac<D> as KeyInit>::new_from_slice(password)
        .map_err(|e| PdcError::Internal(format!("pbkdf2: hmac key: {e}")))?;

    for (index, chunk) in (1u32..).zip(dk.chunks_mut(hash_len)) {
        let mut mac = prf.clone();
        mac.update(salt);
        mac.update(&index.to_be_bytes());
        let mut u = mac.finalize().into_bytes();
        let mut t = u.clone();
        for _ in 1..iterations {
            let mut mac = prf.clone();
            mac.update(&u);
            u.as_mut_slice().zeroize();
            u = mac.finalize().into_bytes();
            xor_in_place(&mut t, &u);
        }
        chunk.copy_from_slice(&t[..chunk.len()]);
        u.as_mut_slice().zeroize();
        t.as_mut_slice().zeroize();
    }
    Ok(())
}

/// Derive `dk.len()` bytes from `password` and `salt`.
///
/// `iterations` must be at least 1. An output longer than
/// `(2^32 - 1) * HashLen` is an [`PdcError::Overflow`].
pub fn pbkdf2_hmac(
    digest: DigestAlgorithm,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    dk: &mut [u8],
) -> PdcResult<()> {
    if iterations == 0 {
        return Err(PdcError::invalid("pbkdf2: iteration count must be at least 1"));
    }
    tracing::trace!(?digest, iterations, len = dk.len(), "pbkdf2 derive");
    crate::with_digest!(digest, pbkdf2_with(password, salt, iterations, dk))
}

pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &Pbkdf2Params,
    dk: &mut [u8],
) -> PdcResult<()> {
    pbkdf2_hmac(params.digest, password, salt, params.iterations, dk)
}
