//! HKDF (RFC 5869).

use ::hkdf::SimpleHkdf;
use hmac::digest::{core_api::BlockSizeUser, Digest};
use pdc_core::{DigestAlgorithm, PdcError, PdcResult};
use zeroize::{Zeroize, Zeroizing};

use crate::MAX_DIGEST_SIZE;

fn extract_with<D>(salt: &[u8], ikm: &[u8], prk: &mut [u8]) -> PdcResult<usize>
where
    D: Digest + BlockSizeUser + Clone,
{
    let len = <D as Digest>::output_size();
    if prk.len() < len {
        return Err(PdcError::invalid(format!(
            "hkdf: prk buffer holds {} bytes, digest needs {len}",
            prk.len()
        )));
    }
    // an absent salt is HashLen zero bytes
    let salt = (!salt.is_empty()).then_some(salt);
    let (mut out, _) = SimpleHkdf::<D>::extract(salt, ikm);
    prk[..len].copy_from_slice(&out);
    out.as_mut_slice().zeroize();
    Ok(len)
}

fn expand_with<D>(prk: &[u8], info: &[u8], okm: &mut [u8]) -> PdcResult<()>
where
    D: Digest + BlockSizeUser + Clone,
{
    let len = <D as Digest>::output_size();
    let hk = SimpleHkdf::<D>::from_prk(prk).map_err(|_| {
        PdcError::invalid(format!(
            "hkdf: prk is {} bytes, digest needs at least {len}",
            prk.len()
        ))
    })?;
    hk.expand(info, okm).map_err(|_| {
        PdcError::invalid(format!(
            "hkdf: {} output bytes requested, at most {} allowed",
            okm.len(),
            255 * len
        ))
    })
}

/// HKDF-Extract. Writes the pseudorandom key to the front of `prk` and
/// returns its length (the digest size).
pub fn extract(
    digest: DigestAlgorithm,
    salt: &[u8],
    ikm: &[u8],
    prk: &mut [u8],
) -> PdcResult<usize> {
    crate::with_digest!(digest, extract_with(salt, ikm, prk))
}

/// HKDF-Expand. `okm` may be at most 255 digest lengths.
pub fn expand(digest: DigestAlgorithm, prk: &[u8], info: &[u8], okm: &mut [u8]) -> PdcResult<()> {
    crate::with_digest!(digest, expand_with(prk, info, okm))
}

/// Extract then expand. The intermediate key never leaves this function.
pub fn hkdf(
    digest: DigestAlgorithm,
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
    okm: &mut [u8],
) -> PdcResult<()> {
    let mut prk = Zeroizing::new([0u8; MAX_DIGEST_SIZE]);
    let len = extract(digest, salt, ikm, &mut prk[..])?;
    expand(digest, &prk[..len], info, okm)
}
