//! RFC 3394 AES key wrap.
//!
//! Works on 64-bit semiblocks over a 128-bit block cipher in ECB:
//!
//! ```text
//! wrap:    A = IV, R[1..n] = key
//!          for j in 0..6, i in 1..=n:
//!              B = E(A || R[i]);  A = MSB64(B) ^ (n*j + i);  R[i] = LSB64(B)
//!          out = A || R[1..n]
//! unwrap:  the same schedule backwards with D, then A must equal the IV
//! ```

use pdc_core::{check_capability, BlockCipher, Direction, PdcError, PdcResult};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::engine::run_cipher;

pub const SEMIBLOCK: usize = 8;
/// RFC 3394 §2.2.3.1 default initial value.
pub const DEFAULT_IV: [u8; SEMIBLOCK] = [0xA6; SEMIBLOCK];
/// Exclusive upper bound on semiblocks per key.
pub const MAX_SEMIBLOCKS: usize = 1 << 20;

const ROUNDS: u64 = 6;

pub fn wrapped_size(key_len: usize) -> usize {
    key_len + SEMIBLOCK
}

pub fn unwrapped_size(wrapped_len: usize) -> usize {
    wrapped_len.saturating_sub(SEMIBLOCK)
}

fn check_args<C: BlockCipher>(
    cipher: &C,
    direction: Direction,
    key_len: usize,
    out_len: usize,
    out_needed: usize,
) -> PdcResult<()> {
    let label = match direction {
        Direction::Encrypt => "key wrap",
        Direction::Decrypt => "key unwrap",
    };
    check_capability(cipher, direction, label)?;
    if cipher.block_size() != 2 * SEMIBLOCK {
        return Err(PdcError::invalid(format!(
            "{label} needs a 16-byte block cipher, got {} bytes",
            cipher.block_size()
        )));
    }
    if key_len % SEMIBLOCK != 0 || key_len < 2 * SEMIBLOCK {
        return Err(PdcError::invalid(format!(
            "{label}: key of {key_len} bytes is not at least two whole semiblocks"
        )));
    }
    if key_len / SEMIBLOCK >= MAX_SEMIBLOCKS {
        return Err(PdcError::invalid(format!(
            "{label}: key of {key_len} bytes exceeds {MAX_SEMIBLOCKS} semiblocks"
        )));
    }
    if out_len < out_needed {
        return Err(PdcError::invalid(format!(
            "{label}: output needs {out_needed} bytes, got {out_len}"
        )));
    }
    Ok(())
}

fn xor_counter(a: &mut [u8], t: u64) {
    for (byte, c) in a.iter_mut().zip(t.to_be_bytes()) {
        *byte ^= c;
    }
}

/// Wrap `key` under the default IV. Returns the wrapped length.
pub fn wrap<C: BlockCipher>(
    cipher: &C,
    kek: &C::Context,
    key: &[u8],
    wrapped: &mut [u8],
) -> PdcResult<usize> {
    wrap_with_iv(cipher, kek, &DEFAULT_IV, key, wrapped)
}

pub fn wrap_with_iv<C: BlockCipher>(
    cipher: &C,
    kek: &C::Context,
    iv: &[u8; SEMIBLOCK],
    key: &[u8],
    wrapped: &mut [u8],
) -> PdcResult<usize> {
    let total = wrapped_size(key.len());
    check_args(cipher, Direction::Encrypt, key.len(), wrapped.len(), total)?;
    let n = key.len() / SEMIBLOCK;
    let out = &mut wrapped[..total];
    let (a, r) = out.split_at_mut(SEMIBLOCK);
    a.copy_from_slice(iv);
    r.copy_from_slice(key);

    let mut block = [0u8; 2 * SEMIBLOCK];
    let result = wrap_rounds(cipher, kek, n as u64, a, r, &mut block);
    block.zeroize();
    if let Err(e) = result {
        out.zeroize();
        return Err(e);
    }
    Ok(total)
}

fn wrap_rounds<C: BlockCipher>(
    cipher: &C,
    kek: &C::Context,
    n: u64,
    a: &mut [u8],
    r: &mut [u8],
    block: &mut [u8; 2 * SEMIBLOCK],
) -> PdcResult<()> {
    for j in 0..ROUNDS {
        for (i, ri) in r.chunks_exact_mut(SEMIBLOCK).enumerate() {
            block[..SEMIBLOCK].copy_from_slice(a);
            block[SEMIBLOCK..].copy_from_slice(ri);
            run_cipher(cipher, kek, block)?;
            a.copy_from_slice(&block[..SEMIBLOCK]);
            xor_counter(a, n * j + i as u64 + 1);
            ri.copy_from_slice(&block[SEMIBLOCK..]);
        }
    }
    Ok(())
}

/// Unwrap under the default IV. Returns the key length.
pub fn unwrap<C: BlockCipher>(
    cipher: &C,
    kek: &C::Context,
    wrapped: &[u8],
    key: &mut [u8],
) -> PdcResult<usize> {
    unwrap_with_iv(cipher, kek, &DEFAULT_IV, wrapped, key)
}

/// Unwrap and check the integrity value against `iv` in constant time. On
/// mismatch `key` is wiped and `AuthenticationFailure` is returned.
pub fn unwrap_with_iv<C: BlockCipher>(
    cipher: &C,
    kek: &C::Context,
    iv: &[u8; SEMIBLOCK],
    wrapped: &[u8],
    key: &mut [u8],
) -> PdcResult<usize> {
    if wrapped.len() < SEMIBLOCK {
        return Err(PdcError::invalid(format!(
            "key unwrap: {} bytes is shorter than one semiblock",
            wrapped.len()
        )));
    }
    let key_len = unwrapped_size(wrapped.len());
    check_args(cipher, Direction::Decrypt, key_len, key.len(), key_len)?;
    let n = key_len / SEMIBLOCK;
    let r = &mut key[..key_len];
    let mut a = [0u8; SEMIBLOCK];
    a.copy_from_slice(&wrapped[..SEMIBLOCK]);
    r.copy_from_slice(&wrapped[SEMIBLOCK..]);

    let mut block = [0u8; 2 * SEMIBLOCK];
    let result = unwrap_rounds(cipher, kek, n as u64, &mut a, r, &mut block);
    block.zeroize();
    if let Err(e) = result {
        r.zeroize();
        return Err(e);
    }

    if bool::from(a[..].ct_eq(&iv[..])) {
        Ok(key_len)
    } else {
        r.zeroize();
        tracing::debug!(wrapped_len = wrapped.len(), "key unwrap integrity check failed");
        Err(PdcError::AuthenticationFailure)
    }
}

fn unwrap_rounds<C: BlockCipher>(
    cipher: &C,
    kek: &C::Context,
    n: u64,
    a: &mut [u8; SEMIBLOCK],
    r: &mut [u8],
    block: &mut [u8; 2 * SEMIBLOCK],
) -> PdcResult<()> {
    for j in (0..ROUNDS).rev() {
        for (i, ri) in r.chunks_exact_mut(SEMIBLOCK).enumerate().rev() {
            xor_counter(a, n * j + i as u64 + 1);
            block[..SEMIBLOCK].copy_from_slice(&a[..]);
            block[SEMIBLOCK..].copy_from_slice(ri);
            run_cipher(cipher, kek, block)?;
            a.copy_from_slice(&block[..SEMIBLOCK]);
            ri.copy_from_slice(&block[SEMIBLOCK..]);
        }
    }
    Ok(())
}
