//! PKCS#7 padding over ECB and CBC.
//!
//! The pad byte equals the pad length (1..=block size) and is repeated across
//! the pad. A full block of padding is added when the input is already
//! block-aligned, so the padded length is always
//! `(len / block_size + 1) * block_size`.

use pdc_core::{BlockCipher, Direction, PdcError, PdcResult};
use subtle::{ConstantTimeEq, ConstantTimeGreater, ConstantTimeLess};
use zeroize::Zeroize;

use crate::engine::{run_cipher, ModeContext};
use crate::factory::ModeKind;

/// Ciphertext length for `len` bytes of plaintext.
pub fn padded_size(block_size: usize, len: usize) -> usize {
    (len / block_size + 1) * block_size
}

/// Validate the padding of a decrypted final block and return the pad
/// length.
///
/// Every byte of `last_block` is inspected regardless of the pad value, so
/// timing does not depend on where the padding goes wrong.
pub fn pkcs7_decode(last_block: &[u8]) -> PdcResult<usize> {
    let block_size = last_block.len();
    if block_size == 0 || block_size > usize::from(u8::MAX) {
        return Err(PdcError::invalid(format!(
            "pkcs7: unsupported block size {block_size}"
        )));
    }
    let pad = last_block[block_size - 1];
    let mut valid = !pad.ct_eq(&0) & !pad.ct_gt(&(block_size as u8));
    for (i, byte) in last_block.iter().rev().enumerate() {
        let in_pad = (i as u8).ct_lt(&pad);
        valid &= !in_pad | byte.ct_eq(&pad);
    }
    if bool::from(valid) {
        Ok(usize::from(pad))
    } else {
        Err(PdcError::InvalidPadding)
    }
}

/// Copy the trailing partial block of `input` into `out` and fill the rest
/// with the pad byte. Returns the offset where the final block starts.
fn pad_into(block_size: usize, input: &[u8], out: &mut [u8]) -> usize {
    let full = input.len() / block_size * block_size;
    let remaining = input.len() - full;
    let pad = block_size - remaining;
    out[..full].copy_from_slice(&input[..full]);
    out[full..full + remaining].copy_from_slice(&input[full..]);
    out[full + remaining..full + block_size].fill(pad as u8);
    full
}

fn check_output(construct: &str, needed: usize, available: usize) -> PdcResult<()> {
    if available < needed {
        return Err(PdcError::invalid(format!(
            "{construct}: output needs {needed} bytes, got {available}"
        )));
    }
    Ok(())
}

fn check_ciphertext(construct: &str, block_size: usize, len: usize) -> PdcResult<()> {
    if len == 0 || len % block_size != 0 {
        return Err(PdcError::invalid(format!(
            "{construct}: ciphertext of {len} bytes is not a non-empty whole number of {block_size}-byte blocks"
        )));
    }
    Ok(())
}

/// Strip and check padding from decrypted `out[..len]`, zeroing it on failure.
fn unpad(out: &mut [u8], len: usize, block_size: usize) -> PdcResult<usize> {
    match pkcs7_decode(&out[len - block_size..len]) {
        Ok(pad) => Ok(len - pad),
        Err(e) => {
            out[..len].zeroize();
            Err(e)
        }
    }
}

/// Pad and encrypt `input` with a bare ECB capability. Returns the number of
/// bytes written.
pub fn pkcs7_ecb_encrypt<C: BlockCipher>(
    cipher: &C,
    schedule: &C::Context,
    input: &[u8],
    output: &mut [u8],
) -> PdcResult<usize> {
    pdc_core::check_capability(cipher, Direction::Encrypt, "pkcs7-ecb-encrypt")?;
    let bs = cipher.block_size();
    let total = padded_size(bs, input.len());
    check_output("pkcs7-ecb-encrypt", total, output.len())?;
    pad_into(bs, input, output);
    run_cipher(cipher, schedule, &mut output[..total])?;
    Ok(total)
}

/// Decrypt with a bare ECB capability and strip the padding. Returns the
/// plaintext length.
pub fn pkcs7_ecb_decrypt<C: BlockCipher>(
    cipher: &C,
    schedule: &C::Context,
    input: &[u8],
    output: &mut [u8],
) -> PdcResult<usize> {
    pdc_core::check_capability(cipher, Direction::Decrypt, "pkcs7-ecb-decrypt")?;
    let bs = cipher.block_size();
    check_ciphertext("pkcs7-ecb-decrypt", bs, input.len())?;
    check_output("pkcs7-ecb-decrypt", input.len(), output.len())?;
    let out = &mut output[..input.len()];
    out.copy_from_slice(input);
    run_cipher(cipher, schedule, out)?;
    unpad(output, input.len(), bs)
}

fn check_cbc<C: BlockCipher>(ctx: &ModeContext<C>, direction: Direction) -> PdcResult<()> {
    if ctx.kind() != ModeKind::Cbc || ctx.direction() != direction {
        return Err(PdcError::invalid(format!(
            "pkcs7 needs a cbc-{direction} context, got {}-{}",
            ctx.kind(),
            ctx.direction()
        )));
    }
    Ok(())
}

/// Pad and encrypt `input` through a CBC encrypt context.
pub fn pkcs7_cbc_encrypt<C: BlockCipher>(
    ctx: &mut ModeContext<C>,
    input: &[u8],
    output: &mut [u8],
) -> PdcResult<usize> {
    check_cbc(ctx, Direction::Encrypt)?;
    let bs = ctx.cipher_block_size();
    let total = padded_size(bs, input.len());
    check_output("pkcs7-cbc-encrypt", total, output.len())?;
    pad_into(bs, input, output);
    ctx.transform_in_place(&mut output[..total])?;
    Ok(total)
}

/// Decrypt through a CBC decrypt context and strip the padding. On bad
/// padding the decrypted bytes are wiped before returning.
pub fn pkcs7_cbc_decrypt<C: BlockCipher>(
    ctx: &mut ModeContext<C>,
    input: &[u8],
    output: &mut [u8],
) -> PdcResult<usize> {
    check_cbc(ctx, Direction::Decrypt)?;
    let bs = ctx.cipher_block_size();
    check_ciphertext("pkcs7-cbc-decrypt", bs, input.len())?;
    ctx.transform(input, output)?;
    unpad(output, input.len(), bs)
}
