//! CMAC (NIST SP 800-38B) on top of a CBC-encrypt mode with a zero IV.
//!
//! ```text
//! L  = E_K(0^b)
//! K1 = L << 1  ^ (msb(L)  ? Rb : 0)
//! K2 = K1 << 1 ^ (msb(K1) ? Rb : 0)
//!
//! complete last block:  M_n ^ K1
//! partial last block:   (M_n || 10..0) ^ K2
//! tag = last CBC output block, optionally truncated
//! ```
//!
//! The final block is held back in `update` until more input arrives, since
//! only `finalize` knows whether it is the last one.

use std::fmt;

use pdc_core::bytes::{shift_left_one, xor_in_place};
use pdc_core::{Block, BlockCipher, Direction, PdcError, PdcResult};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::engine::ModeContext;
use crate::factory::{ModeDescriptor, ModeKind};

/// Reduction constant for the given block size.
fn rb(block_size: usize) -> PdcResult<u8> {
    match block_size {
        16 => Ok(0x87),
        8 => Ok(0x1B),
        n => Err(PdcError::invalid(format!(
            "cmac: no subkey polynomial for {n}-byte blocks"
        ))),
    }
}

fn check_descriptor<C: BlockCipher + Clone>(cbc: &ModeDescriptor<C>) -> PdcResult<()> {
    if cbc.kind() != ModeKind::Cbc || cbc.direction() != Direction::Encrypt {
        return Err(PdcError::invalid(format!(
            "cmac needs a cbc-encrypt descriptor, got {}-{}",
            cbc.kind(),
            cbc.direction()
        )));
    }
    rb(cbc.cipher().block_size()).map(|_| ())
}

/// The two CMAC subkeys. Wiped on drop.
pub struct CmacSubkeys {
    k1: Block,
    k2: Block,
    block_size: usize,
}

impl CmacSubkeys {
    pub fn k1(&self) -> &[u8] {
        &self.k1[..self.block_size]
    }

    pub fn k2(&self) -> &[u8] {
        &self.k2[..self.block_size]
    }
}

impl Drop for CmacSubkeys {
    fn drop(&mut self) {
        self.k1.zeroize();
        self.k2.zeroize();
    }
}

impl fmt::Debug for CmacSubkeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmacSubkeys")
            .field("block_size", &self.block_size)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

fn double(block: &mut [u8], rb: u8) {
    let carry = shift_left_one(block);
    let last = block.len() - 1;
    // branch-free conditional xor
    block[last] ^= rb & carry.wrapping_neg();
}

fn derive_subkeys<C: BlockCipher>(ctx: &mut ModeContext<C>) -> PdcResult<CmacSubkeys> {
    let bs = ctx.cipher_block_size();
    let rb = rb(bs)?;
    let mut l = Block::default();
    ctx.transform_in_place(&mut l[..bs])?;

    let mut subkeys = CmacSubkeys {
        k1: l,
        k2: Block::default(),
        block_size: bs,
    };
    l.zeroize();
    double(&mut subkeys.k1[..bs], rb);
    subkeys.k2 = subkeys.k1;
    double(&mut subkeys.k2[..bs], rb);

    // L was computed with the chaining register, so start over from zero
    ctx.set_iv(&[0u8; pdc_core::MAX_BLOCK_SIZE][..bs])?;
    Ok(subkeys)
}

/// Derive K1 and K2 for `key` under a CBC-encrypt descriptor.
pub fn generate_subkeys<C: BlockCipher + Clone>(
    cbc: &ModeDescriptor<C>,
    key: &[u8],
) -> PdcResult<CmacSubkeys> {
    check_descriptor(cbc)?;
    let bs = cbc.cipher().block_size();
    let mut ctx = cbc.init(key, &[0u8; pdc_core::MAX_BLOCK_SIZE][..bs])?;
    derive_subkeys(&mut ctx)
}

/// Incremental CMAC.
pub struct CmacContext<C: BlockCipher> {
    cbc: ModeContext<C>,
    subkeys: CmacSubkeys,
    buffer: Block,
    buffered: usize,
}

impl<C: BlockCipher + Clone> CmacContext<C> {
    pub fn init(cbc: &ModeDescriptor<C>, key: &[u8]) -> PdcResult<Self> {
        check_descriptor(cbc)?;
        let bs = cbc.cipher().block_size();
        let mut ctx = cbc.init(key, &[0u8; pdc_core::MAX_BLOCK_SIZE][..bs])?;
        let subkeys = derive_subkeys(&mut ctx)?;
        Ok(Self {
            cbc: ctx,
            subkeys,
            buffer: Block::default(),
            buffered: 0,
        })
    }
}

impl<C: BlockCipher> CmacContext<C> {
    pub fn block_size(&self) -> usize {
        self.subkeys.block_size
    }

    pub fn update(&mut self, mut data: &[u8]) -> PdcResult<()> {
        let bs = self.block_size();
        while !data.is_empty() {
            if self.buffered == bs {
                self.cbc.transform_in_place(&mut self.buffer[..bs])?;
                self.buffered = 0;
            }
            let take = (bs - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];
        }
        Ok(())
    }

    fn compute(&mut self) -> PdcResult<Block> {
        let bs = self.block_size();
        let last = &mut self.buffer[..bs];
        if self.buffered == bs {
            xor_in_place(last, self.subkeys.k1());
        } else {
            last[self.buffered] = 0x80;
            last[self.buffered + 1..].fill(0);
            xor_in_place(last, self.subkeys.k2());
        }
        self.cbc.transform_in_place(last)?;
        let mut tag = Block::default();
        tag[..bs].copy_from_slice(last);
        Ok(tag)
    }

    fn check_tag_len(&self, len: usize) -> PdcResult<()> {
        if len == 0 || len > self.block_size() {
            return Err(PdcError::invalid(format!(
                "cmac: tag length must be 1..={}, got {len}",
                self.block_size()
            )));
        }
        Ok(())
    }

    /// Write the first `tag.len()` bytes of the MAC into `tag`.
    pub fn finalize(mut self, tag: &mut [u8]) -> PdcResult<()> {
        self.check_tag_len(tag.len())?;
        let mut full = self.compute()?;
        tag.copy_from_slice(&full[..tag.len()]);
        full.zeroize();
        Ok(())
    }

    /// Compare against a (possibly truncated) expected tag in constant time.
    pub fn verify(mut self, expected: &[u8]) -> PdcResult<()> {
        self.check_tag_len(expected.len())?;
        let mut full = self.compute()?;
        let ok = full[..expected.len()].ct_eq(expected);
        full.zeroize();
        if bool::from(ok) {
            Ok(())
        } else {
            tracing::debug!("cmac tag mismatch");
            Err(PdcError::AuthenticationFailure)
        }
    }
}

impl<C: BlockCipher> Drop for CmacContext<C> {
    fn drop(&mut self) {
        self.buffer.zeroize();
    }
}

impl<C: BlockCipher> fmt::Debug for CmacContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmacContext")
            .field("block_size", &self.block_size())
            .field("buffered", &self.buffered)
            .finish_non_exhaustive()
    }
}

/// One-shot CMAC of `data`.
pub fn cmac<C: BlockCipher + Clone>(
    cbc: &ModeDescriptor<C>,
    key: &[u8],
    data: &[u8],
    tag: &mut [u8],
) -> PdcResult<()> {
    let mut ctx = CmacContext::init(cbc, key)?;
    ctx.update(data)?;
    ctx.finalize(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{cbc_decrypt, cbc_encrypt, ctr};
    use pdc_ciphers::{AES_DECRYPT, AES_ENCRYPT, TDES3_ENCRYPT};
    use proptest::prelude::*;

    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const MESSAGE: &str = "6bc1bee22e409f96e93d7e117393172a\
                           ae2d8a571e03ac9c9eb76fac45af8e51\
                           30c81c46a35ce411e5fbc1191a0a52ef\
                           f69f2445df4f9b17ad2b417be66c3710";

    fn h(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    fn tag_of(len: usize) -> String {
        let mut tag = [0u8; 16];
        cmac(&cbc_encrypt(AES_ENCRYPT), &h(KEY), &h(MESSAGE)[..len], &mut tag).unwrap();
        hex::encode(tag)
    }

    #[test]
    fn test_subkeys_nist_key() {
        let sk = generate_subkeys(&cbc_encrypt(AES_ENCRYPT), &h(KEY)).unwrap();
        assert_eq!(hex::encode(sk.k1()), "fbeed618357133667c85e08f7236a8de");
        assert_eq!(hex::encode(sk.k2()), "f7ddac306ae266ccf90bc11ee46d513b");
    }

    #[test]
    fn test_subkeys_zero_key() {
        let sk = generate_subkeys(&cbc_encrypt(AES_ENCRYPT), &[0u8; 16]).unwrap();
        assert_eq!(hex::encode(sk.k1()), "cdd297a9df1458771099f4b39468565c");
        assert_eq!(hex::encode(sk.k2()), "9ba52f53be28b0ee2133e96728d0ac3f");
    }

    #[test]
    fn test_sp800_38b_examples() {
        assert_eq!(tag_of(0), "bb1d6929e95937287fa37d129b756746");
        assert_eq!(tag_of(16), "070a16b46b4d4144f79bdd9dd04a287c");
        assert_eq!(tag_of(40), "dfa66747de9ae63030ca32611497c827");
        assert_eq!(tag_of(64), "51f0bebf7e3b9d92fc49741779363cfe");
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let msg = h(MESSAGE);
        let mut ctx = CmacContext::init(&cbc_encrypt(AES_ENCRYPT), &h(KEY)).unwrap();
        for piece in msg[..40].chunks(7) {
            ctx.update(piece).unwrap();
        }
        let mut tag = [0u8; 16];
        ctx.finalize(&mut tag).unwrap();
        assert_eq!(hex::encode(tag), tag_of(40));
    }

    #[test]
    fn test_verify_truncated_and_flipped() {
        let full = h(&tag_of(64));
        let mut ctx = CmacContext::init(&cbc_encrypt(AES_ENCRYPT), &h(KEY)).unwrap();
        ctx.update(&h(MESSAGE)).unwrap();
        ctx.verify(&full[..8]).unwrap();

        let mut bad = full.clone();
        bad[3] ^= 0x01;
        let mut ctx = CmacContext::init(&cbc_encrypt(AES_ENCRYPT), &h(KEY)).unwrap();
        ctx.update(&h(MESSAGE)).unwrap();
        assert!(matches!(ctx.verify(&bad), Err(PdcError::AuthenticationFailure)));
    }

    #[test]
    fn test_tag_length_bounds() {
        let ctx = CmacContext::init(&cbc_encrypt(AES_ENCRYPT), &h(KEY)).unwrap();
        let mut long = [0u8; 17];
        assert!(ctx.finalize(&mut long).is_err());
        let ctx = CmacContext::init(&cbc_encrypt(AES_ENCRYPT), &h(KEY)).unwrap();
        assert!(ctx.finalize(&mut []).is_err());
    }

    #[test]
    fn test_rejects_non_cbc_encrypt() {
        assert!(CmacContext::init(&ctr(AES_ENCRYPT), &h(KEY)).is_err());
        assert!(CmacContext::init(&cbc_decrypt(AES_DECRYPT), &h(KEY)).is_err());
    }

    #[test]
    fn test_64_bit_block_cipher() {
        let key = [0x5Au8; 24];
        let sk = generate_subkeys(&cbc_encrypt(TDES3_ENCRYPT), &key).unwrap();
        assert_eq!(sk.k1().len(), 8);
        let mut tag = [0u8; 8];
        cmac(&cbc_encrypt(TDES3_ENCRYPT), &key, b"legacy", &mut tag).unwrap();
        assert_ne!(tag, [0u8; 8]);
    }

    proptest! {
        #[test]
        fn prop_split_point_irrelevant(
            data in proptest::collection::vec(any::<u8>(), 0..100),
            split in any::<prop::sample::Index>(),
        ) {
            let at = split.index(data.len() + 1);
            let d = cbc_encrypt(AES_ENCRYPT);
            let mut whole = [0u8; 16];
            cmac(&d, &[1u8; 16], &data, &mut whole).unwrap();

            let mut ctx = CmacContext::init(&d, &[1u8; 16]).unwrap();
            ctx.update(&data[..at]).unwrap();
            ctx.update(&data[at..]).unwrap();
            ctx.verify(&whole).unwrap();
        }
    }
}
