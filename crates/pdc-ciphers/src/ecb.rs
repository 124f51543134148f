//! Generic adapter from a RustCrypto block cipher to [`BlockCipher`].

use std::fmt;
use std::marker::PhantomData;

use cipher::{Block, BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use pdc_core::{BlockCipher, Direction, PdcError, PdcResult};

/// ECB capability over any `cipher` 0.4 block cipher.
///
/// Key length is whatever `KeyInit::new_from_slice` accepts, so variable-key
/// ciphers such as Blowfish keep their full range.
pub struct Ecb<C> {
    name: &'static str,
    direction: Direction,
    _cipher: PhantomData<fn() -> C>,
}

impl<C> Ecb<C> {
    pub const fn new(name: &'static str, direction: Direction) -> Self {
        Self {
            name,
            direction,
            _cipher: PhantomData,
        }
    }
}

impl<C> Clone for Ecb<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Ecb<C> {}

impl<C> fmt::Debug for Ecb<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ecb")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .finish()
    }
}

impl<C> BlockCipher for Ecb<C>
where
    C: BlockEncrypt + BlockDecrypt + KeyInit + Send + Sync,
{
    type Context = C;

    fn name(&self) -> &'static str {
        self.name
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn block_size(&self) -> usize {
        <C as BlockSizeUser>::block_size()
    }

    fn init(&self, key: &[u8]) -> PdcResult<C> {
        C::new_from_slice(key).map_err(|_| {
            PdcError::invalid(format!("{}: unsupported key length {}", self.name, key.len()))
        })
    }

    fn transform_in_place(&self, ctx: &C, blocks: &mut [u8]) -> PdcResult<()> {
        crypt_blocks(ctx, self.direction, self.name, blocks)
    }
}

/// Run `blocks` through `cipher` one block at a time.
pub(crate) fn crypt_blocks<C>(
    cipher: &C,
    direction: Direction,
    name: &str,
    blocks: &mut [u8],
) -> PdcResult<()>
where
    C: BlockEncrypt + BlockDecrypt,
{
    let block_size = <C as BlockSizeUser>::block_size();
    if blocks.len() % block_size != 0 {
        return Err(PdcError::invalid(format!(
            "{name}: {} bytes is not a whole number of {block_size}-byte blocks",
            blocks.len()
        )));
    }
    for chunk in blocks.chunks_exact_mut(block_size) {
        let block = Block::<C>::from_mut_slice(chunk);
        match direction {
            Direction::Encrypt => cipher.encrypt_block(block),
            Direction::Decrypt => cipher.decrypt_block(block),
        }
    }
    Ok(())
}

pub type Des = Ecb<des::Des>;
pub type TripleDes2 = Ecb<des::TdesEde2>;
pub type TripleDes3 = Ecb<des::TdesEde3>;
pub type Blowfish = Ecb<blowfish::Blowfish>;

pub const DES_ENCRYPT: Des = Ecb::new("des", Direction::Encrypt);
pub const DES_DECRYPT: Des = Ecb::new("des", Direction::Decrypt);
pub const TDES2_ENCRYPT: TripleDes2 = Ecb::new("3des-ede2", Direction::Encrypt);
pub const TDES2_DECRYPT: TripleDes2 = Ecb::new("3des-ede2", Direction::Decrypt);
pub const TDES3_ENCRYPT: TripleDes3 = Ecb::new("3des-ede3", Direction::Encrypt);
pub const TDES3_DECRYPT: TripleDes3 = Ecb::new("3des-ede3", Direction::Decrypt);
pub const BLOWFISH_ENCRYPT: Blowfish = Ecb::new("blowfish", Direction::Encrypt);
pub const BLOWFISH_DECRYPT: Blowfish = Ecb::new("blowfish", Direction::Decrypt);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_des_known_answer() {
        // FIPS 81 / classic "Now is the time for all " DES example.
        let key = hex::decode("0123456789abcdef").unwrap();
        let plaintext = hex::decode("4e6f772069732074").unwrap();

        let ctx = DES_ENCRYPT.init(&key).unwrap();
        let mut block = plaintext.clone();
        DES_ENCRYPT.transform_in_place(&ctx, &mut block).unwrap();
        assert_eq!(hex::encode(&block), "3fa40e8a984d4815");

        let ctx = DES_DECRYPT.init(&key).unwrap();
        DES_DECRYPT.transform_in_place(&ctx, &mut block).unwrap();
        assert_eq!(block, plaintext);
    }

    #[test]
    fn test_block_sizes() {
        assert_eq!(DES_ENCRYPT.block_size(), 8);
        assert_eq!(TDES3_ENCRYPT.block_size(), 8);
        assert_eq!(BLOWFISH_ENCRYPT.block_size(), 8);
    }

    #[test]
    fn test_des_rejects_wrong_key_length() {
        let result = DES_ENCRYPT.init(&[0u8; 7]);
        assert!(matches!(result, Err(PdcError::InvalidParameter(_))));
    }

    #[test]
    fn test_blowfish_variable_key_range() {
        assert!(BLOWFISH_ENCRYPT.init(&[1u8; 4]).is_ok());
        assert!(BLOWFISH_ENCRYPT.init(&[1u8; 56]).is_ok());
        assert!(BLOWFISH_ENCRYPT.init(&[1u8; 3]).is_err());
        assert!(BLOWFISH_ENCRYPT.init(&[1u8; 57]).is_err());
    }

    #[test]
    fn test_partial_block_rejected() {
        let ctx = TDES3_ENCRYPT.init(&[7u8; 24]).unwrap();
        let mut buf = [0u8; 12];
        let result = TDES3_ENCRYPT.transform_in_place(&ctx, &mut buf);
        assert!(matches!(result, Err(PdcError::InvalidParameter(_))));
    }

    #[test]
    fn test_transform_copies_then_encrypts() {
        let ctx = DES_ENCRYPT.init(&hex::decode("0123456789abcdef").unwrap()).unwrap();
        let input = hex::decode("4e6f772069732074").unwrap();
        let mut output = [0u8; 8];
        DES_ENCRYPT.transform(&ctx, 1, &input, &mut output).unwrap();
        assert_eq!(hex::encode(output), "3fa40e8a984d4815");
    }

    #[test]
    fn test_transform_short_output_rejected() {
        let ctx = DES_ENCRYPT.init(&[1u8; 8]).unwrap();
        let mut output = [0u8; 8];
        let result = DES_ENCRYPT.transform(&ctx, 2, &[0u8; 16], &mut output);
        assert!(matches!(result, Err(PdcError::InvalidParameter(_))));
    }

    proptest! {
        #[test]
        fn blowfish_decrypt_inverts_encrypt(
            key in proptest::collection::vec(any::<u8>(), 4..=56),
            blocks in proptest::collection::vec(any::<[u8; 8]>(), 0..8),
        ) {
            let data: Vec<u8> = blocks.concat();
            let enc = BLOWFISH_ENCRYPT.init(&key).unwrap();
            let dec = BLOWFISH_DECRYPT.init(&key).unwrap();

            let mut buf = data.clone();
            BLOWFISH_ENCRYPT.transform_in_place(&enc, &mut buf).unwrap();
            BLOWFISH_DECRYPT.transform_in_place(&dec, &mut buf).unwrap();
            prop_assert_eq!(buf, data);
        }
    }
}
