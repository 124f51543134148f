//! AES capability covering all three key sizes.

use aes::{Aes128, Aes192, Aes256};
use pdc_core::{BlockCipher, Direction, PdcError, PdcResult};

use crate::ecb::crypt_blocks;

pub const AES_BLOCK_SIZE: usize = 16;

/// AES in one direction; the key size is picked at `init` from the key length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aes {
    direction: Direction,
}

impl Aes {
    pub const fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

pub const AES_ENCRYPT: Aes = Aes::new(Direction::Encrypt);
pub const AES_DECRYPT: Aes = Aes::new(Direction::Decrypt);

/// Expanded AES key. The inner schedules zeroize on drop.
pub enum AesKey {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesKey {
    pub fn key_bits(&self) -> usize {
        match self {
            AesKey::Aes128(_) => 128,
            AesKey::Aes192(_) => 192,
            AesKey::Aes256(_) => 256,
        }
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesKey")
            .field("bits", &self.key_bits())
            .field("schedule", &"[REDACTED]")
            .finish()
    }
}

impl BlockCipher for Aes {
    type Context = AesKey;

    fn name(&self) -> &'static str {
        "aes"
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn init(&self, key: &[u8]) -> PdcResult<AesKey> {
        use cipher::KeyInit;

        // new_from_slice only fails on length, which the match already pinned
        let bad_len = |_| PdcError::invalid(format!("aes: unsupported key length {}", key.len()));
        match key.len() {
            16 => Aes128::new_from_slice(key).map(AesKey::Aes128).map_err(bad_len),
            24 => Aes192::new_from_slice(key).map(AesKey::Aes192).map_err(bad_len),
            32 => Aes256::new_from_slice(key).map(AesKey::Aes256).map_err(bad_len),
            n => Err(PdcError::invalid(format!(
                "aes: unsupported key length {n} (expected 16, 24 or 32)"
            ))),
        }
    }

    fn transform_in_place(&self, ctx: &AesKey, blocks: &mut [u8]) -> PdcResult<()> {
        match ctx {
            AesKey::Aes128(c) => crypt_blocks(c, self.direction, "aes-128", blocks),
            AesKey::Aes192(c) => crypt_blocks(c, self.direction, "aes-192", blocks),
            AesKey::Aes256(c) => crypt_blocks(c, self.direction, "aes-256", blocks),
        }
    }
}
