//! The block-cipher capability consumed by every mode in the workspace.
//!
//! A capability is a fixed-size keyed transform over fixed-size blocks. It is
//! stateless itself: `init` turns raw key bytes into a `Context` (the key
//! schedule) and `transform_in_place` runs whole blocks through it in the
//! capability's direction. Modes never look inside a cipher beyond this trait.

use std::fmt;

use crate::error::{PdcError, PdcResult};

/// Largest block size any mode in this workspace supports (AES).
pub const MAX_BLOCK_SIZE: usize = 16;

/// A scratch buffer large enough for one block of any supported cipher.
pub type Block = [u8; MAX_BLOCK_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypt",
            Direction::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait BlockCipher: Send + Sync {
    /// Keyed state produced by [`BlockCipher::init`].
    type Context: Send + Sync;

    fn name(&self) -> &'static str;

    fn direction(&self) -> Direction;

    /// Block size in bytes. Never changes for a given capability.
    fn block_size(&self) -> usize;

    /// Size of the keyed context in bytes.
    fn context_size(&self) -> usize {
        std::mem::size_of::<Self::Context>()
    }

    /// Expand `key` into a key schedule. Unsupported key lengths are an
    /// `InvalidParameter` error.
    fn init(&self, key: &[u8]) -> PdcResult<Self::Context>;

    /// Transform `blocks` in place. `blocks.len()` must be a multiple of the
    /// block size.
    fn transform_in_place(&self, ctx: &Self::Context, blocks: &mut [u8]) -> PdcResult<()>;

    /// Transform `nblocks` blocks from `input` into `output`.
    fn transform(
        &self,
        ctx: &Self::Context,
        nblocks: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> PdcResult<()> {
        let len = nblocks
            .checked_mul(self.block_size())
            .ok_or_else(|| PdcError::invalid("block count overflows usize"))?;
        if input.len() < len || output.len() < len {
            return Err(PdcError::invalid(format!(
                "{}: {nblocks} blocks need {len} bytes (input {}, output {})",
                self.name(),
                input.len(),
                output.len()
            )));
        }
        output[..len].copy_from_slice(&input[..len]);
        self.transform_in_place(ctx, &mut output[..len])
    }
}

/// Check that `cipher` runs in `expected` direction and fits in a [`Block`].
///
/// Modes call this from their `init`, which is where a mismatched capability
/// is first reported.
pub fn check_capability<C: BlockCipher>(
    cipher: &C,
    expected: Direction,
    construct: &str,
) -> PdcResult<()> {
    if cipher.direction() != expected {
        return Err(PdcError::invalid(format!(
            "{construct} needs a cipher in {expected} direction, got {} ({})",
            cipher.name(),
            cipher.direction()
        )));
    }
    let block_size = cipher.block_size();
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(PdcError::invalid(format!(
            "{construct}: unsupported block size {block_size} for {}",
            cipher.name()
        )));
    }
    Ok(())
}
