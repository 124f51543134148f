//! XTS tweakable mode (IEEE 1619) over two block-cipher capabilities.
//!
//! The data cipher runs in the mode's direction; the tweak cipher always
//! encrypts. A context holds both key schedules and is never mutated by
//! `transform`, so one context can serve many sectors, each with its own
//! [`XtsTweak`]:
//!
//! ```text
//! set_tweak:  T0 = E_tweak(sector id)
//! per block:  C = E_data(P ^ Tj) ^ Tj,   Tj+1 = Tj · α  in GF(2^128)
//! ```

use std::fmt;

use pdc_core::bytes::xor_in_place;
use pdc_core::{
    check_capability, BlockCipher, Direction, PdcError, PdcResult, XtsConfig,
    XTS_MAX_BLOCKS_PER_TWEAK,
};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::engine::run_cipher;

pub const XTS_BLOCK_SIZE: usize = 16;

/// Multiply a little-endian GF(2^128) element by α (x), reducing by
/// x^128 + x^7 + x^2 + x + 1.
#[inline]
pub fn mult_alpha(tweak: &mut [u8; XTS_BLOCK_SIZE]) {
    let mut carry = 0u8;
    for byte in tweak.iter_mut() {
        let next = *byte >> 7;
        *byte = (*byte << 1) | carry;
        carry = next;
    }
    if carry != 0 {
        tweak[0] ^= 0x87;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakState {
    /// `set_tweak` has not been called yet.
    Unset,
    Active,
    /// The per-tweak block ceiling was hit. Only `set_tweak` revives it.
    Exhausted,
}

impl TweakState {
    pub fn as_str(self) -> &'static str {
        match self {
            TweakState::Unset => "unset",
            TweakState::Active => "active",
            TweakState::Exhausted => "exhausted",
        }
    }
}

/// Per-sector tweak value and its processed-block counter.
pub struct XtsTweak {
    value: [u8; XTS_BLOCK_SIZE],
    blocks_processed: u64,
    state: TweakState,
}

impl XtsTweak {
    pub fn new() -> Self {
        Self {
            value: [0u8; XTS_BLOCK_SIZE],
            blocks_processed: 0,
            state: TweakState::Unset,
        }
    }

    pub fn state(&self) -> TweakState {
        self.state
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }
}

impl Default for XtsTweak {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for XtsTweak {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl fmt::Debug for XtsTweak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XtsTweak")
            .field("state", &self.state)
            .field("blocks_processed", &self.blocks_processed)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// XTS descriptor: a data capability plus an encrypt-only tweak capability.
#[derive(Debug, Clone, Copy)]
pub struct XtsMode<D, T> {
    direction: Direction,
    data: D,
    tweak: T,
    max_blocks_per_tweak: u64,
    context_size: usize,
}

pub fn xts_encrypt<D, T>(data: D, tweak: T) -> XtsMode<D, T>
where
    D: BlockCipher + Clone,
    T: BlockCipher + Clone,
{
    XtsMode::new(Direction::Encrypt, data, tweak)
}

pub fn xts_decrypt<D, T>(data: D, tweak: T) -> XtsMode<D, T>
where
    D: BlockCipher + Clone,
    T: BlockCipher + Clone,
{
    XtsMode::new(Direction::Decrypt, data, tweak)
}

impl<D, T> XtsMode<D, T>
where
    D: BlockCipher + Clone,
    T: BlockCipher + Clone,
{
    pub fn new(direction: Direction, data: D, tweak: T) -> Self {
        let context_size = std::mem::size_of::<XtsContext<D, T>>();
        tracing::trace!(
            mode = "xts",
            direction = direction.as_str(),
            data_cipher = data.name(),
            tweak_cipher = tweak.name(),
            context_size,
            "built xts descriptor"
        );
        Self {
            direction,
            data,
            tweak,
            max_blocks_per_tweak: XTS_MAX_BLOCKS_PER_TWEAK,
            context_size,
        }
    }

    /// Apply the configured per-tweak ceiling. Values above the FIPS limit
    /// are clamped to it.
    pub fn with_config(mut self, config: &XtsConfig) -> Self {
        self.max_blocks_per_tweak = config.max_blocks_per_tweak.min(XTS_MAX_BLOCKS_PER_TWEAK);
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn block_size(&self) -> usize {
        XTS_BLOCK_SIZE
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    pub fn tweak_size(&self) -> usize {
        std::mem::size_of::<XtsTweak>()
    }

    pub fn max_blocks_per_tweak(&self) -> u64 {
        self.max_blocks_per_tweak
    }

    /// Key both ciphers. The keys must be the same length and must differ.
    pub fn init(&self, data_key: &[u8], tweak_key: &[u8]) -> PdcResult<XtsContext<D, T>> {
        let label = format!("xts-{}", self.direction);
        check_capability(&self.data, self.direction, &label)?;
        check_capability(&self.tweak, Direction::Encrypt, "xts tweak")?;
        if self.data.block_size() != XTS_BLOCK_SIZE || self.tweak.block_size() != XTS_BLOCK_SIZE {
            return Err(PdcError::invalid(format!(
                "{label}: both ciphers need {XTS_BLOCK_SIZE}-byte blocks (data {}, tweak {})",
                self.data.block_size(),
                self.tweak.block_size()
            )));
        }
        if data_key.len() != tweak_key.len() {
            return Err(PdcError::invalid(format!(
                "{label}: data key is {} bytes, tweak key is {}",
                data_key.len(),
                tweak_key.len()
            )));
        }
        if bool::from(data_key.ct_eq(tweak_key)) {
            return Err(PdcError::invalid(format!(
                "{label}: data and tweak keys must differ"
            )));
        }
        Ok(XtsContext {
            direction: self.direction,
            data_schedule: self.data.init(data_key)?,
            tweak_schedule: self.tweak.init(tweak_key)?,
            data: self.data.clone(),
            tweak: self.tweak.clone(),
            max_blocks_per_tweak: self.max_blocks_per_tweak,
        })
    }
}

/// Keyed XTS context. Read-only during `transform`; all per-sector state
/// lives in the [`XtsTweak`].
pub struct XtsContext<D: BlockCipher, T: BlockCipher> {
    direction: Direction,
    data: D,
    tweak: T,
    data_schedule: D::Context,
    tweak_schedule: T::Context,
    max_blocks_per_tweak: u64,
}

impl<D: BlockCipher, T: BlockCipher> XtsContext<D, T> {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Start a new sector: `tweak` becomes `E_tweak(iv)` with a zero block
    /// count.
    pub fn set_tweak(&self, tweak: &mut XtsTweak, iv: &[u8]) -> PdcResult<()> {
        if iv.len() != XTS_BLOCK_SIZE {
            return Err(PdcError::invalid(format!(
                "xts: sector id must be {XTS_BLOCK_SIZE} bytes, got {}",
                iv.len()
            )));
        }
        tweak.value.copy_from_slice(iv);
        run_cipher(&self.tweak, &self.tweak_schedule, &mut tweak.value)?;
        tweak.blocks_processed = 0;
        tweak.state = TweakState::Active;
        Ok(())
    }

    /// Transform whole blocks of `input` into `output` and return the evolved
    /// tweak so a later call can continue the same sector.
    pub fn transform<'t>(
        &self,
        tweak: &'t mut XtsTweak,
        input: &[u8],
        output: &mut [u8],
    ) -> PdcResult<&'t [u8; XTS_BLOCK_SIZE]> {
        if output.len() < input.len() {
            return Err(PdcError::invalid(format!(
                "xts: output holds {} bytes, input is {}",
                output.len(),
                input.len()
            )));
        }
        self.admit(tweak, input.len())?;
        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        self.crypt_blocks(tweak, out)?;
        Ok(&tweak.value)
    }

    pub fn transform_in_place<'t>(
        &self,
        tweak: &'t mut XtsTweak,
        buf: &mut [u8],
    ) -> PdcResult<&'t [u8; XTS_BLOCK_SIZE]> {
        self.admit(tweak, buf.len())?;
        self.crypt_blocks(tweak, buf)?;
        Ok(&tweak.value)
    }

    /// Validate a call against the tweak before touching any data. A call
    /// that would cross the ceiling exhausts the tweak.
    fn admit(&self, tweak: &mut XtsTweak, len: usize) -> PdcResult<()> {
        match tweak.state {
            TweakState::Active => {}
            state => {
                tracing::debug!(state = state.as_str(), "xts transform refused");
                return Err(PdcError::CallSequence {
                    operation: "xts transform",
                    state: state.as_str(),
                });
            }
        }
        if len % XTS_BLOCK_SIZE != 0 {
            return Err(PdcError::invalid(format!(
                "xts: {len} bytes is not a whole number of {XTS_BLOCK_SIZE}-byte blocks"
            )));
        }
        let nblocks = (len / XTS_BLOCK_SIZE) as u64;
        let total = tweak.blocks_processed.saturating_add(nblocks);
        if total > self.max_blocks_per_tweak {
            tweak.state = TweakState::Exhausted;
            tweak.value.zeroize();
            tracing::debug!(
                processed = tweak.blocks_processed,
                requested = nblocks,
                ceiling = self.max_blocks_per_tweak,
                "xts tweak exhausted"
            );
            return Err(PdcError::Overflow(format!(
                "xts: {nblocks} more blocks would exceed {} blocks per tweak",
                self.max_blocks_per_tweak
            )));
        }
        Ok(())
    }

    fn crypt_blocks(&self, tweak: &mut XtsTweak, buf: &mut [u8]) -> PdcResult<()> {
        for block in buf.chunks_exact_mut(XTS_BLOCK_SIZE) {
            xor_in_place(block, &tweak.value);
            run_cipher(&self.data, &self.data_schedule, block)?;
            xor_in_place(block, &tweak.value);
            mult_alpha(&mut tweak.value);
            tweak.blocks_processed += 1;
        }
        Ok(())
    }
}

impl<D: BlockCipher, T: BlockCipher> fmt::Debug for XtsContext<D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XtsContext")
            .field("direction", &self.direction)
            .field("data", &self.data.name())
            .field("tweak", &self.tweak.name())
            .field("max_blocks_per_tweak", &self.max_blocks_per_tweak)
            .finish()
    }
}
