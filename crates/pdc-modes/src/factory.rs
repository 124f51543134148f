//! Mode factory: pairs a block-cipher capability with a chaining mode.
//!
//! ```text
//! capability (Aes, Ecb<C>, AnyCipher)
//!        │
//!        ▼  cbc_encrypt / cfb_decrypt / ofb / ctr / ...
//! ModeDescriptor<C>   immutable, no key material, context size fixed here
//!        │
//!        ▼  init(key, iv)
//! ModeContext<C>      keyed, mutated by every transform
//! ```
//!
//! Building a descriptor never fails. A capability in the wrong direction, or
//! one whose block does not fit in [`pdc_core::Block`], is reported by `init`.

use std::fmt;

use pdc_core::{check_capability, BlockCipher, Direction, PdcError, PdcResult};

use crate::engine::ModeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Cbc,
    Cfb,
    Cfb8,
    Ofb,
    Ctr,
}

impl ModeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeKind::Cbc => "cbc",
            ModeKind::Cfb => "cfb",
            ModeKind::Cfb8 => "cfb8",
            ModeKind::Ofb => "ofb",
            ModeKind::Ctr => "ctr",
        }
    }

    /// Stream-shaped modes take any byte count; CBC takes whole blocks.
    pub fn is_stream(self) -> bool {
        !matches!(self, ModeKind::Cbc)
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chaining mode bound to one block-cipher capability.
///
/// OFB and CTR are their own inverse, so their descriptors always report
/// [`Direction::Encrypt`].
#[derive(Debug, Clone, Copy)]
pub struct ModeDescriptor<C> {
    kind: ModeKind,
    direction: Direction,
    block_size: usize,
    context_size: usize,
    cipher: C,
}

impl<C: BlockCipher + Clone> ModeDescriptor<C> {
    /// Build a descriptor for `kind` running in `direction` over `cipher`.
    pub fn new(kind: ModeKind, direction: Direction, cipher: C) -> Self {
        let block_size = if kind.is_stream() {
            1
        } else {
            cipher.block_size()
        };
        let context_size = std::mem::size_of::<ModeContext<C>>();
        tracing::trace!(
            mode = kind.as_str(),
            direction = direction.as_str(),
            cipher = cipher.name(),
            block_size,
            context_size,
            "built mode descriptor"
        );
        Self {
            kind,
            direction,
            block_size,
            context_size,
            cipher,
        }
    }

    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Transform unit in bytes: 1 for stream-shaped modes, the cipher block
    /// size for CBC.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Size of a [`ModeContext`] created from this descriptor. Fixed at
    /// construction and never grows.
    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// The wrapped capability.
    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// Direction the wrapped capability must run in for this mode.
    ///
    /// Only CBC runs the cipher in the mode's own direction; the feedback
    /// modes always need the forward (encrypt) transform.
    pub fn required_cipher_direction(&self) -> Direction {
        match self.kind {
            ModeKind::Cbc => self.direction,
            _ => Direction::Encrypt,
        }
    }

    fn label(&self) -> String {
        format!("{}-{}", self.kind, self.direction)
    }

    /// Key the cipher and load `iv` into the feedback register (or the counter
    /// block for CTR).
    pub fn init(&self, key: &[u8], iv: &[u8]) -> PdcResult<ModeContext<C>> {
        check_capability(&self.cipher, self.required_cipher_direction(), &self.label())?;
        let cipher_block = self.cipher.block_size();
        if iv.len() != cipher_block {
            return Err(PdcError::invalid(format!(
                "{}: iv must be {cipher_block} bytes, got {}",
                self.label(),
                iv.len()
            )));
        }
        let schedule = self.cipher.init(key)?;
        ModeContext::new(
            self.kind,
            self.direction,
            self.cipher.clone(),
            schedule,
            iv,
        )
    }
}

pub fn cbc_encrypt<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Cbc, Direction::Encrypt, cipher)
}

pub fn cbc_decrypt<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Cbc, Direction::Decrypt, cipher)
}

pub fn cfb_encrypt<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Cfb, Direction::Encrypt, cipher)
}

pub fn cfb_decrypt<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Cfb, Direction::Decrypt, cipher)
}

pub fn cfb8_encrypt<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Cfb8, Direction::Encrypt, cipher)
}

pub fn cfb8_decrypt<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Cfb8, Direction::Decrypt, cipher)
}

pub fn ofb<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Ofb, Direction::Encrypt, cipher)
}

pub fn ctr<C: BlockCipher + Clone>(cipher: C) -> ModeDescriptor<C> {
    ModeDescriptor::new(ModeKind::Ctr, Direction::Encrypt, cipher)
}

/// Initialise a context from `descriptor` and run `input` through it once.
pub fn one_shot<C: BlockCipher + Clone>(
    descriptor: &ModeDescriptor<C>,
    key: &[u8],
    iv: &[u8],
    input: &[u8],
    output: &mut [u8],
) -> PdcResult<()> {
    let mut ctx = descriptor.init(key, iv)?;
    ctx.transform(input, output)
}
