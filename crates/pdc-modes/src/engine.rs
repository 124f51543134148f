//! Mode engine for CBC, CFB, CFB-8, OFB and CTR.
//!
//! Every context keeps one feedback register of cipher-block width plus a
//! keystream scratch block and a fill offset:
//!
//! ```text
//! CBC   register = last ciphertext block        unit = block
//! CFB   register = ciphertext being assembled   keystream = E(previous register)
//! CFB8  register = shift register of ciphertext one cipher call per byte
//! OFB   register = E^n(IV), used directly as keystream
//! CTR   register = counter block                keystream = E(counter)
//! ```
//!
//! Stream-shaped modes regenerate keystream only when the current block is
//! used up, so short calls never waste a cipher invocation.

use std::fmt;

use pdc_core::bytes::{increment_be, xor_in_place};
use pdc_core::{Block, BlockCipher, Direction, PdcError, PdcResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::factory::ModeKind;

#[derive(Default, Zeroize, ZeroizeOnDrop)]
struct Feedback {
    register: Block,
    keystream: Block,
    offset: usize,
}

/// A keyed mode context.
///
/// Not shareable between threads while in use: every transform mutates the
/// feedback state, so the API takes `&mut self`. Key schedule and feedback
/// state are wiped on drop.
pub struct ModeContext<C: BlockCipher> {
    kind: ModeKind,
    direction: Direction,
    block_size: usize,
    cipher: C,
    schedule: C::Context,
    state: Feedback,
}

/// Run one cipher call; a failing capability is an internal error here since
/// the engine has already validated every length it passes down.
pub(crate) fn run_cipher<C: BlockCipher>(
    cipher: &C,
    schedule: &C::Context,
    block: &mut [u8],
) -> PdcResult<()> {
    cipher
        .transform_in_place(schedule, block)
        .map_err(|e| PdcError::Internal(format!("{} failed: {e}", cipher.name())))
}

impl<C: BlockCipher> ModeContext<C> {
    pub(crate) fn new(
        kind: ModeKind,
        direction: Direction,
        cipher: C,
        schedule: C::Context,
        iv: &[u8],
    ) -> PdcResult<Self> {
        let block_size = cipher.block_size();
        let mut ctx = Self {
            kind,
            direction,
            block_size,
            cipher,
            schedule,
            state: Feedback::default(),
        };
        ctx.set_iv(iv)?;
        Ok(ctx)
    }

    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Block size of the wrapped cipher.
    pub fn cipher_block_size(&self) -> usize {
        self.block_size
    }

    /// Reload the feedback register (the counter block for CTR) and discard
    /// any buffered keystream. The key schedule is kept.
    pub fn set_iv(&mut self, iv: &[u8]) -> PdcResult<()> {
        let bs = self.block_size;
        if iv.len() != bs {
            return Err(PdcError::invalid(format!(
                "{}: iv must be {bs} bytes, got {}",
                self.kind,
                iv.len()
            )));
        }
        self.state.zeroize();
        self.state.register[..bs].copy_from_slice(iv);
        // stream modes start with the keystream exhausted
        self.state.offset = bs;
        Ok(())
    }

    /// Transform `input` into the first `input.len()` bytes of `output`.
    ///
    /// CBC takes whole blocks only; the other modes take any byte count and
    /// carry partial keystream blocks across calls.
    pub fn transform(&mut self, input: &[u8], output: &mut [u8]) -> PdcResult<()> {
        if output.len() < input.len() {
            return Err(PdcError::invalid(format!(
                "{}: output holds {} bytes, input is {}",
                self.kind,
                output.len(),
                input.len()
            )));
        }
        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        self.transform_in_place(out)
    }

    pub fn transform_in_place(&mut self, buf: &mut [u8]) -> PdcResult<()> {
        match (self.kind, self.direction) {
            (ModeKind::Cbc, Direction::Encrypt) => self.cbc_encrypt(buf),
            (ModeKind::Cbc, Direction::Decrypt) => self.cbc_decrypt(buf),
            (ModeKind::Cfb, direction) => self.cfb(buf, direction),
            (ModeKind::Cfb8, direction) => self.cfb8(buf, direction),
            (ModeKind::Ofb, _) => self.ofb(buf),
            (ModeKind::Ctr, _) => self.ctr(buf),
        }
    }

    fn check_whole_blocks(&self, len: usize) -> PdcResult<()> {
        if len % self.block_size != 0 {
            return Err(PdcError::invalid(format!(
                "{}: {len} bytes is not a whole number of {}-byte blocks",
                self.kind, self.block_size
            )));
        }
        Ok(())
    }

    fn cbc_encrypt(&mut self, buf: &mut [u8]) -> PdcResult<()> {
        self.check_whole_blocks(buf.len())?;
        let bs = self.block_size;
        let register = &mut self.state.register[..bs];
        for block in buf.chunks_exact_mut(bs) {
            xor_in_place(block, register);
            run_cipher(&self.cipher, &self.schedule, block)?;
            register.copy_from_slice(block);
        }
        Ok(())
    }

    fn cbc_decrypt(&mut self, buf: &mut [u8]) -> PdcResult<()> {
        self.check_whole_blocks(buf.len())?;
        let bs = self.block_size;
        let Feedback {
            register,
            keystream: saved,
            ..
        } = &mut self.state;
        for block in buf.chunks_exact_mut(bs) {
            // the next register is this ciphertext, not the decrypted output
            saved[..bs].copy_from_slice(block);
            run_cipher(&self.cipher, &self.schedule, block)?;
            xor_in_place(block, &register[..bs]);
            register[..bs].copy_from_slice(&saved[..bs]);
        }
        saved.zeroize();
        Ok(())
    }

    fn cfb(&mut self, buf: &mut [u8], direction: Direction) -> PdcResult<()> {
        let bs = self.block_size;
        let Feedback {
            register,
            keystream,
            offset,
        } = &mut self.state;
        for byte in buf.iter_mut() {
            if *offset == bs {
                keystream[..bs].copy_from_slice(&register[..bs]);
                run_cipher(&self.cipher, &self.schedule, &mut keystream[..bs])?;
                *offset = 0;
            }
            let input = *byte;
            *byte ^= keystream[*offset];
            register[*offset] = match direction {
                Direction::Encrypt => *byte,
                Direction::Decrypt => input,
            };
            *offset += 1;
        }
        Ok(())
    }

    fn cfb8(&mut self, buf: &mut [u8], direction: Direction) -> PdcResult<()> {
        let bs = self.block_size;
        let Feedback {
            register,
            keystream,
            ..
        } = &mut self.state;
        for byte in buf.iter_mut() {
            keystream[..bs].copy_from_slice(&register[..bs]);
            run_cipher(&self.cipher, &self.schedule, &mut keystream[..bs])?;
            let input = *byte;
            *byte ^= keystream[0];
            register.copy_within(1..bs, 0);
            register[bs - 1] = match direction {
                Direction::Encrypt => *byte,
                Direction::Decrypt => input,
            };
        }
        Ok(())
    }

    fn ofb(&mut self, buf: &mut [u8]) -> PdcResult<()> {
        let bs = self.block_size;
        let Feedback {
            register, offset, ..
        } = &mut self.state;
        for byte in buf.iter_mut() {
            if *offset == bs {
                run_cipher(&self.cipher, &self.schedule, &mut register[..bs])?;
                *offset = 0;
            }
            *byte ^= register[*offset];
            *offset += 1;
        }
        Ok(())
    }

    fn ctr(&mut self, buf: &mut [u8]) -> PdcResult<()> {
        let bs = self.block_size;
        let Feedback {
            register: counter,
            keystream,
            offset,
        } = &mut self.state;
        for byte in buf.iter_mut() {
            if *offset == bs {
                keystream[..bs].copy_from_slice(&counter[..bs]);
                run_cipher(&self.cipher, &self.schedule, &mut keystream[..bs])?;
                increment_be(&mut counter[..bs]);
                *offset = 0;
            }
            *byte ^= keystream[*offset];
            *offset += 1;
        }
        Ok(())
    }
}

impl<C: BlockCipher> fmt::Debug for ModeContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeContext")
            .field("kind", &self.kind)
            .field("direction", &self.direction)
            .field("cipher", &self.cipher.name())
            .field("state", &"[REDACTED]")
            .finish()
    }
}
