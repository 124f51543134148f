//! ChaCha20-Poly1305 context, incremental and one-shot.

use std::fmt;

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use pdc_core::{PdcError, PdcResult};
use poly1305::universal_hash::{KeyInit, UniversalHash};
use poly1305::{Block, Poly1305};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
/// Largest message RFC 7539 allows under one nonce: 2^32 - 1 blocks of 64
/// bytes, minus block 0 which keys Poly1305.
pub const TEXT_MAX_BYTES: u64 = (1 << 38) - 64;

const MAC_BLOCK: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadState {
    SetNonce,
    Aad,
    Encrypt,
    Decrypt,
    Final,
}

impl AeadState {
    pub fn as_str(self) -> &'static str {
        match self {
            AeadState::SetNonce => "set-nonce",
            AeadState::Aad => "aad",
            AeadState::Encrypt => "encrypt",
            AeadState::Decrypt => "decrypt",
            AeadState::Final => "final",
        }
    }
}

impl fmt::Display for AeadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Poly1305 fed with arbitrary-length pieces. Padding is only applied when
/// asked, so consecutive `aad` calls are MACed as one contiguous string.
struct MacInput {
    mac: Poly1305,
    buffer: Zeroizing<[u8; MAC_BLOCK]>,
    buffered: usize,
}

impl MacInput {
    fn new(one_time_key: &[u8]) -> Self {
        Self {
            mac: Poly1305::new(poly1305::Key::from_slice(one_time_key)),
            buffer: Zeroizing::new([0u8; MAC_BLOCK]),
            buffered: 0,
        }
    }

    fn update(&mut self, mut data: &[u8]) {
        if self.buffered > 0 {
            let take = (MAC_BLOCK - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];
            if self.buffered < MAC_BLOCK {
                return;
            }
            self.mac.update(&[Block::clone_from_slice(&self.buffer[..])]);
            self.buffered = 0;
        }
        let mut blocks = data.chunks_exact(MAC_BLOCK);
        for block in &mut blocks {
            self.mac.update(&[Block::clone_from_slice(block)]);
        }
        let rest = blocks.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
        self.buffered = rest.len();
    }

    /// Zero-pad what has been fed so far to a 16-byte boundary.
    fn pad(&mut self) {
        if self.buffered > 0 {
            self.buffer[self.buffered..].fill(0);
            self.mac.update(&[Block::clone_from_slice(&self.buffer[..])]);
            self.buffered = 0;
        }
    }

    fn finish(mut self, aad_len: u64, text_len: u64) -> [u8; TAG_SIZE] {
        self.pad();
        let mut lengths = [0u8; MAC_BLOCK];
        lengths[..8].copy_from_slice(&aad_len.to_le_bytes());
        lengths[8..].copy_from_slice(&text_len.to_le_bytes());
        self.mac.update(&[Block::clone_from_slice(&lengths)]);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&self.mac.finalize());
        tag
    }
}

/// Per-nonce state. Both halves wipe themselves when dropped.
struct Session {
    cipher: ChaCha20,
    mac: MacInput,
}

/// ChaCha20-Poly1305 context.
///
/// The key outlives messages: `reset` starts a new message under the same
/// key, and the key is wiped when the context is dropped.
pub struct ChaChaPoly {
    key: [u8; KEY_SIZE],
    state: AeadState,
    session: Option<Session>,
    aad_len: u64,
    text_len: u64,
}

impl ChaChaPoly {
    pub fn new(key: &[u8]) -> PdcResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(PdcError::invalid(format!(
                "chacha20-poly1305: key must be {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        let mut k = [0u8; KEY_SIZE];
        k.copy_from_slice(key);
        Ok(Self {
            key: k,
            state: AeadState::SetNonce,
            session: None,
            aad_len: 0,
            text_len: 0,
        })
    }

    pub fn state(&self) -> AeadState {
        self.state
    }

    pub fn aad_len(&self) -> u64 {
        self.aad_len
    }

    pub fn text_len(&self) -> u64 {
        self.text_len
    }

    fn refuse(&self, operation: &'static str) -> PdcError {
        tracing::debug!(
            operation,
            state = self.state.as_str(),
            "chacha20-poly1305 call out of sequence"
        );
        PdcError::CallSequence {
            operation,
            state: self.state.as_str(),
        }
    }

    fn session_mut(&mut self) -> PdcResult<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| PdcError::Internal("chacha20-poly1305: no message in progress".into()))
    }

    /// Start a message: derive the one-time Poly1305 key from keystream
    /// block 0. Text encryption starts at block 1.
    pub fn set_nonce(&mut self, nonce: &[u8]) -> PdcResult<()> {
        if self.state != AeadState::SetNonce {
            return Err(self.refuse("set_nonce"));
        }
        if nonce.len() != NONCE_SIZE {
            return Err(PdcError::invalid(format!(
                "chacha20-poly1305: nonce must be {NONCE_SIZE} bytes, got {}",
                nonce.len()
            )));
        }
        let mut cipher = ChaCha20::new(
            chacha20::Key::from_slice(&self.key),
            chacha20::Nonce::from_slice(nonce),
        );
        let mut block0 = Zeroizing::new([0u8; 64]);
        cipher.apply_keystream(&mut block0[..]);
        let mac = MacInput::new(&block0[..32]);
        self.session = Some(Session { cipher, mac });
        self.state = AeadState::Aad;
        Ok(())
    }

    /// Authenticate `data` as associated data. May be called any number of
    /// times before the first `encrypt`/`decrypt`.
    pub fn aad(&mut self, data: &[u8]) -> PdcResult<()> {
        if self.state != AeadState::Aad {
            return Err(self.refuse("aad"));
        }
        let total = self
            .aad_len
            .checked_add(data.len() as u64)
            .ok_or_else(|| PdcError::Overflow("chacha20-poly1305: aad length".into()))?;
        self.session_mut()?.mac.update(data);
        self.aad_len = total;
        Ok(())
    }

    /// Shared entry check for `encrypt` and `decrypt`. Nothing changes when
    /// this fails.
    fn begin_text(
        &mut self,
        operation: &'static str,
        target: AeadState,
        len: usize,
    ) -> PdcResult<()> {
        if self.state != AeadState::Aad && self.state != target {
            return Err(self.refuse(operation));
        }
        let total = self
            .text_len
            .checked_add(len as u64)
            .filter(|total| *total <= TEXT_MAX_BYTES)
            .ok_or_else(|| {
                PdcError::Overflow(format!(
                    "chacha20-poly1305: {} + {len} bytes exceeds {TEXT_MAX_BYTES}",
                    self.text_len
                ))
            })?;
        if self.state == AeadState::Aad {
            self.session_mut()?.mac.pad();
            self.state = target;
        }
        self.text_len = total;
        Ok(())
    }

    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) -> PdcResult<()> {
        self.begin_text("encrypt", AeadState::Encrypt, buf.len())?;
        let session = self.session_mut()?;
        session.cipher.apply_keystream(buf);
        session.mac.update(buf);
        Ok(())
    }

    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) -> PdcResult<()> {
        self.begin_text("decrypt", AeadState::Decrypt, buf.len())?;
        let session = self.session_mut()?;
        // MAC covers the ciphertext, so it goes first
        session.mac.update(buf);
        session.cipher.apply_keystream(buf);
        Ok(())
    }

    fn check_output(input: usize, output: usize) -> PdcResult<()> {
        if output < input {
            return Err(PdcError::invalid(format!(
                "chacha20-poly1305: output holds {output} bytes, input is {input}"
            )));
        }
        Ok(())
    }

    pub fn encrypt(&mut self, plaintext: &[u8], ciphertext: &mut [u8]) -> PdcResult<()> {
        Self::check_output(plaintext.len(), ciphertext.len())?;
        let out = &mut ciphertext[..plaintext.len()];
        out.copy_from_slice(plaintext);
        self.encrypt_in_place(out)
    }

    pub fn decrypt(&mut self, ciphertext: &[u8], plaintext: &mut [u8]) -> PdcResult<()> {
        Self::check_output(ciphertext.len(), plaintext.len())?;
        let out = &mut plaintext[..ciphertext.len()];
        out.copy_from_slice(ciphertext);
        self.decrypt_in_place(out)
    }

    fn finish(&mut self, operation: &'static str) -> PdcResult<[u8; TAG_SIZE]> {
        match self.state {
            AeadState::Aad | AeadState::Encrypt | AeadState::Decrypt => {}
            _ => return Err(self.refuse(operation)),
        }
        let Session { cipher, mac } = self
            .session
            .take()
            .ok_or_else(|| PdcError::Internal("chacha20-poly1305: no message in progress".into()))?;
        drop(cipher);
        let tag = mac.finish(self.aad_len, self.text_len);
        self.state = AeadState::Final;
        Ok(tag)
    }

    /// Close the message and write its tag. Per-message state is wiped.
    pub fn finalize(&mut self, tag: &mut [u8; TAG_SIZE]) -> PdcResult<()> {
        *tag = self.finish("finalize")?;
        Ok(())
    }

    /// Close the message and compare its tag with `expected` in constant
    /// time.
    pub fn verify(&mut self, expected: &[u8]) -> PdcResult<()> {
        if expected.len() != TAG_SIZE {
            return Err(PdcError::invalid(format!(
                "chacha20-poly1305: tag must be {TAG_SIZE} bytes, got {}",
                expected.len()
            )));
        }
        let mut computed = self.finish("verify")?;
        let ok = computed[..].ct_eq(expected);
        computed.zeroize();
        if bool::from(ok) {
            Ok(())
        } else {
            tracing::debug!("chacha20-poly1305 tag mismatch");
            Err(PdcError::AuthenticationFailure)
        }
    }

    /// Drop any message in progress and wait for a new nonce. The key is
    /// kept.
    pub fn reset(&mut self) {
        self.session = None;
        self.aad_len = 0;
        self.text_len = 0;
        self.state = AeadState::SetNonce;
    }
}

impl Drop for ChaChaPoly {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for ChaChaPoly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaChaPoly")
            .field("key", &"[REDACTED]")
            .field("state", &self.state)
            .field("aad_len", &self.aad_len)
            .field("text_len", &self.text_len)
            .finish()
    }
}

pub fn encrypt_oneshot(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    ciphertext: &mut [u8],
    tag: &mut [u8; TAG_SIZE],
) -> PdcResult<()> {
    let mut ctx = ChaChaPoly::new(key)?;
    ctx.set_nonce(nonce)?;
    ctx.aad(aad)?;
    ctx.encrypt(plaintext, ciphertext)?;
    ctx.finalize(tag)
}

/// Decrypt and verify in one call. On tag mismatch the plaintext written so
/// far is wiped.
pub fn decrypt_oneshot(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    plaintext: &mut [u8],
    tag: &[u8],
) -> PdcResult<()> {
    if tag.len() != TAG_SIZE {
        return Err(PdcError::invalid(format!(
            "chacha20-poly1305: tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }
    let mut ctx = ChaChaPoly::new(key)?;
    ctx.set_nonce(nonce)?;
    ctx.aad(aad)?;
    ctx.decrypt(ciphertext, plaintext)?;
    if let Err(e) = ctx.verify(tag) {
        plaintext[..ciphertext.len()].zeroize();
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chacha20poly1305::aead::{Aead, Payload};
    use proptest::prelude::*;

    const PLAINTEXT: &[u8] = b"Ladies and Gentlemen of the class of '99: If I could offer you \
only one tip for the future, sunscreen would be it.";
    const CIPHERTEXT: &str = "d31a8d34648e60db7b86afbc53ef7ec2a4aded51296e08fea9e2b5a736ee62d6\
3dbea45e8ca9671282fafb69da92728b1a71de0a9e060b2905d6a5b67ecd3b36\
92ddbd7f2d778b8c9803aee328091b58fab324e4fad675945585808b4831d7bc\
3ff4def08e4b7a9de576d26586cec64b6116";
    const TAG: &str = "1ae10b594f09e26a7e902ecbd0600691";

    fn key() -> Vec<u8> {
        (0x80u8..=0x9f).collect()
    }

    fn nonce() -> Vec<u8> {
        hex::decode("070000004041424344454647").unwrap()
    }

    fn aad() -> Vec<u8> {
        hex::decode("50515253c0c1c2c3c4c5c6c7").unwrap()
    }

    fn keyed() -> ChaChaPoly {
        let mut ctx = ChaChaPoly::new(&key()).unwrap();
        ctx.set_nonce(&nonce()).unwrap();
        ctx
    }

    #[test]
    fn test_rfc7539_2_8_2() {
        let mut ctx = keyed();
        ctx.aad(&aad()).unwrap();
        let mut ct = vec![0u8; PLAINTEXT.len()];
        ctx.encrypt(PLAINTEXT, &mut ct).unwrap();
        let mut tag = [0u8; TAG_SIZE];
        ctx.finalize(&mut tag).unwrap();

        assert_eq!(hex::encode(&ct), CIPHERTEXT);
        assert_eq!(hex::encode(tag), TAG);
        assert_eq!(ctx.state(), AeadState::Final);
        assert_eq!(ctx.aad_len(), 12);
        assert_eq!(ctx.text_len(), 114);
    }

    #[test]
    fn test_rfc7539_decrypt_and_verify() {
        let mut ctx = keyed();
        ctx.aad(&aad()).unwrap();
        let mut pt = hex::decode(CIPHERTEXT).unwrap();
        ctx.decrypt_in_place(&mut pt).unwrap();
        ctx.verify(&hex::decode(TAG).unwrap()).unwrap();
        assert_eq!(pt, PLAINTEXT);
    }

    #[test]
    fn test_piecewise_calls_match() {
        let mut ctx = keyed();
        let a = aad();
        ctx.aad(&a[..5]).unwrap();
        ctx.aad(&a[5..]).unwrap();
        let mut ct = PLAINTEXT.to_vec();
        for chunk in ct.chunks_mut(7) {
            ctx.encrypt_in_place(chunk).unwrap();
        }
        let mut tag = [0u8; TAG_SIZE];
        ctx.finalize(&mut tag).unwrap();
        assert_eq!(hex::encode(&ct), CIPHERTEXT);
        assert_eq!(hex::encode(tag), TAG);
    }

    #[test]
    fn test_aad_after_encrypt_is_call_sequence() {
        let mut ctx = keyed();
        let mut buf = [0u8; 4];
        ctx.encrypt_in_place(&mut buf).unwrap();
        let err = ctx.aad(b"late").unwrap_err();
        assert!(
            matches!(err, PdcError::CallSequence { operation: "aad", state: "encrypt" }),
            "{err}"
        );
    }

    #[test]
    fn test_direction_switch_is_call_sequence() {
        let mut ctx = keyed();
        let mut buf = [0u8; 4];
        ctx.decrypt_in_place(&mut buf).unwrap();
        assert!(matches!(
            ctx.encrypt_in_place(&mut buf),
            Err(PdcError::CallSequence { .. })
        ));
        assert_eq!(ctx.text_len(), 4, "refused call leaves counters alone");
    }

    #[test]
    fn test_operations_before_nonce_and_after_final() {
        let mut ctx = ChaChaPoly::new(&key()).unwrap();
        assert!(matches!(ctx.aad(b"x"), Err(PdcError::CallSequence { .. })));
        let mut tag = [0u8; TAG_SIZE];
        assert!(matches!(ctx.finalize(&mut tag), Err(PdcError::CallSequence { .. })));

        ctx.set_nonce(&nonce()).unwrap();
        assert!(matches!(ctx.set_nonce(&nonce()), Err(PdcError::CallSequence { .. })));
        ctx.finalize(&mut tag).unwrap();
        assert!(matches!(ctx.verify(&tag), Err(PdcError::CallSequence { .. })));
        let mut buf = [0u8; 1];
        assert!(matches!(ctx.encrypt_in_place(&mut buf), Err(PdcError::CallSequence { .. })));
    }

    #[test]
    fn test_one_bit_tag_flip_fails() {
        let mut tag = hex::decode(TAG).unwrap();
        tag[15] ^= 0x01;
        let mut ctx = keyed();
        ctx.aad(&aad()).unwrap();
        let mut pt = hex::decode(CIPHERTEXT).unwrap();
        ctx.decrypt_in_place(&mut pt).unwrap();
        assert!(matches!(ctx.verify(&tag), Err(PdcError::AuthenticationFailure)));
    }

    #[test]
    fn test_oneshot_wipes_plaintext_on_mismatch() {
        let ct = hex::decode(CIPHERTEXT).unwrap();
        let mut tag = hex::decode(TAG).unwrap();
        tag[0] ^= 0x80;
        let mut pt = vec![0xEEu8; ct.len()];
        let err = decrypt_oneshot(&key(), &nonce(), &aad(), &ct, &mut pt, &tag).unwrap_err();
        assert!(matches!(err, PdcError::AuthenticationFailure));
        assert!(pt.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_oneshot_round_trip() {
        let mut ct = vec![0u8; PLAINTEXT.len()];
        let mut tag = [0u8; TAG_SIZE];
        encrypt_oneshot(&key(), &nonce(), &aad(), PLAINTEXT, &mut ct, &mut tag).unwrap();
        assert_eq!(hex::encode(tag), TAG);
        let mut pt = vec![0u8; ct.len()];
        decrypt_oneshot(&key(), &nonce(), &aad(), &ct, &mut pt, &tag).unwrap();
        assert_eq!(pt, PLAINTEXT);
    }

    #[test]
    fn test_empty_message_tag_from_aad_state() {
        // finalize straight from aad is legal and matches the reference
        let mut ctx = keyed();
        ctx.aad(b"header only").unwrap();
        let mut tag = [0u8; TAG_SIZE];
        ctx.finalize(&mut tag).unwrap();

        let oracle = <chacha20poly1305::ChaCha20Poly1305 as chacha20poly1305::KeyInit>::new(
            chacha20poly1305::Key::from_slice(&key()),
        );
        let sealed = oracle
            .encrypt(
                chacha20poly1305::Nonce::from_slice(&nonce()),
                Payload {
                    msg: b"",
                    aad: b"header only",
                },
            )
            .unwrap();
        assert_eq!(&sealed[..], &tag[..]);
    }

    #[test]
    fn test_text_limit() {
        let mut ctx = keyed();
        ctx.text_len = TEXT_MAX_BYTES - 1;
        let mut two = [0u8; 2];
        let err = ctx.encrypt_in_place(&mut two).unwrap_err();
        assert!(matches!(err, PdcError::Overflow(_)), "{err}");
        assert_eq!(two, [0u8; 2], "nothing processed");
        assert_eq!(ctx.state(), AeadState::Aad);

        let mut one = [0u8; 1];
        ctx.encrypt_in_place(&mut one).unwrap();
        assert_eq!(ctx.text_len(), TEXT_MAX_BYTES);
    }

    #[test]
    fn test_reset_keeps_key() {
        let mut ctx = keyed();
        let mut junk = [1u8; 9];
        ctx.encrypt_in_place(&mut junk).unwrap();
        ctx.reset();
        assert_eq!(ctx.state(), AeadState::SetNonce);
        assert_eq!(ctx.text_len(), 0);

        ctx.set_nonce(&nonce()).unwrap();
        ctx.aad(&aad()).unwrap();
        let mut ct = PLAINTEXT.to_vec();
        ctx.encrypt_in_place(&mut ct).unwrap();
        assert_eq!(hex::encode(&ct), CIPHERTEXT);
    }

    #[test]
    fn test_parameter_lengths() {
        assert!(matches!(ChaChaPoly::new(&[0u8; 16]), Err(PdcError::InvalidParameter(_))));
        let mut ctx = ChaChaPoly::new(&key()).unwrap();
        assert!(matches!(ctx.set_nonce(&[0u8; 8]), Err(PdcError::InvalidParameter(_))));
        assert_eq!(ctx.state(), AeadState::SetNonce);
        ctx.set_nonce(&nonce()).unwrap();
        assert!(matches!(ctx.verify(&[0u8; 8]), Err(PdcError::InvalidParameter(_))));
        assert_eq!(ctx.state(), AeadState::Aad, "short tag does not close the message");
    }

    #[test]
    fn test_debug_redacts_key() {
        let ctx = ChaChaPoly::new(&key()).unwrap();
        let shown = format!("{ctx:?}");
        assert!(shown.contains("[REDACTED]"));
        assert!(!shown.contains("128"), "key bytes must not leak: {shown}");
    }

    proptest! {
        #[test]
        fn prop_matches_reference_crate(
            key in proptest::array::uniform32(any::<u8>()),
            nonce in proptest::array::uniform12(any::<u8>()),
            aad in proptest::collection::vec(any::<u8>(), 0..40),
            msg in proptest::collection::vec(any::<u8>(), 0..300),
            split in 0usize..300,
        ) {
            let oracle = <chacha20poly1305::ChaCha20Poly1305 as chacha20poly1305::KeyInit>::new(
                chacha20poly1305::Key::from_slice(&key),
            );
            let sealed = oracle
                .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), Payload { msg: &msg, aad: &aad })
                .unwrap();

            let at = split.min(msg.len());
            let mut ctx = ChaChaPoly::new(&key).unwrap();
            ctx.set_nonce(&nonce).unwrap();
            ctx.aad(&aad).unwrap();
            let mut ct = msg.clone();
            let (a, b) = ct.split_at_mut(at);
            ctx.encrypt_in_place(a).unwrap();
            ctx.encrypt_in_place(b).unwrap();
            let mut tag = [0u8; TAG_SIZE];
            ctx.finalize(&mut tag).unwrap();

            prop_assert_eq!(&sealed[..msg.len()], &ct[..]);
            prop_assert_eq!(&sealed[msg.len()..], &tag[..]);

            let mut pt = vec![0u8; ct.len()];
            decrypt_oneshot(&key, &nonce, &aad, &ct, &mut pt, &tag).unwrap();
            prop_assert_eq!(pt, msg);
        }
    }
}
