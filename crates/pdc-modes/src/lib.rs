//! pdc-modes: block-cipher modes and the constructs built on them
//!
//! Any [`pdc_core::BlockCipher`] capability can be turned into a mode:
//!
//! ```text
//! factory   ModeDescriptor<C> for CBC / CFB / CFB-8 / OFB / CTR
//! engine    ModeContext<C>, the keyed per-message state
//! xts       XtsMode<D, T> + XtsContext + XtsTweak (IEEE 1619)
//! pad       PKCS#7 over ECB and CBC
//! cmac      NIST SP 800-38B over a CBC-encrypt descriptor
//! wrap      RFC 3394 key wrap over a 128-bit ECB capability
//! aes       cached AES descriptors
//! ```

pub mod aes;
pub mod cmac;
pub mod engine;
pub mod factory;
pub mod pad;
pub mod wrap;
pub mod xts;

pub use cmac::{cmac, generate_subkeys, CmacContext, CmacSubkeys};
pub use engine::ModeContext;
pub use factory::{
    cbc_decrypt, cbc_encrypt, cfb8_decrypt, cfb8_encrypt, cfb_decrypt, cfb_encrypt, ctr, ofb,
    one_shot, ModeDescriptor, ModeKind,
};
pub use pad::{
    padded_size, pkcs7_cbc_decrypt, pkcs7_cbc_encrypt, pkcs7_decode, pkcs7_ecb_decrypt,
    pkcs7_ecb_encrypt,
};
pub use wrap::{unwrap, unwrap_with_iv, unwrapped_size, wrap, wrap_with_iv, wrapped_size};
pub use xts::{xts_decrypt, xts_encrypt, TweakState, XtsContext, XtsMode, XtsTweak};
