//! Ready-made AES descriptors.
//!
//! Each accessor builds its descriptor on first use and hands out the same
//! `'static` reference afterwards.

use std::sync::OnceLock;

use pdc_ciphers::{Aes, AES_DECRYPT, AES_ENCRYPT};

use crate::factory::{self, ModeDescriptor};
use crate::xts::{self, XtsMode};

pub fn ecb_encrypt_mode() -> &'static Aes {
    &AES_ENCRYPT
}

pub fn ecb_decrypt_mode() -> &'static Aes {
    &AES_DECRYPT
}

macro_rules! aes_mode {
    ($name:ident, $ty:ty, $build:expr) => {
        pub fn $name() -> &'static $ty {
            static MODE: OnceLock<$ty> = OnceLock::new();
            MODE.get_or_init(|| $build)
        }
    };
}

aes_mode!(cbc_encrypt_mode, ModeDescriptor<Aes>, factory::cbc_encrypt(AES_ENCRYPT));
aes_mode!(cbc_decrypt_mode, ModeDescriptor<Aes>, factory::cbc_decrypt(AES_DECRYPT));
aes_mode!(cfb_encrypt_mode, ModeDescriptor<Aes>, factory::cfb_encrypt(AES_ENCRYPT));
aes_mode!(cfb_decrypt_mode, ModeDescriptor<Aes>, factory::cfb_decrypt(AES_ENCRYPT));
aes_mode!(cfb8_encrypt_mode, ModeDescriptor<Aes>, factory::cfb8_encrypt(AES_ENCRYPT));
aes_mode!(cfb8_decrypt_mode, ModeDescriptor<Aes>, factory::cfb8_decrypt(AES_ENCRYPT));
aes_mode!(ofb_crypt_mode, ModeDescriptor<Aes>, factory::ofb(AES_ENCRYPT));
aes_mode!(ctr_crypt_mode, ModeDescriptor<Aes>, factory::ctr(AES_ENCRYPT));
aes_mode!(xts_encrypt_mode, XtsMode<Aes, Aes>, xts::xts_encrypt(AES_ENCRYPT, AES_ENCRYPT));
aes_mode!(xts_decrypt_mode, XtsMode<Aes, Aes>, xts::xts_decrypt(AES_DECRYPT, AES_ENCRYPT));
