//! pdc-core: shared pieces of the pdc symmetric-crypto workspace
//!
//! - `cipher`: the block-cipher capability every mode is built from
//! - `error`: the error taxonomy returned by every operation
//! - `config`: TOML-loadable tuning knobs (XTS ceiling, KDF defaults)
//! - `bytes`: xor / counter / shift helpers used by the modes

pub mod bytes;
pub mod cipher;
pub mod config;
pub mod error;

pub use cipher::{check_capability, Block, BlockCipher, Direction, MAX_BLOCK_SIZE};
pub use config::{DigestAlgorithm, KdfConfig, PdcConfig, XtsConfig, XTS_MAX_BLOCKS_PER_TWEAK};
pub use error::{PdcError, PdcResult};
