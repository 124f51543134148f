//! Runtime-selected cipher capability.
//!
//! `AnyCipher` lets callers pick the algorithm from data (a config value, a
//! header byte) while still handing a single concrete type to the mode
//! factory. Dispatch is a `match` over the key-schedule enum.

use std::fmt;
use std::str::FromStr;

use pdc_core::{BlockCipher, Direction, PdcError, PdcResult};

use crate::aes::{Aes, AesKey};
use crate::ecb::{crypt_blocks, Blowfish, Des, TripleDes2, TripleDes3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Aes,
    Des,
    TripleDes2,
    TripleDes3,
    Blowfish,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Aes => "aes",
            Algorithm::Des => "des",
            Algorithm::TripleDes2 => "3des-ede2",
            Algorithm::TripleDes3 => "3des-ede3",
            Algorithm::Blowfish => "blowfish",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = PdcError;

    fn from_str(s: &str) -> PdcResult<Self> {
        match s {
            "aes" => Ok(Algorithm::Aes),
            "des" => Ok(Algorithm::Des),
            "3des-ede2" => Ok(Algorithm::TripleDes2),
            "3des-ede3" | "3des" => Ok(Algorithm::TripleDes3),
            "blowfish" => Ok(Algorithm::Blowfish),
            other => Err(PdcError::invalid(format!("unknown cipher algorithm '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnyCipher {
    algorithm: Algorithm,
    direction: Direction,
}

impl AnyCipher {
    pub const fn new(algorithm: Algorithm, direction: Direction) -> Self {
        Self {
            algorithm,
            direction,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

pub enum AnyKey {
    Aes(AesKey),
    Des(des::Des),
    TripleDes2(des::TdesEde2),
    TripleDes3(des::TdesEde3),
    Blowfish(blowfish::Blowfish),
}

impl fmt::Debug for AnyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let algorithm = match self {
            AnyKey::Aes(_) => Algorithm::Aes,
            AnyKey::Des(_) => Algorithm::Des,
            AnyKey::TripleDes2(_) => Algorithm::TripleDes2,
            AnyKey::TripleDes3(_) => Algorithm::TripleDes3,
            AnyKey::Blowfish(_) => Algorithm::Blowfish,
        };
        f.debug_struct("AnyKey")
            .field("algorithm", &algorithm)
            .field("schedule", &"[REDACTED]")
            .finish()
    }
}

impl BlockCipher for AnyCipher {
    type Context = AnyKey;

    fn name(&self) -> &'static str {
        self.algorithm.as_str()
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn block_size(&self) -> usize {
        match self.algorithm {
            Algorithm::Aes => 16,
            Algorithm::Des | Algorithm::TripleDes2 | Algorithm::TripleDes3 | Algorithm::Blowfish => 8,
        }
    }

    fn init(&self, key: &[u8]) -> PdcResult<AnyKey> {
        let name = self.name();
        let d = self.direction;
        Ok(match self.algorithm {
            Algorithm::Aes => AnyKey::Aes(Aes::new(d).init(key)?),
            Algorithm::Des => AnyKey::Des(Des::new(name, d).init(key)?),
            Algorithm::TripleDes2 => AnyKey::TripleDes2(TripleDes2::new(name, d).init(key)?),
            Algorithm::TripleDes3 => AnyKey::TripleDes3(TripleDes3::new(name, d).init(key)?),
            Algorithm::Blowfish => AnyKey::Blowfish(Blowfish::new(name, d).init(key)?),
        })
    }

    fn transform_in_place(&self, ctx: &AnyKey, blocks: &mut [u8]) -> PdcResult<()> {
        let name = self.name();
        match ctx {
            AnyKey::Aes(k) => Aes::new(self.direction).transform_in_place(k, blocks),
            AnyKey::Des(c) => crypt_blocks(c, self.direction, name, blocks),
            AnyKey::TripleDes2(c) => crypt_blocks(c, self.direction, name, blocks),
            AnyKey::TripleDes3(c) => crypt_blocks(c, self.direction, name, blocks),
            AnyKey::Blowfish(c) => crypt_blocks(c, self.direction, name, blocks),
        }
    }
}
