use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PdcError, PdcResult};

/// FIPS ceiling on blocks processed under a single XTS tweak (2^20).
pub const XTS_MAX_BLOCKS_PER_TWEAK: u64 = 1 << 20;

/// Top-level configuration (loaded from pdc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdcConfig {
    pub xts: XtsConfig,
    pub kdf: KdfConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XtsConfig {
    /// Blocks allowed per tweak before it is exhausted (default and maximum: 2^20)
    pub max_blocks_per_tweak: u64,
}

/// Digest used by HKDF and PBKDF2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Digest output length in bytes
    pub fn output_size(self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha224 => 28,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Digest for HKDF and PBKDF2 (default: sha256)
    pub digest: DigestAlgorithm,
    /// PBKDF2 iteration count (default: 100000)
    pub pbkdf2_iterations: u32,
}

impl Default for XtsConfig {
    fn default() -> Self {
        Self {
            max_blocks_per_tweak: XTS_MAX_BLOCKS_PER_TWEAK,
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::Sha256,
            pbkdf2_iterations: 100_000,
        }
    }
}

impl PdcConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> PdcResult<Self> {
        let config: PdcConfig =
            toml::from_str(s).map_err(|e| PdcError::Config(format!("parsing config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> PdcResult<Self> {
        if !path.exists() {
            tracing::debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> PdcResult<()> {
        let max = self.xts.max_blocks_per_tweak;
        if max == 0 || max > XTS_MAX_BLOCKS_PER_TWEAK {
            return Err(PdcError::Config(format!(
                "xts.max_blocks_per_tweak must be in 1..={XTS_MAX_BLOCKS_PER_TWEAK}, got {max}"
            )));
        }
        if self.kdf.pbkdf2_iterations == 0 {
            return Err(PdcError::Config(
                "kdf.pbkdf2_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
