//! Setup configuration
//!
//! A [`SetupConfig`] describes which range proof engine the public
//! parameters carry and how large the representable token values are.
//!
//! # Presets
//!
//! - [`SetupConfig::bulletproof()`] - logarithmic range proofs over `bit_length` bits
//! - [`SetupConfig::membership()`] - signed digit table with `base^exponent` values
//!
//! # Examples
//!
//! ```
//! # use zkatdlog::config::{RangeEngine, SetupConfig};
//! let config = SetupConfig::membership(100, 2);
//! assert_eq!(config.engine, RangeEngine::Membership);
//!
//! let config = SetupConfig::from_json(r#"{"engine": "bulletproof", "bit_length": 32}"#).unwrap();
//! assert_eq!(config.bit_length, 32);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt, ZkatError};
use crate::setup::DLOG_PUBLIC_PARAMETERS;

/// Range proof construction carried by the public parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeEngine {
    /// Inner-product argument range proofs
    #[default]
    Bulletproof,
    /// Digit decomposition against a table of PS-signed values
    Membership,
}

/// Parameters consumed by [`setup`](crate::setup::setup)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub engine: RangeEngine,
    /// Bulletproof bit length, a power of two up to 64
    pub bit_length: u64,
    /// Membership digit base
    pub base: u64,
    /// Membership digit count
    pub exponent: u64,
    /// Identifier written in the serialized envelope
    pub label: String,
    /// Issuer public key of the owner anonymity scheme, opaque here
    #[serde(with = "hex")]
    pub idemix_issuer_pk: Vec<u8>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            engine: RangeEngine::Bulletproof,
            bit_length: 64,
            base: 100,
            exponent: 2,
            label: DLOG_PUBLIC_PARAMETERS.to_string(),
            idemix_issuer_pk: Vec::new(),
        }
    }
}

impl SetupConfig {
    pub fn bulletproof(bit_length: u64) -> Self {
        Self {
            engine: RangeEngine::Bulletproof,
            bit_length,
            ..Default::default()
        }
    }

    pub fn membership(base: u64, exponent: u64) -> Self {
        Self {
            engine: RangeEngine::Membership,
            base,
            exponent,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_idemix_issuer_pk(mut self, pk: Vec<u8>) -> Self {
        self.idemix_issuer_pk = pk;
        self
    }

    /// Parses a configuration; missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(ZkatError::from)
            .context(|| "failed parsing setup configuration")?;
        if config.label.is_empty() {
            return Err(ZkatError::InvalidInput("setup configuration has an empty label".into()));
        }
        Ok(config)
    }
}
