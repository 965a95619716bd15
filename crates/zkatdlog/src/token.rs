//! Confidential tokens
//!
//! A token on the ledger is an owner plus the Pedersen commitment
//! `G0^H(type)·G1^value·G2^bf`. The opening travels off-ledger as
//! [`Metadata`].

use std::fmt;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::common::compute_pedersen_commitment;
use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, G1, Zr};

/// Ledger reference of a token: the transaction that created it and the
/// position among that transaction's outputs
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenID {
    pub tx_id: String,
    pub index: u64,
}

impl TokenID {
    pub fn new(tx_id: impl Into<String>, index: u64) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl fmt::Display for TokenID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.tx_id, self.index)
    }
}

/// Token on the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Serialized owner identity; empty for redeemed tokens
    #[serde(with = "hex")]
    pub owner: Vec<u8>,
    /// Commitment to type, value and blinding factor
    #[serde(with = "encoding::canonical")]
    pub data: G1,
}

impl Token {
    pub fn new(owner: Vec<u8>, data: G1) -> Self {
        Self { owner, data }
    }

    pub fn owner(&self) -> &[u8] {
        &self.owner
    }

    /// A token without owner leaves the system
    pub fn is_redeem(&self) -> bool {
        self.owner.is_empty()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed deserializing token")
    }

    /// Opens the token with `meta`, failing if the opening is not the one
    /// committed to.
    pub fn to_clear(&self, meta: &Metadata, pedersen_generators: &[G1]) -> Result<ClearToken> {
        let com = commit(&meta.token_type, &meta.value, &meta.blinding_factor, pedersen_generators)
            .context(|| "cannot retrieve token in the clear: failed to check token data")?;
        if com != self.data {
            return Err(ZkatError::InvalidInput(
                "cannot retrieve token in the clear: output does not match provided opening".into(),
            ));
        }
        let value = math::zr_to_u64(&meta.value).ok_or_else(|| {
            ZkatError::InvalidInput("cannot retrieve token in the clear: value does not fit in 64 bits".into())
        })?;
        Ok(ClearToken {
            token_type: meta.token_type.clone(),
            quantity: format!("0x{:x}", value),
            owner: self.owner.clone(),
        })
    }
}

/// Token in the clear
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearToken {
    #[serde(rename = "type")]
    pub token_type: String,
    /// Hex quantity, `0x` prefixed
    pub quantity: String,
    #[serde(with = "hex")]
    pub owner: Vec<u8>,
}

/// Opening of a token commitment, known to the token's creator and recipient
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(with = "encoding::canonical")]
    pub value: Zr,
    #[serde(with = "encoding::canonical")]
    pub blinding_factor: Zr,
    /// Owner audit info
    #[serde(with = "hex", default)]
    pub owner: Vec<u8>,
    /// Issuer identity, set for issued tokens only
    #[serde(with = "hex", default)]
    pub issuer: Vec<u8>,
}

impl Metadata {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed deserializing metadata")
    }
}

/// Opening of a token commitment used by provers
#[derive(Clone, Debug, PartialEq)]
pub struct TokenDataWitness {
    pub token_type: String,
    pub value: u64,
    pub blinding_factor: Zr,
}

impl TokenDataWitness {
    pub fn new(token_type: impl Into<String>, value: u64, blinding_factor: Zr) -> Self {
        Self {
            token_type: token_type.into(),
            value,
            blinding_factor,
        }
    }

    /// Witnesses sharing one type
    pub fn from_values(token_type: &str, values: &[u64], blinding_factors: &[Zr]) -> Result<Vec<Self>> {
        if values.len() != blinding_factors.len() {
            return Err(ZkatError::InvalidInput(format!(
                "cannot create token witness: [{}] values, [{}] blinding factors",
                values.len(),
                blinding_factors.len()
            )));
        }
        Ok(values
            .iter()
            .zip(blinding_factors)
            .map(|(v, bf)| Self::new(token_type, *v, *bf))
            .collect())
    }

    /// Commitment to this opening
    pub fn commit(&self, pedersen_generators: &[G1]) -> Result<G1> {
        commit(
            &self.token_type,
            &math::zr_from_u64(self.value),
            &self.blinding_factor,
            pedersen_generators,
        )
    }

    pub fn to_metadata(&self, owner: Vec<u8>, issuer: Vec<u8>) -> Metadata {
        Metadata {
            token_type: self.token_type.clone(),
            value: math::zr_from_u64(self.value),
            blinding_factor: self.blinding_factor,
            owner,
            issuer,
        }
    }
}

/// Maps a token type to the scalar it is committed as
pub fn type_to_zr(token_type: &str) -> Zr {
    math::hash_to_zr(token_type.as_bytes())
}

fn commit(token_type: &str, value: &Zr, bf: &Zr, pedersen_generators: &[G1]) -> Result<G1> {
    compute_pedersen_commitment(&[type_to_zr(token_type), *value, *bf], pedersen_generators)
}

/// Commitments to each witness
pub fn compute_tokens(witness: &[TokenDataWitness], pedersen_generators: &[G1]) -> Result<Vec<G1>> {
    witness
        .iter()
        .enumerate()
        .map(|(i, w)| w.commit(pedersen_generators).context(|| format!("failed to compute token [{}]", i)))
        .collect()
}

/// Fresh commitments to `values` of `token_type`, with their openings
pub fn get_tokens_with_witness<R: RngCore + CryptoRng>(
    values: &[u64],
    token_type: &str,
    pedersen_generators: &[G1],
    rng: &mut R,
) -> Result<(Vec<G1>, Vec<TokenDataWitness>)> {
    let witness: Vec<TokenDataWitness> = values
        .iter()
        .map(|v| TokenDataWitness::new(token_type, *v, math::rand_zr(&mut *rng)))
        .collect();
    let tokens = compute_tokens(&witness, pedersen_generators).context(|| "cannot get tokens with witness")?;
    Ok((tokens, witness))
}
