//! Range correctness of token values
//!
//! Issue and transfer proofs show that every created token carries a value
//! in `[0, max_token]`. Two engines are available and the public parameters
//! decide which one is used:
//!
//! - [`RangeEngine::Bulletproof`] proves each value over the commitment
//!   `token - commitment_to_type`, which only involves the value and
//!   blinding bases.
//! - [`RangeEngine::Membership`] decomposes values into digits signed in a
//!   public table.

pub mod membership;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::RangeEngine;
use crate::error::{Result, ZkatError};
use crate::math::{self, G1, Zr};
use crate::rp;
use crate::setup::PublicParams;
use crate::token::{type_to_zr, TokenDataWitness};

/// Range proof of either engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", content = "proof", rename_all = "lowercase")]
pub enum RangeCorrectness {
    Bulletproof(rp::RangeCorrectness),
    Membership(membership::RangeProof),
}

impl RangeCorrectness {
    pub fn engine(&self) -> RangeEngine {
        match self {
            RangeCorrectness::Bulletproof(_) => RangeEngine::Bulletproof,
            RangeCorrectness::Membership(_) => RangeEngine::Membership,
        }
    }
}

/// Commitment `G0^H(type)·G2^bf` to the type shared by a set of tokens
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TypeCommitment {
    pub commitment: G1,
    pub blinding_factor: Zr,
}

impl TypeCommitment {
    /// Fresh commitment to `token_type`
    pub fn new<R: RngCore + CryptoRng>(token_type: &str, pedersen_generators: &[G1], rng: &mut R) -> Result<Self> {
        if pedersen_generators.len() != 3 {
            return Err(ZkatError::InvalidInput(format!(
                "cannot commit to type: expect [3] generators, got [{}]",
                pedersen_generators.len()
            )));
        }
        let blinding_factor = math::rand_zr(rng);
        Ok(Self {
            commitment: pedersen_generators[0] * type_to_zr(token_type) + pedersen_generators[2] * blinding_factor,
            blinding_factor,
        })
    }
}

pub struct RangeCorrectnessProver<'a> {
    witness: &'a [TokenDataWitness],
    tokens: Vec<G1>,
    commitment_to_type: TypeCommitment,
    pp: &'a PublicParams,
}

impl<'a> RangeCorrectnessProver<'a> {
    pub fn new(
        witness: &'a [TokenDataWitness],
        tokens: Vec<G1>,
        commitment_to_type: TypeCommitment,
        pp: &'a PublicParams,
    ) -> Self {
        Self {
            witness,
            tokens,
            commitment_to_type,
            pp,
        }
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<RangeCorrectness> {
        if self.witness.len() != self.tokens.len() {
            return Err(ZkatError::InvalidInput(format!(
                "cannot compute range proof: [{}] tokens, [{}] witnesses",
                self.tokens.len(),
                self.witness.len()
            )));
        }
        let max = self.pp.max_token_value();
        if let Some(w) = self.witness.iter().find(|w| w.value > max) {
            return Err(ZkatError::OutOfRange { value: w.value, max });
        }

        match self.pp.range_engine() {
            RangeEngine::Bulletproof => {
                let pg = &self.pp.pedersen_generators;
                if pg.len() != 3 {
                    return Err(ZkatError::InvalidParameters("invalid pedersen generators".into()));
                }
                let com_type = &self.commitment_to_type;
                let proof = rp::RangeCorrectnessProver {
                    commitments: self.tokens.iter().map(|t| *t - com_type.commitment).collect(),
                    values: self.witness.iter().map(|w| w.value).collect(),
                    blinding_factors: self
                        .witness
                        .iter()
                        .map(|w| w.blinding_factor - com_type.blinding_factor)
                        .collect(),
                    pedersen_params: [pg[1], pg[2]],
                    params: self.pp.range_proof_params()?,
                }
                .prove(rng)?;
                Ok(RangeCorrectness::Bulletproof(proof))
            }
            RangeEngine::Membership => {
                let proof = membership::RangeProver::new(
                    self.witness,
                    self.tokens.clone(),
                    &self.pp.pedersen_generators,
                    self.pp.membership_params()?,
                )
                .prove(rng)?;
                Ok(RangeCorrectness::Membership(proof))
            }
        }
    }
}

pub struct RangeCorrectnessVerifier<'a> {
    tokens: Vec<G1>,
    commitment_to_type: G1,
    pp: &'a PublicParams,
}

impl<'a> RangeCorrectnessVerifier<'a> {
    pub fn new(tokens: Vec<G1>, commitment_to_type: G1, pp: &'a PublicParams) -> Self {
        Self {
            tokens,
            commitment_to_type,
            pp,
        }
    }

    pub fn verify(&self, proof: &RangeCorrectness) -> Result<()> {
        if proof.engine() != self.pp.range_engine() {
            return Err(ZkatError::InvalidProof(
                "range proof does not match the configured engine".into(),
            ));
        }
        match proof {
            RangeCorrectness::Bulletproof(rc) => {
                let pg = &self.pp.pedersen_generators;
                if pg.len() != 3 {
                    return Err(ZkatError::InvalidParameters("invalid pedersen generators".into()));
                }
                rp::RangeCorrectnessVerifier {
                    commitments: self.tokens.iter().map(|t| *t - self.commitment_to_type).collect(),
                    pedersen_params: [pg[1], pg[2]],
                    params: self.pp.range_proof_params()?,
                }
                .verify(rc)
            }
            RangeCorrectness::Membership(rp) => membership::RangeVerifier::new(
                self.tokens.clone(),
                &self.pp.pedersen_generators,
                self.pp.membership_params()?,
            )
            .verify(rp),
        }
    }
}
