//! Bulletproof range correctness
//!
//! One [`RangeProof`] per commitment, each showing the committed value lies
//! in `[0, 2^bit_length)`. Commitments are two-base Pedersen commitments
//! `G^v·H^bf`; token commitments are brought into that shape by removing
//! the commitment to the token type first.

pub mod bulletproof;
pub mod ipa;

use log::trace;
use rand_core::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, Zero, G1, Zr};

pub use bulletproof::RangeProof;
pub use ipa::IPA;

use bulletproof::{RangeProver, RangeVerifier};

/// Generators and sizes shared by every bulletproof
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeProofParams {
    #[serde(with = "encoding::canonical_vec")]
    pub left_generators: Vec<G1>,
    #[serde(with = "encoding::canonical_vec")]
    pub right_generators: Vec<G1>,
    #[serde(with = "encoding::canonical")]
    pub p: G1,
    #[serde(with = "encoding::canonical")]
    pub q: G1,
    pub bit_length: u64,
    pub number_of_rounds: u64,
}

impl RangeProofParams {
    /// Derives the generators for `bit_length`-bit proofs by hashing fixed
    /// labels, so nobody knows their discrete-log relations.
    pub fn new(bit_length: u64) -> Result<Self> {
        if bit_length == 0 || bit_length > 64 || !bit_length.is_power_of_two() {
            return Err(ZkatError::InvalidParameters(format!(
                "invalid range proof parameters: bit length [{}] must be a power of two in [1, 64]",
                bit_length
            )));
        }
        let mut left_generators = Vec::with_capacity(bit_length as usize);
        let mut right_generators = Vec::with_capacity(bit_length as usize);
        for i in 0..bit_length {
            left_generators.push(math::hash_to_g1(format!("RangeProof.{}", 2 * (i + 1)).as_bytes()));
            right_generators.push(math::hash_to_g1(format!("RangeProof.{}", 2 * (i + 1) + 1).as_bytes()));
        }
        Ok(Self {
            left_generators,
            right_generators,
            p: math::hash_to_g1(b"RangeProof.P"),
            q: math::hash_to_g1(b"RangeProof.Q"),
            bit_length,
            number_of_rounds: bit_length.trailing_zeros() as u64,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| {
            Err(ZkatError::InvalidParameters(format!(
                "invalid range proof parameters: {}",
                msg
            )))
        };
        if self.bit_length == 0 {
            return invalid("bit length is zero");
        }
        if self.number_of_rounds == 0 {
            return invalid("number of rounds is zero");
        }
        if self.number_of_rounds > 64 {
            return invalid("number of rounds must be smaller or equal to 64");
        }
        if self.bit_length > 64 {
            return invalid("bit length must be smaller or equal to 64");
        }
        let expected = u32::try_from(self.number_of_rounds)
            .ok()
            .and_then(|r| 1u64.checked_shl(r));
        if expected != Some(self.bit_length) {
            return invalid("bit length should be 2^number of rounds");
        }
        if self.left_generators.len() != self.bit_length as usize {
            return invalid("length of left generators does not match bit length");
        }
        if self.right_generators.len() != self.bit_length as usize {
            return invalid("length of right generators does not match bit length");
        }
        if self.p.is_zero() || self.q.is_zero() {
            return invalid("generator is the identity");
        }
        Ok(())
    }

    /// Largest value a proof can cover
    pub fn max_value(&self) -> u64 {
        if self.bit_length >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_length) - 1
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeCorrectness {
    pub proofs: Vec<RangeProof>,
}

pub struct RangeCorrectnessProver<'a> {
    pub commitments: Vec<G1>,
    pub values: Vec<u64>,
    pub blinding_factors: Vec<Zr>,
    /// `(G, H)`
    pub pedersen_params: [G1; 2],
    pub params: &'a RangeProofParams,
}

impl RangeCorrectnessProver<'_> {
    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<RangeCorrectness> {
        let n = self.commitments.len();
        if self.values.len() != n || self.blinding_factors.len() != n {
            return Err(ZkatError::InvalidInput(format!(
                "cannot compute range proofs: [{}] commitments, [{}] values, [{}] blinding factors",
                n,
                self.values.len(),
                self.blinding_factors.len()
            )));
        }
        self.params.validate()?;
        let max = self.params.max_value();
        if let Some(v) = self.values.iter().find(|v| **v > max) {
            return Err(ZkatError::OutOfRange { value: *v, max });
        }
        trace!("generating [{}] range proofs of [{}] bits", n, self.params.bit_length);

        let rngs: Vec<_> = (0..n).map(|_| math::fork_rng(&mut *rng)).collect();
        let proofs = rngs
            .into_par_iter()
            .enumerate()
            .map(|(i, mut rng)| {
                RangeProver {
                    commitment: self.commitments[i],
                    value: self.values[i],
                    blinding_factor: self.blinding_factors[i],
                    commitment_generators: self.pedersen_params,
                    params: self.params,
                }
                .prove(&mut rng)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RangeCorrectness { proofs })
    }
}

pub struct RangeCorrectnessVerifier<'a> {
    pub commitments: Vec<G1>,
    pub pedersen_params: [G1; 2],
    pub params: &'a RangeProofParams,
}

impl RangeCorrectnessVerifier<'_> {
    pub fn verify(&self, rc: &RangeCorrectness) -> Result<()> {
        if rc.proofs.len() != self.commitments.len() {
            return Err(ZkatError::InvalidProof("invalid range proof".into()));
        }
        rc.proofs
            .par_iter()
            .zip(self.commitments.par_iter())
            .enumerate()
            .try_for_each(|(i, (proof, com))| {
                RangeVerifier {
                    commitment: *com,
                    commitment_generators: self.pedersen_params,
                    params: self.params,
                }
                .verify(proof)
                .context(|| format!("invalid range proof at index {}", i))
            })
    }
}
