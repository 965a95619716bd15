//! Schnorr proofs of knowledge of discrete-log openings
//!
//! A prover with witness `w` and randomness `r` answers a challenge `c`
//! with `z_i = r_i + c·w_i`. The verifier recomputes the prover's
//! commitment as `Σ base_i^z_i - statement^c` and compares challenges.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZkatError};
use crate::math::{encoding, G1, Zr};

/// Proof of knowledge of the opening of `statement`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchnorrProof {
    #[serde(with = "encoding::canonical")]
    pub statement: G1,
    #[serde(with = "encoding::canonical_vec")]
    pub proof: Vec<Zr>,
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
}

/// Computes Schnorr responses for a known challenge
#[derive(Clone, Debug)]
pub struct SchnorrProver {
    pub witness: Vec<Zr>,
    pub randomness: Vec<Zr>,
    pub challenge: Zr,
}

impl SchnorrProver {
    pub fn new(witness: Vec<Zr>, randomness: Vec<Zr>, challenge: Zr) -> Self {
        Self {
            witness,
            randomness,
            challenge,
        }
    }

    /// Returns `r_i + c·w_i` for every witness element
    pub fn prove(&self) -> Result<Vec<Zr>> {
        if self.witness.len() != self.randomness.len() {
            return Err(ZkatError::InvalidInput(format!(
                "cannot compute Schnorr proof: witness has [{}] elements, randomness [{}]",
                self.witness.len(),
                self.randomness.len()
            )));
        }
        Ok(self
            .witness
            .iter()
            .zip(&self.randomness)
            .map(|(w, r)| *r + self.challenge * w)
            .collect())
    }
}

/// Recomputes Schnorr commitments over a fixed set of bases
#[derive(Clone, Debug)]
pub struct SchnorrVerifier {
    pub ped_params: Vec<G1>,
}

impl SchnorrVerifier {
    pub fn new(ped_params: Vec<G1>) -> Self {
        Self { ped_params }
    }

    /// `Σ ped_params_i^proof_i - statement^challenge`
    pub fn recompute_commitment(&self, zkp: &SchnorrProof) -> Result<G1> {
        if zkp.proof.len() != self.ped_params.len() {
            return Err(ZkatError::InvalidInput(format!(
                "length of Schnorr proof [{}] does not match number of bases [{}]",
                zkp.proof.len(),
                self.ped_params.len()
            )));
        }
        let com = crate::math::inner_product_g1(&self.ped_params, &zkp.proof);
        Ok(com - zkp.statement * zkp.challenge)
    }

    pub fn recompute_commitments(&self, zkps: &[SchnorrProof]) -> Result<Vec<G1>> {
        zkps.iter().map(|z| self.recompute_commitment(z)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{compute_challenge, compute_pedersen_commitment};
    use crate::math::{rand_g1, rand_zr_vec};
    use rand::rngs::OsRng;

    #[test]
    fn test_schnorr_proof() {
        let bases: Vec<G1> = (0..3).map(|_| rand_g1(&mut OsRng)).collect();
        let witness = rand_zr_vec(&mut OsRng, 3);
        let randomness = rand_zr_vec(&mut OsRng, 3);

        let statement = compute_pedersen_commitment(&witness, &bases).unwrap();
        let commitment = compute_pedersen_commitment(&randomness, &bases).unwrap();
        let challenge = compute_challenge(&[statement, commitment]);

        let proof = SchnorrProver::new(witness, randomness, challenge).prove().unwrap();
        let zkp = SchnorrProof {
            statement,
            proof,
            challenge,
        };

        let verifier = SchnorrVerifier::new(bases);
        let recomputed = verifier.recompute_commitment(&zkp).unwrap();
        assert_eq!(recomputed, commitment);

        // Wrong statement should not recompute the same commitment
        let mut bad = zkp.clone();
        bad.statement = rand_g1(&mut OsRng);
        assert_ne!(verifier.recompute_commitment(&bad).unwrap(), commitment);
    }

    #[test]
    fn test_length_mismatch() {
        let prover = SchnorrProver::new(rand_zr_vec(&mut OsRng, 2), rand_zr_vec(&mut OsRng, 3), Zr::from(1u64));
        assert!(prover.prove().is_err());
    }
}
