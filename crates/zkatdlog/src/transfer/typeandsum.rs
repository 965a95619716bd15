//! Type and sum proof
//!
//! Subtracts a fresh commitment to type `C = G0^H(type)·G2^bf_t` from every
//! input and output. The proof shows that each headless input
//! `in_i - C` only involves the value and blinding bases, and that
//! `Σ (in_i - C) - Σ (out_j - C)` is a commitment to zero under `G2`.
//! The headless outputs are covered by the range proof, which shows they
//! carry no type component either.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::common::{sum, Transcript};
use crate::error::{Result, ZkatError};
use crate::math::{self, encoding, Zero, G1, Zr};
use crate::range::TypeCommitment;
use crate::token::{type_to_zr, TokenDataWitness};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeAndSumProof {
    #[serde(with = "encoding::canonical")]
    pub commitment_to_type: G1,
    #[serde(with = "encoding::canonical_vec")]
    pub input_blinding_factors: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub input_values: Vec<Zr>,
    #[serde(rename = "type", with = "encoding::canonical")]
    pub token_type: Zr,
    #[serde(with = "encoding::canonical")]
    pub type_blinding_factor: Zr,
    #[serde(with = "encoding::canonical")]
    pub equality_of_sum: Zr,
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
}

#[derive(Clone, Debug)]
pub struct TypeAndSumWitness {
    token_type: Zr,
    in_values: Vec<Zr>,
    in_blinding_factors: Vec<Zr>,
    out_blinding_factors: Vec<Zr>,
    type_blinding_factor: Zr,
}

impl TypeAndSumWitness {
    pub fn new(
        inputs: &[TokenDataWitness],
        outputs: &[TokenDataWitness],
        commitment_to_type: &TypeCommitment,
    ) -> Result<Self> {
        let first = inputs
            .first()
            .ok_or_else(|| ZkatError::InvalidInput("cannot compute transfer proof: no inputs".into()))?;
        Ok(Self {
            token_type: type_to_zr(&first.token_type),
            in_values: inputs.iter().map(|w| math::zr_from_u64(w.value)).collect(),
            in_blinding_factors: inputs.iter().map(|w| w.blinding_factor).collect(),
            out_blinding_factors: outputs.iter().map(|w| w.blinding_factor).collect(),
            type_blinding_factor: commitment_to_type.blinding_factor,
        })
    }
}

#[derive(Clone, Debug)]
pub struct TypeAndSumVerifier {
    pub pedersen_params: Vec<G1>,
    pub inputs: Vec<G1>,
    pub outputs: Vec<G1>,
}

/// Headless inputs and outputs with their difference
struct Headless {
    inputs: Vec<G1>,
    outputs: Vec<G1>,
    sum: G1,
}

impl Headless {
    fn new(inputs: &[G1], outputs: &[G1], commitment_to_type: &G1) -> Self {
        let inputs: Vec<G1> = inputs.iter().map(|t| *t - commitment_to_type).collect();
        let outputs: Vec<G1> = outputs.iter().map(|t| *t - commitment_to_type).collect();
        let sum = sum(&inputs) - sum(&outputs);
        Self { inputs, outputs, sum }
    }
}

fn challenge(in_coms: &[G1], type_com: &G1, sum_com: &G1, h: &Headless, commitment_to_type: &G1) -> Zr {
    Transcript::new()
        .append_all(in_coms)
        .append(type_com)
        .append(sum_com)
        .append_all(&h.inputs)
        .append_all(&h.outputs)
        .append(commitment_to_type)
        .append(&h.sum)
        .challenge()
}

impl TypeAndSumVerifier {
    pub fn new(pedersen_params: Vec<G1>, inputs: Vec<G1>, outputs: Vec<G1>) -> Self {
        Self {
            pedersen_params,
            inputs,
            outputs,
        }
    }

    pub fn verify(&self, proof: &TypeAndSumProof) -> Result<()> {
        let g = &self.pedersen_params;
        if g.len() != 3 {
            return Err(ZkatError::InvalidInput("invalid public parameters".into()));
        }
        if proof.input_values.len() != self.inputs.len() || proof.input_blinding_factors.len() != self.inputs.len() {
            return Err(ZkatError::InvalidInput(
                "missing components in type and sum proof".into(),
            ));
        }
        let c = proof.challenge;
        let h = Headless::new(&self.inputs, &self.outputs, &proof.commitment_to_type);

        let in_coms: Vec<G1> = h
            .inputs
            .iter()
            .zip(proof.input_values.iter().zip(&proof.input_blinding_factors))
            .map(|(t, (v, bf))| g[1] * v + g[2] * bf - *t * c)
            .collect();
        let sum_com = g[2] * proof.equality_of_sum - h.sum * c;
        let type_com = g[0] * proof.token_type + g[2] * proof.type_blinding_factor - proof.commitment_to_type * c;

        let recomputed = challenge(&in_coms, &type_com, &sum_com, &h, &proof.commitment_to_type);
        if !math::zr_ct_eq(&recomputed, &c) {
            return Err(ZkatError::InvalidProof("invalid zero-knowledge transfer".into()));
        }
        Ok(())
    }
}

pub struct TypeAndSumProver {
    pub verifier: TypeAndSumVerifier,
    witness: TypeAndSumWitness,
    commitment_to_type: G1,
}

impl TypeAndSumProver {
    pub fn new(verifier: TypeAndSumVerifier, witness: TypeAndSumWitness, commitment_to_type: G1) -> Self {
        Self {
            verifier,
            witness,
            commitment_to_type,
        }
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<TypeAndSumProof> {
        let v = &self.verifier;
        let w = &self.witness;
        let g = &v.pedersen_params;
        if g.len() != 3 {
            return Err(ZkatError::InvalidInput("proof generation failed: invalid public parameters".into()));
        }
        if w.in_values.len() != v.inputs.len()
            || w.in_blinding_factors.len() != v.inputs.len()
            || w.out_blinding_factors.len() != v.outputs.len()
        {
            return Err(ZkatError::InvalidInput("cannot compute transfer proof: malformed witness".into()));
        }

        let r_type = math::rand_zr(&mut *rng);
        let r_type_bf = math::rand_zr(&mut *rng);
        let r_values = math::rand_zr_vec(&mut *rng, v.inputs.len());
        let r_bfs = math::rand_zr_vec(&mut *rng, v.inputs.len());
        let r_sum = math::rand_zr(&mut *rng);

        let in_coms: Vec<G1> = r_values.iter().zip(&r_bfs).map(|(rv, rbf)| g[1] * rv + g[2] * rbf).collect();
        let type_com = g[0] * r_type + g[2] * r_type_bf;
        let sum_com = g[2] * r_sum;

        let h = Headless::new(&v.inputs, &v.outputs, &self.commitment_to_type);
        let c = challenge(&in_coms, &type_com, &sum_com, &h, &self.commitment_to_type);

        let headless_in_bfs: Vec<Zr> = w.in_blinding_factors.iter().map(|bf| *bf - w.type_blinding_factor).collect();
        let sum_bf = headless_in_bfs.iter().fold(Zr::zero(), |acc, bf| acc + bf)
            - w.out_blinding_factors
                .iter()
                .fold(Zr::zero(), |acc, bf| acc + (*bf - w.type_blinding_factor));

        Ok(TypeAndSumProof {
            commitment_to_type: self.commitment_to_type,
            input_values: w.in_values.iter().zip(&r_values).map(|(v, r)| *r + c * v).collect(),
            input_blinding_factors: headless_in_bfs.iter().zip(&r_bfs).map(|(bf, r)| *r + c * bf).collect(),
            token_type: r_type + c * w.token_type,
            type_blinding_factor: r_type_bf + c * w.type_blinding_factor,
            equality_of_sum: r_sum + c * sum_bf,
            challenge: c,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::get_tokens_with_witness;
    use rand::rngs::OsRng;

    fn prover(in_values: &[u64], out_values: &[u64], out_type: &str) -> TypeAndSumProver {
        let pp: Vec<G1> = (0..3).map(|_| math::rand_g1(&mut OsRng)).collect();
        let (inputs, in_w) = get_tokens_with_witness(in_values, "ABC", &pp, &mut OsRng).unwrap();
        let (outputs, out_w) = get_tokens_with_witness(out_values, out_type, &pp, &mut OsRng).unwrap();
        let ct = TypeCommitment::new("ABC", &pp, &mut OsRng).unwrap();
        TypeAndSumProver::new(
            TypeAndSumVerifier::new(pp, inputs, outputs),
            TypeAndSumWitness::new(&in_w, &out_w, &ct).unwrap(),
            ct.commitment,
        )
    }

    #[test]
    fn test_type_and_sum() {
        let p = prover(&[100, 15], &[90, 25], "ABC");
        let proof = p.prove(&mut OsRng).unwrap();
        p.verifier.verify(&proof).unwrap();
    }

    #[test]
    fn test_unbalanced() {
        let p = prover(&[100, 15], &[90, 26], "ABC");
        let proof = p.prove(&mut OsRng).unwrap();
        assert_eq!(
            p.verifier.verify(&proof).unwrap_err().to_string(),
            "invalid zero-knowledge transfer"
        );
    }

    #[test]
    fn test_output_type_changed() {
        let p = prover(&[10], &[10], "XYZ");
        let proof = p.prove(&mut OsRng).unwrap();
        assert!(p.verifier.verify(&proof).is_err());
    }

    #[test]
    fn test_swapped_commitment_to_type() {
        let p = prover(&[10, 5], &[15], "ABC");
        let mut proof = p.prove(&mut OsRng).unwrap();
        proof.commitment_to_type += p.verifier.pedersen_params[2];
        assert!(p.verifier.verify(&proof).is_err());
    }
}
