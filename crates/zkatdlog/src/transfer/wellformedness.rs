//! Well-formedness of a transfer
//!
//! Proves knowledge of the openings of all inputs and outputs, that they
//! share one type, and that input and output values add up to the same
//! sum. The sum is proven against the aggregate `Σ tokens` on each side
//! with a shared sum response, so unequal sums cannot verify.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::common::{sum, SchnorrProof, SchnorrProver, SchnorrVerifier, Transcript};
use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, Zero, G1, Zr};
use crate::token::{type_to_zr, TokenDataWitness};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellFormedness {
    #[serde(with = "encoding::canonical_vec")]
    pub input_values: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub input_blinding_factors: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub output_values: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub output_blinding_factors: Vec<Zr>,
    #[serde(rename = "type", with = "encoding::canonical")]
    pub token_type: Zr,
    #[serde(with = "encoding::canonical")]
    pub sum: Zr,
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
}

/// Secret openings of a transfer
#[derive(Clone, Debug)]
pub struct WellFormednessWitness {
    token_type: Zr,
    in_values: Vec<Zr>,
    in_blinding_factors: Vec<Zr>,
    out_values: Vec<Zr>,
    out_blinding_factors: Vec<Zr>,
}

impl WellFormednessWitness {
    pub fn new(inputs: &[TokenDataWitness], outputs: &[TokenDataWitness]) -> Result<Self> {
        let first = inputs
            .first()
            .ok_or_else(|| ZkatError::InvalidInput("cannot compute transfer proof: no inputs".into()))?;
        let values = |ws: &[TokenDataWitness]| ws.iter().map(|w| math::zr_from_u64(w.value)).collect();
        let bfs = |ws: &[TokenDataWitness]| ws.iter().map(|w| w.blinding_factor).collect();
        Ok(Self {
            token_type: type_to_zr(&first.token_type),
            in_values: values(inputs),
            in_blinding_factors: bfs(inputs),
            out_values: values(outputs),
            out_blinding_factors: bfs(outputs),
        })
    }
}

#[derive(Clone, Debug)]
pub struct WellFormednessVerifier {
    pub schnorr: SchnorrVerifier,
    pub inputs: Vec<G1>,
    pub outputs: Vec<G1>,
}

/// Schnorr statements of one side: every token, then their aggregate
fn parse_proof(tokens: &[G1], values: &[Zr], bfs: &[Zr], token_type: Zr, sum_response: Zr, challenge: Zr) -> Result<Vec<SchnorrProof>> {
    if values.len() != tokens.len() || bfs.len() != tokens.len() {
        return Err(ZkatError::InvalidInput("failed to parse proof".into()));
    }
    let mut zkps: Vec<SchnorrProof> = tokens
        .iter()
        .zip(values.iter().zip(bfs))
        .map(|(t, (v, bf))| SchnorrProof {
            statement: *t,
            proof: vec![token_type, *v, *bf],
            challenge,
        })
        .collect();
    zkps.push(SchnorrProof {
        statement: sum(tokens),
        proof: vec![
            token_type * Zr::from(tokens.len() as u64),
            sum_response,
            bfs.iter().fold(Zr::zero(), |acc, bf| acc + bf),
        ],
        challenge,
    });
    Ok(zkps)
}

impl WellFormednessVerifier {
    pub fn new(pedersen_params: Vec<G1>, inputs: Vec<G1>, outputs: Vec<G1>) -> Self {
        Self {
            schnorr: SchnorrVerifier::new(pedersen_params),
            inputs,
            outputs,
        }
    }

    fn challenge(&self, in_coms: &[G1], out_coms: &[G1]) -> Zr {
        Transcript::new()
            .append_all(in_coms)
            .append_all(out_coms)
            .append_all(&self.inputs)
            .append_all(&self.outputs)
            .challenge()
    }

    pub fn verify(&self, wf: &WellFormedness) -> Result<()> {
        if self.schnorr.ped_params.len() != 3 {
            return Err(ZkatError::InvalidInput("invalid public parameters".into()));
        }
        let zkps = parse_proof(
            &self.inputs,
            &wf.input_values,
            &wf.input_blinding_factors,
            wf.token_type,
            wf.sum,
            wf.challenge,
        )
        .context(|| "invalid transfer proof")?;
        let in_coms = self.schnorr.recompute_commitments(&zkps)?;

        let zkps = parse_proof(
            &self.outputs,
            &wf.output_values,
            &wf.output_blinding_factors,
            wf.token_type,
            wf.sum,
            wf.challenge,
        )
        .context(|| "invalid transfer proof")?;
        let out_coms = self.schnorr.recompute_commitments(&zkps)?;

        if !math::zr_ct_eq(&self.challenge(&in_coms, &out_coms), &wf.challenge) {
            return Err(ZkatError::InvalidProof("invalid zero-knowledge transfer".into()));
        }
        Ok(())
    }
}

pub struct WellFormednessProver {
    pub verifier: WellFormednessVerifier,
    witness: WellFormednessWitness,
}

struct Randomness {
    token_type: Zr,
    in_values: Vec<Zr>,
    in_bfs: Vec<Zr>,
    out_values: Vec<Zr>,
    out_bfs: Vec<Zr>,
    sum: Zr,
}

impl WellFormednessProver {
    pub fn new(verifier: WellFormednessVerifier, witness: WellFormednessWitness) -> Self {
        Self { verifier, witness }
    }

    /// Commitments to the randomness of one side, with the aggregate last
    fn side_commitments(g: &[G1], q: &G1, values: &[Zr], bfs: &[Zr], sum_randomness: &Zr) -> Vec<G1> {
        let mut coms: Vec<G1> = values
            .iter()
            .zip(bfs)
            .map(|(v, bf)| *q + g[1] * v + g[2] * bf)
            .collect();
        let aggregate = *q * Zr::from(values.len() as u64)
            + g[1] * sum_randomness
            + g[2] * bfs.iter().fold(Zr::zero(), |acc, bf| acc + bf);
        coms.push(aggregate);
        coms
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<WellFormedness> {
        let v = &self.verifier;
        let w = &self.witness;
        if w.in_values.len() != v.inputs.len()
            || w.in_blinding_factors.len() != v.inputs.len()
            || w.out_values.len() != v.outputs.len()
            || w.out_blinding_factors.len() != v.outputs.len()
        {
            return Err(ZkatError::InvalidInput("cannot compute transfer proof: malformed witness".into()));
        }
        let g = &v.schnorr.ped_params;
        if g.len() != 3 {
            return Err(ZkatError::InvalidInput("proof generation failed: invalid public parameters".into()));
        }

        let r = Randomness {
            token_type: math::rand_zr(&mut *rng),
            in_values: math::rand_zr_vec(&mut *rng, v.inputs.len()),
            in_bfs: math::rand_zr_vec(&mut *rng, v.inputs.len()),
            out_values: math::rand_zr_vec(&mut *rng, v.outputs.len()),
            out_bfs: math::rand_zr_vec(&mut *rng, v.outputs.len()),
            sum: math::rand_zr(&mut *rng),
        };
        let q = g[0] * r.token_type;
        let in_coms = Self::side_commitments(g, &q, &r.in_values, &r.in_bfs, &r.sum);
        let out_coms = Self::side_commitments(g, &q, &r.out_values, &r.out_bfs, &r.sum);
        let challenge = v.challenge(&in_coms, &out_coms);

        let prove = |witness: &[Zr], randomness: &[Zr], what: &str| {
            SchnorrProver::new(witness.to_vec(), randomness.to_vec(), challenge)
                .prove()
                .context(|| format!("failed to compute proof for {}", what))
        };
        let in_sum = w.in_values.iter().fold(Zr::zero(), |acc, v| acc + v);
        Ok(WellFormedness {
            input_values: prove(&w.in_values, &r.in_values, "input values")?,
            input_blinding_factors: prove(&w.in_blinding_factors, &r.in_bfs, "the blinding factors of the inputs")?,
            output_values: prove(&w.out_values, &r.out_values, "output values")?,
            output_blinding_factors: prove(&w.out_blinding_factors, &r.out_bfs, "the blinding factors of the outputs")?,
            token_type: r.token_type + challenge * w.token_type,
            sum: r.sum + challenge * in_sum,
            challenge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::get_tokens_with_witness;
    use rand::rngs::OsRng;

    fn prover(in_values: &[u64], out_values: &[u64]) -> WellFormednessProver {
        let pp: Vec<G1> = (0..3).map(|_| math::rand_g1(&mut OsRng)).collect();
        let (inputs, in_w) = get_tokens_with_witness(in_values, "ABC", &pp, &mut OsRng).unwrap();
        let (outputs, out_w) = get_tokens_with_witness(out_values, "ABC", &pp, &mut OsRng).unwrap();
        WellFormednessProver::new(
            WellFormednessVerifier::new(pp, inputs, outputs),
            WellFormednessWitness::new(&in_w, &out_w).unwrap(),
        )
    }

    #[test]
    fn test_conservation() {
        let p = prover(&[60, 40], &[25, 25, 50]);
        let wf = p.prove(&mut OsRng).unwrap();
        p.verifier.verify(&wf).unwrap();
    }

    #[test]
    fn test_unbalanced_transfer() {
        let p = prover(&[60, 40], &[25, 25, 49]);
        let wf = p.prove(&mut OsRng).unwrap();
        let err = p.verifier.verify(&wf).unwrap_err();
        assert_eq!(err.to_string(), "invalid zero-knowledge transfer");
    }

    #[test]
    fn test_type_mismatch() {
        let pp: Vec<G1> = (0..3).map(|_| math::rand_g1(&mut OsRng)).collect();
        let (inputs, in_w) = get_tokens_with_witness(&[10], "ABC", &pp, &mut OsRng).unwrap();
        let (outputs, out_w) = get_tokens_with_witness(&[10], "XYZ", &pp, &mut OsRng).unwrap();
        let p = WellFormednessProver::new(
            WellFormednessVerifier::new(pp, inputs, outputs),
            WellFormednessWitness::new(&in_w, &out_w).unwrap(),
        );
        let wf = p.prove(&mut OsRng).unwrap();
        assert!(p.verifier.verify(&wf).is_err());
    }

    #[test]
    fn test_malformed_proof() {
        let p = prover(&[10], &[10]);
        let mut wf = p.prove(&mut OsRng).unwrap();
        wf.output_values.pop();
        assert!(p.verifier.verify(&wf).is_err());
    }
}
