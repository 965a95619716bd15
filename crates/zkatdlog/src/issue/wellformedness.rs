//! Well-formedness of issued tokens
//!
//! Shows knowledge of the opening of every issued token and of the
//! commitment to type, and that all of them share one type. For a
//! non-anonymous issue the type is disclosed and the type response is
//! replaced by `c·H(type)` on the verifier side.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::common::{SchnorrProver, Transcript};
use crate::error::{Result, ZkatError};
use crate::math::{self, encoding, Zero, G1, Zr};
use crate::range::TypeCommitment;
use crate::token::{type_to_zr, TokenDataWitness};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellFormedness {
    /// Type response, zero when the type is in the clear
    #[serde(rename = "type", with = "encoding::canonical")]
    pub token_type: Zr,
    #[serde(with = "encoding::canonical_vec")]
    pub values: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub blinding_factors: Vec<Zr>,
    #[serde(with = "encoding::canonical")]
    pub type_blinding_factor: Zr,
    /// Only set when the issue is not anonymous
    #[serde(default)]
    pub type_in_the_clear: String,
    #[serde(with = "encoding::canonical")]
    pub commitment_to_type: G1,
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
}

/// Public inputs of the well-formedness proof
#[derive(Clone, Debug)]
pub struct WellFormednessVerifier {
    pub pedersen_params: Vec<G1>,
    pub tokens: Vec<G1>,
    pub anonymous: bool,
}

struct Commitments {
    tokens: Vec<G1>,
    commitment_to_type: G1,
}

impl WellFormednessVerifier {
    pub fn new(pedersen_params: Vec<G1>, tokens: Vec<G1>, anonymous: bool) -> Self {
        Self {
            pedersen_params,
            tokens,
            anonymous,
        }
    }

    fn challenge(&self, commitment_to_type: &G1, coms: &Commitments) -> Zr {
        Transcript::new()
            .append_all(&self.pedersen_params)
            .append_all(&self.tokens)
            .append(commitment_to_type)
            .append_all(&coms.tokens)
            .append(&coms.commitment_to_type)
            .append_bytes(&[self.anonymous as u8])
            .challenge()
    }

    pub fn verify(&self, wf: &WellFormedness) -> Result<()> {
        if self.pedersen_params.len() != 3 {
            return Err(ZkatError::InvalidInput(format!(
                "invalid pedersen parameters: expect [3], got [{}]",
                self.pedersen_params.len()
            )));
        }
        if wf.values.len() != self.tokens.len() || wf.blinding_factors.len() != self.tokens.len() {
            return Err(ZkatError::InvalidInput(
                "issue proof not well formed: number of responses does not match number of tokens".into(),
            ));
        }

        let token_type = if self.anonymous {
            wf.token_type
        } else {
            if wf.type_in_the_clear.is_empty() {
                return Err(ZkatError::InvalidInput("non-anonymous issue must disclose the type".into()));
            }
            wf.challenge * type_to_zr(&wf.type_in_the_clear)
        };

        let g = &self.pedersen_params;
        let coms = Commitments {
            tokens: self
                .tokens
                .iter()
                .zip(wf.values.iter().zip(&wf.blinding_factors))
                .map(|(t, (v, bf))| g[0] * token_type + g[1] * v + g[2] * bf - *t * wf.challenge)
                .collect(),
            commitment_to_type: g[0] * token_type + g[2] * wf.type_blinding_factor
                - wf.commitment_to_type * wf.challenge,
        };

        if !math::zr_ct_eq(&self.challenge(&wf.commitment_to_type, &coms), &wf.challenge) {
            return Err(ZkatError::InvalidProof("invalid zero-knowledge issue".into()));
        }
        Ok(())
    }
}

pub struct WellFormednessProver<'a> {
    pub verifier: WellFormednessVerifier,
    witness: &'a [TokenDataWitness],
    commitment_to_type: TypeCommitment,
}

impl<'a> WellFormednessProver<'a> {
    pub fn new(
        verifier: WellFormednessVerifier,
        witness: &'a [TokenDataWitness],
        commitment_to_type: TypeCommitment,
    ) -> Self {
        Self {
            verifier,
            witness,
            commitment_to_type,
        }
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<WellFormedness> {
        let v = &self.verifier;
        if v.pedersen_params.len() != 3 {
            return Err(ZkatError::InvalidInput(format!(
                "invalid pedersen parameters: expect [3], got [{}]",
                v.pedersen_params.len()
            )));
        }
        if self.witness.is_empty() || self.witness.len() != v.tokens.len() {
            return Err(ZkatError::InvalidInput(format!(
                "cannot prove issue: [{}] tokens, [{}] witnesses",
                v.tokens.len(),
                self.witness.len()
            )));
        }
        let token_type = &self.witness[0].token_type;
        if self.witness.iter().any(|w| &w.token_type != token_type) {
            return Err(ZkatError::InvalidInput("issued tokens must all have the same type".into()));
        }

        let n = self.witness.len();
        let rand_type = if v.anonymous { math::rand_zr(&mut *rng) } else { Zr::zero() };
        let rand_values = math::rand_zr_vec(&mut *rng, n);
        let rand_bfs = math::rand_zr_vec(&mut *rng, n);
        let rand_type_bf = math::rand_zr(&mut *rng);

        let g = &v.pedersen_params;
        let coms = Commitments {
            tokens: rand_values
                .iter()
                .zip(&rand_bfs)
                .map(|(rv, rbf)| g[0] * rand_type + g[1] * rv + g[2] * rbf)
                .collect(),
            commitment_to_type: g[0] * rand_type + g[2] * rand_type_bf,
        };
        let challenge = v.challenge(&self.commitment_to_type.commitment, &coms);

        let values = SchnorrProver::new(
            self.witness.iter().map(|w| math::zr_from_u64(w.value)).collect(),
            rand_values,
            challenge,
        )
        .prove()?;
        let blinding_factors = SchnorrProver::new(
            self.witness.iter().map(|w| w.blinding_factor).collect(),
            rand_bfs,
            challenge,
        )
        .prove()?;

        let (proof_type, type_in_the_clear) = if v.anonymous {
            (rand_type + challenge * type_to_zr(token_type), String::new())
        } else {
            (Zr::zero(), token_type.clone())
        };

        Ok(WellFormedness {
            token_type: proof_type,
            values,
            blinding_factors,
            type_blinding_factor: rand_type_bf + challenge * self.commitment_to_type.blinding_factor,
            type_in_the_clear,
            commitment_to_type: self.commitment_to_type.commitment,
            challenge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::get_tokens_with_witness;
    use rand::rngs::OsRng;

    fn prove(anonymous: bool) -> (WellFormednessVerifier, WellFormedness) {
        let pp: Vec<G1> = (0..3).map(|_| math::rand_g1(&mut OsRng)).collect();
        let (tokens, witness) = get_tokens_with_witness(&[50, 20], "ABC", &pp, &mut OsRng).unwrap();
        let ct = TypeCommitment::new("ABC", &pp, &mut OsRng).unwrap();
        let verifier = WellFormednessVerifier::new(pp, tokens, anonymous);
        let wf = WellFormednessProver::new(verifier.clone(), &witness, ct)
            .prove(&mut OsRng)
            .unwrap();
        (verifier, wf)
    }

    #[test]
    fn test_anonymous() {
        let (verifier, wf) = prove(true);
        assert!(wf.type_in_the_clear.is_empty());
        verifier.verify(&wf).unwrap();
    }

    #[test]
    fn test_type_in_the_clear() {
        let (verifier, wf) = prove(false);
        assert_eq!(wf.type_in_the_clear, "ABC");
        verifier.verify(&wf).unwrap();

        let mut bad = wf;
        bad.type_in_the_clear = "XYZ".into();
        assert_eq!(
            verifier.verify(&bad).unwrap_err().to_string(),
            "invalid zero-knowledge issue"
        );
    }

    #[test]
    fn test_tampered_token() {
        let (mut verifier, wf) = prove(true);
        verifier.tokens[1] += verifier.pedersen_params[1];
        assert!(verifier.verify(&wf).is_err());
    }

    #[test]
    fn test_mixed_types_rejected() {
        let pp: Vec<G1> = (0..3).map(|_| math::rand_g1(&mut OsRng)).collect();
        let witness = vec![
            TokenDataWitness::new("ABC", 1, math::rand_zr(&mut OsRng)),
            TokenDataWitness::new("XYZ", 1, math::rand_zr(&mut OsRng)),
        ];
        let tokens = crate::token::compute_tokens(&witness, &pp).unwrap();
        let ct = TypeCommitment::new("ABC", &pp, &mut OsRng).unwrap();
        let prover = WellFormednessProver::new(WellFormednessVerifier::new(pp, tokens, true), &witness, ct);
        assert!(prover.prove(&mut OsRng).is_err());
    }
}
