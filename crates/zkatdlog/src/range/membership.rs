//! Range proofs from a signed table of digits
//!
//! A value `v < base^exponent` is written in base `base`. Every digit is
//! committed separately and proven to carry a PS signature from the table of
//! signed values `[0, base)`. An equality proof ties the weighted sum of the
//! digit commitments back to the token commitment.

use log::trace;
use rand_core::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::common::{SchnorrProof, SchnorrProver, SchnorrVerifier, Transcript};
use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, Zero, G1, G2, Zr};
use crate::pssign::{Signature, Signer};
use crate::sigproof::membership::{MembershipProof, MembershipProver, MembershipVerifier, MembershipWitness};
use crate::token::{type_to_zr, TokenDataWitness};

/// Public parameters of the signed digit table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MembershipParams {
    pub base: u64,
    pub exponent: u64,
    /// PS public key over one message
    #[serde(with = "encoding::canonical_vec")]
    pub pk: Vec<G2>,
    #[serde(with = "encoding::canonical")]
    pub q: G2,
    #[serde(with = "encoding::canonical")]
    pub p: G1,
    /// `signed_values[i]` signs `i`
    pub signed_values: Vec<Signature>,
}

impl MembershipParams {
    /// Signs every digit in `[0, base)` with a fresh PS key. The secret key
    /// is dropped once the table is built.
    pub fn new<R: RngCore + CryptoRng>(base: u64, exponent: u64, rng: &mut R) -> Result<Self> {
        check_shape(base, exponent)?;
        let signer = Signer::key_gen(1, rng);
        let signed_values = (0..base)
            .map(|i| signer.sign(&[math::zr_from_u64(i)], &mut *rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            base,
            exponent,
            pk: signer.verifier.pk.clone(),
            q: signer.verifier.q,
            p: math::rand_g1(rng),
            signed_values,
        })
    }

    /// `base^exponent - 1`
    pub fn max_value(&self) -> u64 {
        self.base
            .checked_pow(self.exponent as u32)
            .map(|m| m - 1)
            .unwrap_or(u64::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        check_shape(self.base, self.exponent)?;
        if self.pk.len() != 3 {
            return Err(ZkatError::InvalidParameters(format!(
                "invalid membership parameters: expect [3] public keys, got [{}]",
                self.pk.len()
            )));
        }
        if self.signed_values.len() as u64 != self.base {
            return Err(ZkatError::InvalidParameters(format!(
                "invalid membership parameters: expect [{}] signed values, got [{}]",
                self.base,
                self.signed_values.len()
            )));
        }
        if self.p.is_zero() || self.q.is_zero() {
            return Err(ZkatError::InvalidParameters(
                "invalid membership parameters: generator is the identity".into(),
            ));
        }
        Ok(())
    }
}

fn check_shape(base: u64, exponent: u64) -> Result<()> {
    if base < 2 || exponent == 0 {
        return Err(ZkatError::InvalidParameters(format!(
            "invalid membership parameters: base [{}] and exponent [{}]",
            base, exponent
        )));
    }
    if u32::try_from(exponent).ok().and_then(|e| base.checked_pow(e)).is_none() {
        return Err(ZkatError::InvalidParameters(format!(
            "invalid membership parameters: [{}^{}] overflows 64 bits",
            base, exponent
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeProof {
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
    pub equality_proofs: EqualityProofs,
    /// One entry per token
    pub membership_proofs: Vec<MembershipProofs>,
}

/// Responses binding each token value to its digit commitments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EqualityProofs {
    #[serde(rename = "type", with = "encoding::canonical")]
    pub token_type: Zr,
    #[serde(with = "encoding::canonical_vec")]
    pub value: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub token_blinding_factor: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub commitment_blinding_factor: Vec<Zr>,
}

/// Digit commitments of one token with their membership proofs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MembershipProofs {
    #[serde(with = "encoding::canonical_vec")]
    pub commitments: Vec<G1>,
    pub signature_proofs: Vec<MembershipProof>,
}

struct Commitments {
    tokens: Vec<G1>,
    commitments_to_values: Vec<G1>,
}

struct Randomness {
    token_type: Zr,
    values: Vec<Zr>,
    token_blinding_factors: Vec<Zr>,
    commitment_blinding_factors: Vec<Zr>,
}

struct Decomposition {
    commitments: Vec<Vec<G1>>,
    witnesses: Vec<Vec<MembershipWitness>>,
    /// Blinding factor of `Π com_i^(base^i)` per token
    blinding_factors: Vec<Zr>,
}

#[derive(Clone, Debug)]
pub struct RangeVerifier<'a> {
    pub tokens: Vec<G1>,
    /// `(G0, G1, G2)`
    pub pedersen_params: &'a [G1],
    pub params: &'a MembershipParams,
}

impl<'a> RangeVerifier<'a> {
    pub fn new(tokens: Vec<G1>, pedersen_params: &'a [G1], params: &'a MembershipParams) -> Self {
        Self {
            tokens,
            pedersen_params,
            params,
        }
    }

    pub fn verify(&self, proof: &RangeProof) -> Result<()> {
        if self.pedersen_params.len() != 3 {
            return Err(ZkatError::InvalidInput(format!(
                "range proof verification needs [3] Pedersen generators, got [{}]",
                self.pedersen_params.len()
            )));
        }
        if proof.membership_proofs.len() != self.tokens.len() {
            return Err(not_well_formed());
        }
        let exponent = self.params.exponent as usize;
        for mp in &proof.membership_proofs {
            if mp.commitments.len() != exponent || mp.signature_proofs.len() != exponent {
                return Err(not_well_formed());
            }
        }

        // every digit is signed
        let digit_params = &self.pedersen_params[..2];
        proof
            .membership_proofs
            .par_iter()
            .flat_map_iter(|mp| mp.commitments.iter().zip(&mp.signature_proofs))
            .try_for_each(|(com, sp)| {
                MembershipVerifier::new(
                    *com,
                    self.params.p,
                    self.params.q,
                    self.params.pk.clone(),
                    digit_params.to_vec(),
                )
                .verify(sp)
                .context(|| "failed to verify range proof")
            })?;

        // token value equals the weighted sum of the digits
        let commitments = self.recompute_commitments(proof)?;
        let digits: Vec<&[G1]> = proof
            .membership_proofs
            .iter()
            .map(|mp| mp.commitments.as_slice())
            .collect();
        let challenge = self.compute_challenge(&commitments, &digits);
        if !math::zr_ct_eq(&challenge, &proof.challenge) {
            return Err(ZkatError::InvalidProof("invalid range proof".into()));
        }
        Ok(())
    }

    fn compute_challenge(&self, commitments: &Commitments, digits: &[&[G1]]) -> Zr {
        let mut t = Transcript::new();
        t.append(&self.params.p)
            .append_all(&self.tokens)
            .append_all(&commitments.tokens)
            .append_all(&commitments.commitments_to_values)
            .append_all(self.pedersen_params)
            .append(&self.params.q)
            .append_all(&self.params.pk);
        for d in digits {
            t.append_all(*d);
        }
        t.challenge()
    }

    fn recompute_commitments(&self, proof: &RangeProof) -> Result<Commitments> {
        let eq = &proof.equality_proofs;
        let n = self.tokens.len();
        if eq.value.len() != n || eq.token_blinding_factor.len() != n || eq.commitment_blinding_factor.len() != n {
            return Err(not_well_formed());
        }

        let token_verifier = SchnorrVerifier::new(self.pedersen_params.to_vec());
        let digit_verifier = SchnorrVerifier::new(self.pedersen_params[..2].to_vec());
        let powers = self.powers_of_base();

        let mut tokens = Vec::with_capacity(n);
        let mut commitments_to_values = Vec::with_capacity(n);
        for (j, token) in self.tokens.iter().enumerate() {
            tokens.push(token_verifier.recompute_commitment(&SchnorrProof {
                statement: *token,
                proof: vec![eq.token_type, eq.value[j], eq.token_blinding_factor[j]],
                challenge: proof.challenge,
            })?);

            let com = math::inner_product_g1(&proof.membership_proofs[j].commitments, &powers);
            commitments_to_values.push(digit_verifier.recompute_commitment(&SchnorrProof {
                statement: com,
                proof: vec![eq.value[j], eq.commitment_blinding_factor[j]],
                challenge: proof.challenge,
            })?);
        }
        Ok(Commitments {
            tokens,
            commitments_to_values,
        })
    }

    fn powers_of_base(&self) -> Vec<Zr> {
        let base = math::zr_from_u64(self.params.base);
        (0..self.params.exponent).map(|i| math::zr_pow(&base, i)).collect()
    }
}

fn not_well_formed() -> ZkatError {
    ZkatError::InvalidProof("range proof not well formed".into())
}

/// Produces a [`RangeProof`] for tokens that share one type
pub struct RangeProver<'a> {
    witness: &'a [TokenDataWitness],
    pub verifier: RangeVerifier<'a>,
}

impl<'a> RangeProver<'a> {
    pub fn new(
        witness: &'a [TokenDataWitness],
        tokens: Vec<G1>,
        pedersen_params: &'a [G1],
        params: &'a MembershipParams,
    ) -> Self {
        Self {
            witness,
            verifier: RangeVerifier::new(tokens, pedersen_params, params),
        }
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<RangeProof> {
        let v = &self.verifier;
        if self.witness.len() != v.tokens.len() || self.witness.is_empty() {
            return Err(ZkatError::InvalidInput(format!(
                "cannot compute range proof: [{}] tokens, [{}] witnesses",
                v.tokens.len(),
                self.witness.len()
            )));
        }
        if v.pedersen_params.len() != 3 {
            return Err(ZkatError::InvalidInput(
                "cannot compute range proof: expect [3] Pedersen generators".into(),
            ));
        }
        check_shape(v.params.base, v.params.exponent)?;
        let token_type = &self.witness[0].token_type;
        if self.witness.iter().any(|w| &w.token_type != token_type) {
            return Err(ZkatError::InvalidInput(
                "cannot compute range proof: tokens have different types".into(),
            ));
        }

        let decomposition = self.decompose(rng)?;
        let membership_proofs = self.prove_membership(&decomposition, rng)?;

        let (commitments, randomness) = self.compute_commitments(rng);
        let digits: Vec<&[G1]> = decomposition.commitments.iter().map(Vec::as_slice).collect();
        let challenge = v.compute_challenge(&commitments, &digits);

        let mut value = Vec::with_capacity(self.witness.len());
        let mut token_blinding_factor = Vec::with_capacity(self.witness.len());
        let mut commitment_blinding_factor = Vec::with_capacity(self.witness.len());
        for (k, w) in self.witness.iter().enumerate() {
            let z = SchnorrProver::new(
                vec![
                    math::zr_from_u64(w.value),
                    w.blinding_factor,
                    decomposition.blinding_factors[k],
                ],
                vec![
                    randomness.values[k],
                    randomness.token_blinding_factors[k],
                    randomness.commitment_blinding_factors[k],
                ],
                challenge,
            )
            .prove()?;
            value.push(z[0]);
            token_blinding_factor.push(z[1]);
            commitment_blinding_factor.push(z[2]);
        }

        Ok(RangeProof {
            challenge,
            equality_proofs: EqualityProofs {
                token_type: randomness.token_type + challenge * type_to_zr(token_type),
                value,
                token_blinding_factor,
                commitment_blinding_factor,
            },
            membership_proofs,
        })
    }

    /// Splits each value into digits and commits to them
    fn decompose<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Decomposition> {
        let params = self.verifier.params;
        let max = params.max_value();
        let digit_params = &self.verifier.pedersen_params[..2];
        let base = math::zr_from_u64(params.base);

        let mut commitments = Vec::with_capacity(self.witness.len());
        let mut witnesses = Vec::with_capacity(self.witness.len());
        let mut blinding_factors = Vec::with_capacity(self.witness.len());
        for w in self.witness {
            if w.value > max {
                return Err(ZkatError::OutOfRange { value: w.value, max });
            }
            let mut rest = w.value;
            let mut coms = Vec::with_capacity(params.exponent as usize);
            let mut mws = Vec::with_capacity(params.exponent as usize);
            let mut bf_sum = Zr::zero();
            for i in 0..params.exponent {
                let digit = rest % params.base;
                rest /= params.base;
                let bf = math::rand_zr(rng);
                let d = math::zr_from_u64(digit);
                coms.push(digit_params[0] * d + digit_params[1] * bf);
                let signature = params
                    .signed_values
                    .get(digit as usize)
                    .cloned()
                    .ok_or_else(|| ZkatError::InvalidParameters(format!("no signature for digit [{}]", digit)))?;
                mws.push(MembershipWitness::new(signature, d, bf));
                bf_sum += bf * math::zr_pow(&base, i);
            }
            commitments.push(coms);
            witnesses.push(mws);
            blinding_factors.push(bf_sum);
        }
        Ok(Decomposition {
            commitments,
            witnesses,
            blinding_factors,
        })
    }

    fn prove_membership<R: RngCore + CryptoRng>(
        &self,
        d: &Decomposition,
        rng: &mut R,
    ) -> Result<Vec<MembershipProofs>> {
        let params = self.verifier.params;
        let digit_params = self.verifier.pedersen_params[..2].to_vec();
        let jobs: Vec<_> = d
            .commitments
            .iter()
            .zip(&d.witnesses)
            .flat_map(|(coms, mws)| coms.iter().zip(mws))
            .map(|(com, mw)| (*com, mw.clone(), math::fork_rng(&mut *rng)))
            .collect();
        trace!("generating [{}] digit membership proofs", jobs.len());

        let proofs = jobs
            .into_par_iter()
            .map(|(com, mw, mut rng)| {
                let verifier = MembershipVerifier::new(com, params.p, params.q, params.pk.clone(), digit_params.clone());
                MembershipProver::new(mw, verifier).prove(&mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        let exponent = params.exponent as usize;
        Ok(d
            .commitments
            .iter()
            .zip(proofs.chunks(exponent))
            .map(|(coms, sps)| MembershipProofs {
                commitments: coms.clone(),
                signature_proofs: sps.to_vec(),
            })
            .collect())
    }

    fn compute_commitments<R: RngCore + CryptoRng>(&self, rng: &mut R) -> (Commitments, Randomness) {
        let n = self.witness.len();
        let pp = self.verifier.pedersen_params;
        let randomness = Randomness {
            token_type: math::rand_zr(rng),
            values: math::rand_zr_vec(rng, n),
            token_blinding_factors: math::rand_zr_vec(rng, n),
            commitment_blinding_factors: math::rand_zr_vec(rng, n),
        };
        let tokens = (0..n)
            .map(|i| {
                pp[0] * randomness.token_type
                    + pp[1] * randomness.values[i]
                    + pp[2] * randomness.token_blinding_factors[i]
            })
            .collect();
        let commitments_to_values = (0..n)
            .map(|i| pp[0] * randomness.values[i] + pp[1] * randomness.commitment_blinding_factors[i])
            .collect();
        (
            Commitments {
                tokens,
                commitments_to_values,
            },
            randomness,
        )
    }
}
