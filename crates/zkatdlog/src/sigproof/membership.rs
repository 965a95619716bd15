//! Membership proofs
//!
//! Shows that a Pedersen commitment `G0^v·G1^bf` hides a value `v` for which
//! the prover holds a PS signature, i.e. that `v` belongs to the set of
//! signed values, without revealing which signature it holds.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::{obfuscate_signature, POKVerifier, POK};
use crate::common::{compute_pedersen_commitment, SchnorrProof, SchnorrProver, SchnorrVerifier, Transcript};
use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, G1, G2, Gt, Zr};
use crate::pssign::{hash_messages, Signature};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MembershipProof {
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
    pub signature: Signature,
    #[serde(with = "encoding::canonical")]
    pub value: Zr,
    #[serde(with = "encoding::canonical")]
    pub com_blinding_factor: Zr,
    #[serde(with = "encoding::canonical")]
    pub sig_blinding_factor: Zr,
    #[serde(with = "encoding::canonical")]
    pub hash: Zr,
    #[serde(with = "encoding::canonical")]
    pub commitment: G1,
}

/// Secret opening of the commitment plus the signature on the value
#[derive(Clone, Debug)]
pub struct MembershipWitness {
    signature: Signature,
    value: Zr,
    com_blinding_factor: Zr,
}

impl MembershipWitness {
    pub fn new(signature: Signature, value: Zr, com_blinding_factor: Zr) -> Self {
        Self {
            signature,
            value,
            com_blinding_factor,
        }
    }
}

struct MembershipCommitment {
    commitment_to_value: G1,
    signature: Gt,
}

#[derive(Clone, Debug)]
pub struct MembershipVerifier {
    pub pok: POKVerifier,
    pub pedersen_params: Vec<G1>,
    pub commitment_to_value: G1,
}

impl MembershipVerifier {
    pub fn new(commitment_to_value: G1, p: G1, q: G2, pk: Vec<G2>, pedersen_params: Vec<G1>) -> Self {
        Self {
            pok: POKVerifier::new(p, q, pk),
            pedersen_params,
            commitment_to_value,
        }
    }

    fn check_parameters(&self) -> Result<()> {
        if self.pok.pk.len() != 3 {
            return Err(ZkatError::InvalidInput(format!(
                "membership proof requires a PS public key of length 3, got [{}]",
                self.pok.pk.len()
            )));
        }
        if self.pedersen_params.len() != 2 {
            return Err(ZkatError::InvalidInput(format!(
                "membership proof requires 2 Pedersen parameters, got [{}]",
                self.pedersen_params.len()
            )));
        }
        Ok(())
    }

    fn compute_challenge(&self, com: &MembershipCommitment, sig: &Signature) -> Zr {
        Transcript::new()
            .append_all(&self.pedersen_params)
            .append(&self.commitment_to_value)
            .append(&com.commitment_to_value)
            .append(&self.pok.p)
            .append_all(&self.pok.pk)
            .append(&self.pok.q)
            .append(&com.signature)
            .append(&sig.r)
            .append(&sig.s)
            .challenge()
    }

    fn recompute_commitments(&self, p: &MembershipProof) -> Result<MembershipCommitment> {
        let signature = self.pok.recompute_commitment(&POK {
            challenge: p.challenge,
            signature: p.signature.clone(),
            messages: vec![p.value],
            hash: p.hash,
            blinding_factor: p.sig_blinding_factor,
        })?;
        let commitment_to_value = SchnorrVerifier::new(self.pedersen_params.clone())
            .recompute_commitment(&SchnorrProof {
                statement: self.commitment_to_value,
                proof: vec![p.value, p.com_blinding_factor],
                challenge: p.challenge,
            })?;
        Ok(MembershipCommitment {
            commitment_to_value,
            signature,
        })
    }

    pub fn verify(&self, p: &MembershipProof) -> Result<()> {
        self.check_parameters()?;
        if p.commitment != self.commitment_to_value {
            return Err(ZkatError::InvalidProof("invalid membership proof".into()));
        }
        let com = self.recompute_commitments(p)?;
        let chal = self.compute_challenge(&com, &p.signature);
        if !math::zr_ct_eq(&chal, &p.challenge) {
            return Err(ZkatError::InvalidProof("invalid membership proof".into()));
        }
        Ok(())
    }
}

pub struct MembershipProver {
    pub verifier: MembershipVerifier,
    witness: MembershipWitness,
}

impl MembershipProver {
    pub fn new(witness: MembershipWitness, verifier: MembershipVerifier) -> Self {
        Self { verifier, witness }
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<MembershipProof> {
        let v = &self.verifier;
        v.check_parameters()?;
        let w = &self.witness;

        // 1. Obfuscate the signature and hash the value
        let (signature, sig_bf) = obfuscate_signature(&w.signature, &v.pok.p, rng);
        let hash = hash_messages(&[w.value]);

        // 2. Commit to randomness
        let r_value = math::rand_zr(rng);
        let r_hash = math::rand_zr(rng);
        let r_sig_bf = math::rand_zr(rng);
        let r_com_bf = math::rand_zr(rng);

        let t = v.pok.pk[1] * r_value + v.pok.pk[2] * r_hash;
        let com = MembershipCommitment {
            signature: math::multi_pairing(&[signature.r, v.pok.p * r_sig_bf], &[t, v.pok.q]),
            commitment_to_value: compute_pedersen_commitment(&[r_value, r_com_bf], &v.pedersen_params)?,
        };

        // 3. Challenge and responses
        let challenge = v.compute_challenge(&com, &signature);
        let proofs = SchnorrProver::new(
            vec![w.value, w.com_blinding_factor, hash, sig_bf],
            vec![r_value, r_com_bf, r_hash, r_sig_bf],
            challenge,
        )
        .prove()
        .context(|| "range proof generation failed")?;

        Ok(MembershipProof {
            challenge,
            signature,
            value: proofs[0],
            com_blinding_factor: proofs[1],
            hash: proofs[2],
            sig_blinding_factor: proofs[3],
            commitment: v.commitment_to_value,
        })
    }
}
