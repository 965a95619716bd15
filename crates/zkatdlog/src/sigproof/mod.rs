//! Proofs of knowledge of PS signatures
//!
//! A prover re-randomizes its signature `(R, S)` and hides `S` further as
//! `S' = S + P^sbf`. It then proves knowledge of the signed messages, the
//! hash slot and `sbf` through a Schnorr-style proof in the target group.

pub mod membership;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::common::{compute_pedersen_commitment, SchnorrProof, SchnorrProver, SchnorrVerifier, Transcript};
use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, G1, G2, Gt, Zr};
use crate::pssign::Signature;

pub use membership::{MembershipProof, MembershipProver, MembershipVerifier, MembershipWitness};

/// Responses of a proof of knowledge of a PS signature
#[derive(Clone, Debug)]
pub struct POK {
    pub challenge: Zr,
    pub signature: Signature,
    pub messages: Vec<Zr>,
    pub hash: Zr,
    pub blinding_factor: Zr,
}

/// Public data needed to check a [`POK`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct POKVerifier {
    #[serde(with = "encoding::canonical")]
    pub p: G1,
    #[serde(with = "encoding::canonical")]
    pub q: G2,
    #[serde(with = "encoding::canonical_vec")]
    pub pk: Vec<G2>,
}

impl POKVerifier {
    pub fn new(p: G1, q: G2, pk: Vec<G2>) -> Self {
        Self { p, q, pk }
    }

    /// Recomputes the prover's commitment in GT:
    /// `e(R, Σ PK_{i+1}^z_i + PK_{n+1}^z_h) + e(P^z_sbf, Q) - c·(e(S', Q) - e(R, PK_0))`
    pub fn recompute_commitment(&self, pok: &POK) -> Result<Gt> {
        if self.pk.len() < 2 || pok.messages.len() != self.pk.len() - 2 {
            return Err(ZkatError::InvalidInput(format!(
                "length of signature public key does not match number of signed messages: expect [{}], got [{}]",
                self.pk.len().saturating_sub(2),
                pok.messages.len()
            )));
        }
        let mut t = self.pk[self.pk.len() - 1] * pok.hash;
        for (pk, m) in self.pk[1..].iter().zip(&pok.messages) {
            t += *pk * m;
        }
        let sig = &pok.signature;
        let y = math::multi_pairing(&[sig.s, -sig.r], &[self.q, self.pk[0]]);
        let com = math::multi_pairing(&[sig.r, self.p * pok.blinding_factor], &[t, self.q]);
        Ok(com - y * pok.challenge)
    }
}

/// Re-randomizes `sig` and hides `S` behind `P^bf`.
/// Returns the obfuscated signature and `bf`.
pub(crate) fn obfuscate_signature<R: RngCore + CryptoRng>(
    sig: &Signature,
    p: &G1,
    rng: &mut R,
) -> (Signature, Zr) {
    let bf = math::rand_zr(rng);
    let mut obfuscated = sig.clone();
    obfuscated.randomize(rng);
    obfuscated.s += *p * bf;
    (obfuscated, bf)
}

/// Proof of knowledge of a PS signature over partially disclosed messages.
/// Hidden messages are additionally bound to a Pedersen commitment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigProof {
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
    #[serde(with = "encoding::canonical_vec")]
    pub hidden: Vec<Zr>,
    #[serde(with = "encoding::canonical")]
    pub hash: Zr,
    pub signature: Signature,
    #[serde(with = "encoding::canonical")]
    pub sig_blinding_factor: Zr,
    #[serde(with = "encoding::canonical")]
    pub com_blinding_factor: Zr,
    #[serde(with = "encoding::canonical")]
    pub commitment: G1,
}

struct SigCommitment {
    commitment_to_messages: G1,
    signature: Gt,
}

#[derive(Clone, Debug)]
pub struct SigVerifier {
    pub pok: POKVerifier,
    pub hidden_indices: Vec<usize>,
    pub disclosed_indices: Vec<usize>,
    pub disclosed: Vec<Zr>,
    /// One base per hidden message followed by the blinding base
    pub pedersen_params: Vec<G1>,
    pub commitment_to_messages: G1,
}

impl SigVerifier {
    fn compute_challenge(&self, com_to_messages: &G1, sig: &Signature, com: &SigCommitment) -> Zr {
        Transcript::new()
            .append_all(&self.pedersen_params)
            .append(com_to_messages)
            .append(&com.commitment_to_messages)
            .append(&self.pok.p)
            .append_all(&self.pok.pk)
            .append(&self.pok.q)
            .append(&com.signature)
            .append(&sig.r)
            .append(&sig.s)
            .challenge()
    }

    fn recompute_commitments(&self, p: &SigProof) -> Result<SigCommitment> {
        let n = self.pok.pk.len().saturating_sub(2);
        if p.hidden.len() + self.disclosed.len() != n
            || p.hidden.len() != self.hidden_indices.len()
            || self.disclosed.len() != self.disclosed_indices.len()
        {
            return Err(ZkatError::InvalidInput(
                "length of signature public key does not match number of signed messages".into(),
            ));
        }

        let mut zkp_proof = p.hidden.clone();
        zkp_proof.push(p.com_blinding_factor);
        let commitment_to_messages = SchnorrVerifier::new(self.pedersen_params.clone())
            .recompute_commitment(&SchnorrProof {
                statement: self.commitment_to_messages,
                proof: zkp_proof,
                challenge: p.challenge,
            })?;

        let mut messages = vec![Zr::from(0u64); n];
        for (i, index) in self.hidden_indices.iter().enumerate() {
            *messages.get_mut(*index).ok_or_else(|| index_error(*index))? = p.hidden[i];
        }
        for (i, index) in self.disclosed_indices.iter().enumerate() {
            *messages.get_mut(*index).ok_or_else(|| index_error(*index))? = self.disclosed[i] * p.challenge;
        }

        let signature = self
            .pok
            .recompute_commitment(&POK {
                challenge: p.challenge,
                signature: p.signature.clone(),
                messages,
                hash: p.hash,
                blinding_factor: p.sig_blinding_factor,
            })
            .context(|| "failed to verify signature proof")?;
        Ok(SigCommitment {
            commitment_to_messages,
            signature,
        })
    }

    pub fn verify(&self, p: &SigProof) -> Result<()> {
        if p.commitment != self.commitment_to_messages {
            return Err(ZkatError::InvalidProof("invalid signature proof".into()));
        }
        let com = self.recompute_commitments(p)?;
        let chal = self.compute_challenge(&self.commitment_to_messages, &p.signature, &com);
        if !math::zr_ct_eq(&chal, &p.challenge) {
            return Err(ZkatError::InvalidProof("invalid signature proof".into()));
        }
        Ok(())
    }
}

fn index_error(index: usize) -> ZkatError {
    ZkatError::InvalidInput(format!("message index [{}] out of bounds", index))
}

pub struct SigProver {
    pub verifier: SigVerifier,
    hidden: Vec<Zr>,
    hash: Zr,
    signature: Signature,
    com_blinding_factor: Zr,
}

impl SigProver {
    pub fn new(
        hidden: Vec<Zr>,
        signature: Signature,
        hash: Zr,
        com_blinding_factor: Zr,
        verifier: SigVerifier,
    ) -> Self {
        Self {
            verifier,
            hidden,
            hash,
            signature,
            com_blinding_factor,
        }
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<SigProof> {
        let v = &self.verifier;
        if v.hidden_indices.len() != self.hidden.len() || v.disclosed_indices.len() != v.disclosed.len() {
            return Err(ZkatError::InvalidInput("witness is not of the right size".into()));
        }
        if v.pedersen_params.len() != self.hidden.len() + 1 {
            return Err(ZkatError::InvalidInput(
                "size of witness does not match length of Pedersen parameters".into(),
            ));
        }
        if v.pok.pk.len() != self.hidden.len() + v.disclosed.len() + 2 {
            return Err(ZkatError::InvalidInput(
                "size of signature public key does not match the size of the witness".into(),
            ));
        }

        // 1. Obfuscate the signature
        let (signature, sig_bf) = obfuscate_signature(&self.signature, &v.pok.p, rng);

        // 2. Commit to randomness
        let r_hidden = math::rand_zr_vec(rng, self.hidden.len());
        let r_hash = math::rand_zr(rng);
        let r_com_bf = math::rand_zr(rng);
        let r_sig_bf = math::rand_zr(rng);

        let mut opening = r_hidden.clone();
        opening.push(r_com_bf);
        let commitment_to_messages = compute_pedersen_commitment(&opening, &v.pedersen_params)?;

        let mut t = v.pok.pk[v.pok.pk.len() - 1] * r_hash;
        for (i, index) in v.hidden_indices.iter().enumerate() {
            let pk = v.pok.pk.get(index + 1).ok_or_else(|| index_error(*index))?;
            t += *pk * r_hidden[i];
        }
        let com = SigCommitment {
            commitment_to_messages,
            signature: math::multi_pairing(&[signature.r, v.pok.p * r_sig_bf], &[t, v.pok.q]),
        };

        // 3. Challenge and responses
        let challenge = v.compute_challenge(&v.commitment_to_messages, &signature, &com);
        let mut witness = self.hidden.clone();
        witness.extend([self.com_blinding_factor, sig_bf, self.hash]);
        let mut randomness = r_hidden;
        randomness.extend([r_com_bf, r_sig_bf, r_hash]);
        let proofs = SchnorrProver::new(witness, randomness, challenge)
            .prove()
            .context(|| "signature proof generation failed")?;

        let k = self.hidden.len();
        Ok(SigProof {
            challenge,
            hidden: proofs[..k].to_vec(),
            com_blinding_factor: proofs[k],
            sig_blinding_factor: proofs[k + 1],
            hash: proofs[k + 2],
            signature,
            commitment: v.commitment_to_messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pssign::{hash_messages, Signer};
    use rand::rngs::OsRng;

    fn prover(hidden_indices: Vec<usize>, disclosed_indices: Vec<usize>) -> SigProver {
        let n = hidden_indices.len() + disclosed_indices.len();
        let signer = Signer::key_gen(n, &mut OsRng);
        let messages = math::rand_zr_vec(&mut OsRng, n);
        let sig = signer.sign(&messages, &mut OsRng).unwrap();

        let hidden: Vec<Zr> = hidden_indices.iter().map(|i| messages[*i]).collect();
        let disclosed: Vec<Zr> = disclosed_indices.iter().map(|i| messages[*i]).collect();
        let pp: Vec<G1> = (0..=hidden.len()).map(|_| math::rand_g1(&mut OsRng)).collect();
        let bf = math::rand_zr(&mut OsRng);
        let mut opening = hidden.clone();
        opening.push(bf);
        let com = compute_pedersen_commitment(&opening, &pp).unwrap();

        let verifier = SigVerifier {
            pok: POKVerifier::new(math::rand_g1(&mut OsRng), signer.verifier.q, signer.verifier.pk.clone()),
            hidden_indices,
            disclosed_indices,
            disclosed,
            pedersen_params: pp,
            commitment_to_messages: com,
        };
        SigProver::new(hidden, sig, hash_messages(&messages), bf, verifier)
    }

    #[test]
    fn test_sig_proof() {
        let prover = prover(vec![0, 2], vec![1]);
        let proof = prover.prove(&mut OsRng).unwrap();
        prover.verifier.verify(&proof).unwrap();
    }

    #[test]
    fn test_sig_proof_all_hidden() {
        let prover = prover(vec![0, 1, 2], vec![]);
        let proof = prover.prove(&mut OsRng).unwrap();
        prover.verifier.verify(&proof).unwrap();
    }

    #[test]
    fn test_sig_proof_wrong_disclosed_value() {
        let mut prover = prover(vec![0], vec![1]);
        let proof = prover.prove(&mut OsRng).unwrap();

        prover.verifier.disclosed[0] += Zr::from(1u64);
        let err = prover.verifier.verify(&proof).unwrap_err();
        assert_eq!(err.to_string(), "invalid signature proof");
    }

    #[test]
    fn test_sig_proof_tampered_signature() {
        let prover = prover(vec![0], vec![1]);
        let mut proof = prover.prove(&mut OsRng).unwrap();
        proof.signature.s += math::rand_g1(&mut OsRng);
        assert!(prover.verifier.verify(&proof).is_err());
    }
}
