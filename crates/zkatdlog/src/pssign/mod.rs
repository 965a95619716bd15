//! Pointcheval-Sanders signatures
//!
//! A signer holding `n + 2` secret scalars signs `n` messages. Slot zero is
//! the constant term and the last slot signs a hash of the messages:
//!
//! ```text
//! S = R^(sk_0 + Σ sk_{i+1}·m_i + sk_{n+1}·H(m))
//! e(R, PK_0 + Σ PK_{i+1}^m_i + PK_{n+1}^H(m)) == e(S, Q)
//! ```
//!
//! Signatures can be re-randomized into unlinkable copies, which is what the
//! membership proofs rely on.

pub mod blindsign;
pub mod elgamal;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZkatError};
use crate::math::{self, encoding, Zero, G1, G2, Zr};

/// PS signature `(R, S)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "encoding::canonical")]
    pub r: G1,
    #[serde(with = "encoding::canonical")]
    pub s: G1,
}

impl Signature {
    /// Rescales `(R, S)` by a fresh random scalar.
    pub fn randomize<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        let t = math::rand_zr(rng);
        self.r *= t;
        self.s *= t;
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Hash slot of a message vector: `H(m_0 ∥ … ∥ m_{n-1})`
pub fn hash_messages(m: &[Zr]) -> Zr {
    let mut bytes = Vec::with_capacity(32 * m.len());
    for e in m {
        bytes.extend(math::zr_be_bytes(e));
    }
    math::hash_to_zr(&bytes)
}

/// Public half of a PS key pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignVerifier {
    #[serde(with = "encoding::canonical_vec")]
    pub pk: Vec<G2>,
    #[serde(with = "encoding::canonical")]
    pub q: G2,
}

impl SignVerifier {
    pub fn new(pk: Vec<G2>, q: G2) -> Self {
        Self { pk, q }
    }

    /// Number of messages a signature covers
    pub fn message_count(&self) -> usize {
        self.pk.len().saturating_sub(2)
    }

    /// Verifies `sig` over `m`, computing the hash slot from `m`.
    pub fn verify(&self, m: &[Zr], sig: &Signature) -> Result<()> {
        self.verify_with_hash(m, &hash_messages(m), sig)
    }

    /// Verifies `sig` over `m` with an explicit value for the hash slot.
    pub fn verify_with_hash(&self, m: &[Zr], hash: &Zr, sig: &Signature) -> Result<()> {
        if self.pk.len() < 2 || m.len() != self.pk.len() - 2 {
            return Err(ZkatError::InvalidInput(format!(
                "PS signature cannot be verified: expect [{}] messages, got [{}]",
                self.message_count(),
                m.len()
            )));
        }
        if sig.r.is_zero() {
            return Err(ZkatError::InvalidProof("invalid signature".into()));
        }

        let mut h = self.pk[0];
        for (pk, mi) in self.pk[1..].iter().zip(m) {
            h += *pk * mi;
        }
        h += self.pk[self.pk.len() - 1] * hash;

        // e(R, H) - e(S, Q) == 0
        if !math::multi_pairing(&[sig.r, -sig.s], &[h, self.q]).is_zero() {
            return Err(ZkatError::InvalidProof("invalid signature".into()));
        }
        Ok(())
    }
}

/// PS key pair
#[derive(Clone, Debug)]
pub struct Signer {
    sk: Vec<Zr>,
    pub verifier: SignVerifier,
}

impl Signer {
    /// Generates a key pair for signing `n` messages.
    pub fn key_gen<R: RngCore + CryptoRng>(n: usize, rng: &mut R) -> Self {
        let q = math::rand_g2(rng);
        let sk = math::rand_zr_vec(rng, n + 2);
        let pk = sk.iter().map(|s| q * s).collect();
        Self {
            sk,
            verifier: SignVerifier::new(pk, q),
        }
    }

    pub fn new(sk: Vec<Zr>, pk: Vec<G2>, q: G2) -> Result<Self> {
        if sk.len() != pk.len() || sk.len() < 2 {
            return Err(ZkatError::InvalidInput(format!(
                "invalid PS key pair: [{}] secret keys and [{}] public keys",
                sk.len(),
                pk.len()
            )));
        }
        Ok(Self {
            sk,
            verifier: SignVerifier::new(pk, q),
        })
    }

    pub fn sign<R: RngCore + CryptoRng>(&self, m: &[Zr], rng: &mut R) -> Result<Signature> {
        if m.len() != self.sk.len() - 2 {
            return Err(ZkatError::InvalidInput(format!(
                "PS signature cannot be generated: expect [{}] messages, got [{}]",
                self.sk.len() - 2,
                m.len()
            )));
        }
        let mut exponent = self.sk[0];
        for (sk, mi) in self.sk[1..].iter().zip(m) {
            exponent += *sk * mi;
        }
        exponent += self.sk[self.sk.len() - 1] * hash_messages(m);

        let r = math::rand_g1(rng);
        Ok(Signature { r, s: r * exponent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::zr_from_u64;
    use rand::rngs::OsRng;

    #[test]
    fn test_sign_verify() {
        let signer = Signer::key_gen(3, &mut OsRng);
        let m: Vec<Zr> = (1..=3).map(zr_from_u64).collect();

        let sig = signer.sign(&m, &mut OsRng).unwrap();
        signer.verifier.verify(&m, &sig).unwrap();

        // Different messages should fail
        let other: Vec<Zr> = (2..=4).map(zr_from_u64).collect();
        let err = signer.verifier.verify(&other, &sig).unwrap_err();
        assert_eq!(err.to_string(), "invalid signature");
    }

    #[test]
    fn test_randomized_signature_still_verifies() {
        let signer = Signer::key_gen(1, &mut OsRng);
        let m = vec![zr_from_u64(7)];
        let sig = signer.sign(&m, &mut OsRng).unwrap();

        let mut randomized = sig.clone();
        randomized.randomize(&mut OsRng);
        assert_ne!(randomized, sig);
        signer.verifier.verify(&m, &randomized).unwrap();
    }

    #[test]
    fn test_message_count_mismatch() {
        let signer = Signer::key_gen(2, &mut OsRng);
        assert!(signer.sign(&[zr_from_u64(1)], &mut OsRng).is_err());

        let sig = signer.sign(&[zr_from_u64(1), zr_from_u64(2)], &mut OsRng).unwrap();
        let err = signer.verifier.verify(&[zr_from_u64(1)], &sig).unwrap_err();
        assert!(err.to_string().contains("expect [2] messages, got [1]"));
    }

    #[test]
    fn test_signature_json_roundtrip() {
        let signer = Signer::key_gen(1, &mut OsRng);
        let sig = signer.sign(&[zr_from_u64(5)], &mut OsRng).unwrap();
        let back = Signature::deserialize(&sig.serialize().unwrap()).unwrap();
        assert_eq!(sig, back);
    }
}
