//! Bulletproof range proofs
//!
//! Proves that `com = G^v·H^bf` commits to `v < 2^n`. The bits of `v` and
//! their complements are committed with vector generators, collapsed with
//! the challenges `y`, `z`, `x`, and the resulting inner product is shown
//! correct with an [`IPA`](super::ipa::IPA).

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::ipa::{IpaProver, IpaVerifier, IPA};
use super::RangeProofParams;
use crate::common::Transcript;
use crate::error::{Result, ZkatError};
use crate::math::{self, encoding, One, Zero, G1, Zr};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeProof {
    /// Commitment to `t1` with randomness `tau1`
    #[serde(with = "encoding::canonical")]
    pub t1: G1,
    /// Commitment to `t2` with randomness `tau2`
    #[serde(with = "encoding::canonical")]
    pub t2: G1,
    /// `tau1·x + tau2·x² + z²·bf`
    #[serde(with = "encoding::canonical")]
    pub tau: Zr,
    /// Hiding commitment to the bits and the bits minus one
    #[serde(with = "encoding::canonical")]
    pub c: G1,
    /// Hiding commitment to the blinding vectors
    #[serde(with = "encoding::canonical")]
    pub d: G1,
    /// `rho + eta·x`
    #[serde(with = "encoding::canonical")]
    pub delta: Zr,
    #[serde(with = "encoding::canonical")]
    pub inner_product: Zr,
    pub ipa: IPA,
}

/// Challenges `y`, `z` from `(C, D, com)`
fn challenges_yz(c: &G1, d: &G1, com: &G1) -> (Zr, Zr) {
    let y = Transcript::new().append(c).append(d).append(com).challenge();
    let z = Transcript::new().append(&y).challenge();
    (y, z)
}

fn challenge_x(t1: &G1, t2: &G1) -> Zr {
    Transcript::new().append(t1).append(t2).challenge()
}

/// `(y^0 … y^{n-1})`, `(2^0 … 2^{n-1})`
fn powers(y: &Zr, n: usize) -> (Vec<Zr>, Vec<Zr>) {
    let two = Zr::from(2u64);
    let mut y_pow = Vec::with_capacity(n);
    let mut two_pow = Vec::with_capacity(n);
    let (mut a, mut b) = (Zr::one(), Zr::one());
    for _ in 0..n {
        y_pow.push(a);
        two_pow.push(b);
        a *= y;
        b *= two;
    }
    (y_pow, two_pow)
}

/// `H'_i = H_i^(y^-i)`
fn scaled_right_generators(right: &[G1], y_pow: &[Zr]) -> Result<Vec<G1>> {
    right
        .iter()
        .zip(y_pow)
        .map(|(h, yi)| Ok(*h * math::zr_inverse(yi)?))
        .collect()
}

fn commit_vectors(left: &[Zr], right: &[Zr], lg: &[G1], rg: &[G1]) -> G1 {
    math::inner_product_g1(lg, left) + math::inner_product_g1(rg, right)
}

pub(crate) struct RangeProver<'a> {
    pub commitment: G1,
    pub value: u64,
    pub blinding_factor: Zr,
    /// `(G, H)` with `commitment = G^value·H^blinding_factor`
    pub commitment_generators: [G1; 2],
    pub params: &'a RangeProofParams,
}

impl RangeProver<'_> {
    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<RangeProof> {
        let pp = self.params;
        let n = pp.bit_length as usize;
        let [g, h] = self.commitment_generators;

        // 1. Commit to the bits and to random blinding vectors
        let bits: Vec<Zr> = (0..n)
            .map(|i| if math::bit(self.value, i) { Zr::one() } else { Zr::zero() })
            .collect();
        let bits_minus_one: Vec<Zr> = bits.iter().map(|b| *b - Zr::one()).collect();
        let u = math::rand_zr_vec(rng, n);
        let v = math::rand_zr_vec(rng, n);
        let rho = math::rand_zr(rng);
        let eta = math::rand_zr(rng);

        let c = commit_vectors(&bits, &bits_minus_one, &pp.left_generators, &pp.right_generators) + pp.p * rho;
        let d = commit_vectors(&u, &v, &pp.left_generators, &pp.right_generators) + pp.p * eta;

        // 2. Collapse with y and z
        let (y, z) = challenges_yz(&c, &d, &self.commitment);
        let z_square = z * z;
        let (y_pow, two_pow) = powers(&y, n);

        let left_prime: Vec<Zr> = bits.iter().map(|b| *b - z).collect();
        let right_prime: Vec<Zr> = (0..n).map(|i| (bits_minus_one[i] + z) * y_pow[i]).collect();
        let v_prime: Vec<Zr> = (0..n).map(|i| v[i] * y_pow[i]).collect();
        let z_prime: Vec<Zr> = two_pow.iter().map(|p| z_square * p).collect();

        // 3. Commit to the coefficients of t(x) = t0 + t1·x + t2·x²
        let t1 = math::inner_product_zr(&left_prime, &v_prime)
            + math::inner_product_zr(&right_prime, &u)
            + math::inner_product_zr(&z_prime, &u);
        let t2 = math::inner_product_zr(&u, &v_prime);
        let tau1 = math::rand_zr(rng);
        let tau2 = math::rand_zr(rng);
        let t1_com = g * t1 + h * tau1;
        let t2_com = g * t2 + h * tau2;

        let x = challenge_x(&t1_com, &t2_com);

        // 4. Evaluate the vectors at x
        let left: Vec<Zr> = (0..n).map(|i| left_prime[i] + x * u[i]).collect();
        let right: Vec<Zr> = (0..n)
            .map(|i| right_prime[i] + x * v_prime[i] + z_prime[i])
            .collect();
        let tau = x * tau1 + x * x * tau2 + z_square * self.blinding_factor;
        let delta = rho + eta * x;

        // 5. Inner product argument over (G_i, H'_i)
        let right_generators = scaled_right_generators(&pp.right_generators, &y_pow)?;
        let com = commit_vectors(&left, &right, &pp.left_generators, &right_generators);
        let inner_product = math::inner_product_zr(&left, &right);
        let ipa = IpaProver {
            inner_product,
            left,
            right,
            q: pp.q,
            left_generators: &pp.left_generators,
            right_generators,
            commitment: com,
            rounds: pp.number_of_rounds,
        }
        .prove()?;

        Ok(RangeProof {
            t1: t1_com,
            t2: t2_com,
            tau,
            c,
            d,
            delta,
            inner_product,
            ipa,
        })
    }
}

pub(crate) struct RangeVerifier<'a> {
    pub commitment: G1,
    pub commitment_generators: [G1; 2],
    pub params: &'a RangeProofParams,
}

impl RangeVerifier<'_> {
    pub fn verify(&self, rp: &RangeProof) -> Result<()> {
        let pp = self.params;
        let n = pp.bit_length as usize;
        if pp.left_generators.len() != n || pp.right_generators.len() != n {
            return Err(ZkatError::InvalidInput(
                "range proof generators do not match bit length".into(),
            ));
        }
        let [g, h] = self.commitment_generators;

        let x = challenge_x(&rp.t1, &rp.t2);
        let (y, z) = challenges_yz(&rp.c, &rp.d, &self.commitment);
        let z_square = z * z;
        let (y_pow, two_pow) = powers(&y, n);

        // (z - z²)·Σy^i - z³·Σ2^i
        let sum_y = y_pow.iter().fold(Zr::zero(), |acc, e| acc + e);
        let sum_two = two_pow.iter().fold(Zr::zero(), |acc, e| acc + e);
        let pol_eval = (z - z_square) * sum_y - z_square * z * sum_two;

        let lhs = g * rp.inner_product + h * rp.tau - rp.t1 * x - rp.t2 * (x * x);
        let rhs = self.commitment * z_square + g * pol_eval;
        if lhs != rhs {
            return Err(ZkatError::InvalidProof("invalid range proof".into()));
        }

        // Commitment to the evaluated vectors under (G_i, H'_i)
        let right_generators = scaled_right_generators(&pp.right_generators, &y_pow)?;
        let mut com = rp.c + rp.d * x - pp.p * rp.delta;
        for i in 0..n {
            com -= pp.left_generators[i] * z;
            com += right_generators[i] * (z * y_pow[i] + z_square * two_pow[i]);
        }

        IpaVerifier {
            inner_product: rp.inner_product,
            q: pp.q,
            left_generators: &pp.left_generators,
            right_generators,
            commitment: com,
            rounds: pp.number_of_rounds,
        }
        .verify(&rp.ipa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn prove(value: u64, params: &RangeProofParams) -> (RangeProof, RangeVerifier<'_>) {
        let gens = [math::rand_g1(&mut OsRng), math::rand_g1(&mut OsRng)];
        let bf = math::rand_zr(&mut OsRng);
        let com = gens[0] * math::zr_from_u64(value) + gens[1] * bf;

        let proof = RangeProver {
            commitment: com,
            value,
            blinding_factor: bf,
            commitment_generators: gens,
            params,
        }
        .prove(&mut OsRng)
        .unwrap();
        let verifier = RangeVerifier {
            commitment: com,
            commitment_generators: gens,
            params,
        };
        (proof, verifier)
    }

    #[test]
    fn test_range_proof() {
        let params = RangeProofParams::new(16).unwrap();
        for value in [0, 1, 115, (1 << 16) - 1] {
            let (proof, verifier) = prove(value, &params);
            verifier.verify(&proof).unwrap();
        }
    }

    #[test]
    fn test_value_out_of_range() {
        // 2^8 does not fit in 8 bits; the prover only commits to the low bits
        let params = RangeProofParams::new(8).unwrap();
        let (proof, verifier) = prove(1 << 8, &params);
        let err = verifier.verify(&proof).unwrap_err();
        assert_eq!(err.to_string(), "invalid range proof");
    }

    #[test]
    fn test_tampered_proof() {
        let params = RangeProofParams::new(8).unwrap();
        let (proof, verifier) = prove(42, &params);

        let mut bad = proof.clone();
        bad.tau += Zr::one();
        assert!(verifier.verify(&bad).is_err());

        let mut bad = proof.clone();
        bad.ipa.left += Zr::one();
        assert_eq!(verifier.verify(&bad).unwrap_err().to_string(), "invalid IPA");

        let mut bad = proof;
        bad.delta += Zr::one();
        assert!(verifier.verify(&bad).is_err());
    }
}
