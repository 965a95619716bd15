//! One-out-of-many proofs
//!
//! Given `N = 2^n` commitments `C_0 … C_{N-1}` over the bases `(G0, G1)`,
//! proves knowledge of an index `ℓ` and a scalar `ρ` with `C_ℓ = G1^ρ`
//! (a commitment to zero) without revealing `ℓ`. The index is decomposed
//! into bits; per bit the prover sends commitments `L, A, B` for a bit
//! proof and `D` for the polynomial collapsing the product over all `N`
//! commitments.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::common::Transcript;
use crate::error::{Result, ZkatError};
use crate::math::{self, encoding, One, Zero, G1, Zr};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commitments {
    #[serde(with = "encoding::canonical_vec")]
    pub l: Vec<G1>,
    #[serde(with = "encoding::canonical_vec")]
    pub a: Vec<G1>,
    #[serde(with = "encoding::canonical_vec")]
    pub b: Vec<G1>,
    #[serde(with = "encoding::canonical_vec")]
    pub d: Vec<G1>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Values {
    #[serde(with = "encoding::canonical_vec")]
    pub l: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub a: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub b: Vec<Zr>,
    #[serde(with = "encoding::canonical")]
    pub d: Zr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub commitments: Commitments,
    pub values: Values,
}

impl Proof {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

#[derive(Clone, Debug)]
pub struct Verifier {
    pub commitments: Vec<G1>,
    pub message: Vec<u8>,
    pub pedersen_params: Vec<G1>,
    pub bit_length: usize,
}

/// `2^bit_length`, if it fits
fn set_size(bit_length: usize) -> Option<usize> {
    u32::try_from(bit_length)
        .ok()
        .and_then(|b| 1usize.checked_shl(b))
}

impl Verifier {
    pub fn new(commitments: Vec<G1>, message: Vec<u8>, pedersen_params: Vec<G1>, bit_length: usize) -> Self {
        Self {
            commitments,
            message,
            pedersen_params,
            bit_length,
        }
    }

    fn challenge(&self, c: &Commitments) -> Zr {
        Transcript::new()
            .append_all(&c.l)
            .append_all(&c.a)
            .append_all(&c.b)
            .append_all(&c.d)
            .append_all(&self.commitments)
            .append_all(&self.pedersen_params)
            .append_bytes(self.bit_length.to_string().as_bytes())
            .append_bytes(&self.message)
            .challenge()
    }

    pub fn verify(&self, proof: &Proof) -> Result<()> {
        if self.pedersen_params.len() != 2 {
            return Err(ZkatError::InvalidInput("length of Pedersen parameters != 2".into()));
        }
        let n = self.bit_length;
        if set_size(n) != Some(self.commitments.len()) {
            return Err(ZkatError::InvalidInput(format!(
                "the number of commitments is not 2^bitlength [{} != 2^{}]",
                self.commitments.len(),
                n
            )));
        }
        let c = &proof.commitments;
        if c.l.len() != n || c.a.len() != n || c.b.len() != n || c.d.len() != n {
            return Err(ZkatError::InvalidInput(format!(
                "the size of the commitments in one out of many proof is not a multiple of {}",
                n
            )));
        }
        let v = &proof.values;
        if v.l.len() != n || v.a.len() != n || v.b.len() != n {
            return Err(ZkatError::InvalidInput(format!(
                "the size of the proofs in one out of many proof is not a multiple of {}",
                n
            )));
        }

        let chal = self.challenge(c);
        let (g0, g1) = (self.pedersen_params[0], self.pedersen_params[1]);

        for i in 0..n {
            // L^c·A == G0^vL·G1^vA
            if c.l[i] * chal + c.a[i] != g0 * v.l[i] + g1 * v.a[i] {
                return Err(ZkatError::InvalidProof(
                    "verification of first equation of one out of many proof failed".into(),
                ));
            }
            // L^(c-vL)·B == G1^vB
            if c.l[i] * (chal - v.l[i]) + c.b[i] != g1 * v.b[i] {
                return Err(ZkatError::InvalidProof(
                    "verification of second equation of one out of many proof failed".into(),
                ));
            }
        }

        let mut s = G1::zero();
        for (j, com) in self.commitments.iter().enumerate() {
            let mut f = Zr::one();
            for i in 0..n {
                f *= if math::bit(j as u64, i) { v.l[i] } else { chal - v.l[i] };
            }
            s += *com * f;
        }
        let mut power = Zr::one();
        for d in &c.d {
            s -= *d * power;
            power *= chal;
        }
        if s != g1 * v.d {
            return Err(ZkatError::InvalidProof(
                "verification of third equation of one out of many proof failed".into(),
            ));
        }
        Ok(())
    }
}

/// Linear factor `alpha·x + beta`
#[derive(Clone, Copy)]
struct Monomial {
    alpha: Zr,
    beta: Zr,
}

pub struct Prover {
    pub verifier: Verifier,
    index: usize,
    com_randomness: Zr,
}

impl Prover {
    pub fn new(verifier: Verifier, index: usize, com_randomness: Zr) -> Self {
        Self {
            verifier,
            index,
            com_randomness,
        }
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Proof> {
        let v = &self.verifier;
        if v.pedersen_params.len() != 2 {
            return Err(ZkatError::InvalidInput("length of Pedersen parameters != 2".into()));
        }
        let n = v.bit_length;
        let size = set_size(n).unwrap_or(0);
        if v.commitments.len() != size || size == 0 {
            return Err(ZkatError::InvalidInput(format!(
                "number of commitments is not a power of 2, [{}][2^{}]",
                v.commitments.len(),
                n
            )));
        }
        if self.index >= size {
            return Err(ZkatError::InvalidInput(format!(
                "index [{}] out of range [0, {})",
                self.index, size
            )));
        }
        let (g0, g1) = (v.pedersen_params[0], v.pedersen_params[1]);
        if v.commitments[self.index] != g1 * self.com_randomness {
            return Err(ZkatError::InvalidInput(format!(
                "commitment at index [{}] does not open to zero",
                self.index
            )));
        }
        let bits: Vec<bool> = (0..n).map(|i| math::bit(self.index as u64, i)).collect();

        // 1. Randomness
        let a = math::rand_zr_vec(rng, n);
        let r = math::rand_zr_vec(rng, n);
        let s = math::rand_zr_vec(rng, n);
        let t = math::rand_zr_vec(rng, n);
        let rho = math::rand_zr_vec(rng, n);

        // 2. Bit commitments
        let mut coms = Commitments {
            l: Vec::with_capacity(n),
            a: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
            d: Vec::with_capacity(n),
        };
        for i in 0..n {
            coms.a.push(g0 * a[i] + g1 * s[i]);
            let mut l = g1 * r[i];
            let mut b = g1 * t[i];
            if bits[i] {
                l += g0;
                b += g0 * a[i];
            }
            coms.l.push(l);
            coms.b.push(b);
        }

        // 3. Polynomial commitments
        let f1: Vec<Monomial> = (0..n)
            .map(|i| Monomial {
                alpha: if bits[i] { Zr::one() } else { Zr::zero() },
                beta: a[i],
            })
            .collect();
        let f0: Vec<Monomial> = (0..n)
            .map(|i| Monomial {
                alpha: if bits[i] { Zr::zero() } else { Zr::one() },
                beta: -a[i],
            })
            .collect();
        let polynomials: Vec<Vec<Zr>> = (0..size)
            .map(|j| polynomial_for_index(j, n, &f0, &f1))
            .collect();
        for i in 0..n {
            let mut d = g1 * rho[i];
            for (j, poly) in polynomials.iter().enumerate() {
                if !poly[i].is_zero() {
                    d += v.commitments[j] * poly[i];
                }
            }
            coms.d.push(d);
        }

        // 4. Challenge and responses
        let chal = v.challenge(&coms);
        let mut values = Values {
            l: Vec::with_capacity(n),
            a: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
            d: Zr::zero(),
        };
        let mut power = Zr::one();
        for i in 0..n {
            let vl = if bits[i] { a[i] + chal } else { a[i] };
            values.a.push(r[i] * chal + s[i]);
            values.b.push((chal - vl) * r[i] + t[i]);
            values.l.push(vl);
            values.d += rho[i] * power;
            power *= chal;
        }
        values.d = self.com_randomness * power - values.d;

        Ok(Proof {
            commitments: coms,
            values,
        })
    }
}

/// First `n` coefficients of `Π_i f_{bit_i(j)}(x)`
fn polynomial_for_index(j: usize, n: usize, f0: &[Monomial], f1: &[Monomial]) -> Vec<Zr> {
    let mut coefficients = vec![Zr::one()];
    for i in 0..n {
        let g = if math::bit(j as u64, i) { f1[i] } else { f0[i] };
        let mut next = vec![Zr::zero(); coefficients.len() + 1];
        for (k, c) in coefficients.iter().enumerate() {
            next[k] += g.beta * c;
            next[k + 1] += g.alpha * c;
        }
        coefficients = next;
    }
    coefficients.truncate(n);
    coefficients
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn setup(bit_length: usize, index: usize) -> Prover {
        let pp = vec![math::rand_g1(&mut OsRng), math::rand_g1(&mut OsRng)];
        let rho = math::rand_zr(&mut OsRng);
        let mut commitments: Vec<G1> = (0..1 << bit_length).map(|_| math::rand_g1(&mut OsRng)).collect();
        commitments[index] = pp[1] * rho;

        let verifier = Verifier::new(commitments, b"message".to_vec(), pp, bit_length);
        Prover::new(verifier, index, rho)
    }

    #[test]
    fn test_one_out_of_many() {
        for (bit_length, index) in [(1, 0), (1, 1), (3, 5), (4, 0), (4, 15)] {
            let prover = setup(bit_length, index);
            let proof = prover.prove(&mut OsRng).unwrap();
            prover.verifier.verify(&proof).unwrap();
        }
    }

    #[test]
    fn test_wrong_message() {
        let prover = setup(3, 2);
        let proof = prover.prove(&mut OsRng).unwrap();

        let mut verifier = prover.verifier.clone();
        verifier.message = b"another message".to_vec();
        assert!(verifier.verify(&proof).is_err());
    }

    #[test]
    fn test_not_power_of_two() {
        let mut prover = setup(2, 1);
        prover.verifier.commitments.pop();

        let err = prover.prove(&mut OsRng).unwrap_err();
        assert!(err.to_string().contains("not a power of 2"));

        let honest = setup(2, 1);
        let proof = honest.prove(&mut OsRng).unwrap();
        let err = prover.verifier.verify(&proof).unwrap_err();
        assert!(err.to_string().contains("not 2^bitlength"));
    }

    #[test]
    fn test_no_commitment_to_zero() {
        let mut prover = setup(2, 3);
        prover.verifier.commitments[3] = math::rand_g1(&mut OsRng);
        assert!(prover.prove(&mut OsRng).is_err());
    }

    #[test]
    fn test_tampered_values() {
        let prover = setup(3, 4);
        let proof = prover.prove(&mut OsRng).unwrap();

        let mut bad = proof.clone();
        bad.values.l[0] += Zr::one();
        let err = prover.verifier.verify(&bad).unwrap_err();
        assert!(err.to_string().contains("first equation"));

        let mut bad = proof.clone();
        bad.values.d += Zr::one();
        let err = prover.verifier.verify(&bad).unwrap_err();
        assert!(err.to_string().contains("third equation"));

        let mut bad = proof;
        bad.commitments.d.pop();
        assert!(prover.verifier.verify(&bad).is_err());
    }

    #[test]
    fn test_proof_roundtrip() {
        let prover = setup(2, 2);
        let proof = prover.prove(&mut OsRng).unwrap();
        let back = Proof::deserialize(&proof.serialize().unwrap()).unwrap();
        assert_eq!(proof, back);
        prover.verifier.verify(&back).unwrap();
    }
}
