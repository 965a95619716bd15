//! Inner-product argument
//!
//! Shows that a commitment `com = <a, G> + <b, H>` opens to vectors whose
//! inner product is a public value. Each round halves the vectors and the
//! generators, so the proof carries `log2(n)` pairs `(L, R)` and the two
//! final scalars.

use serde::{Deserialize, Serialize};

use crate::common::{Transcript, SEPARATOR};
use crate::error::{Result, ZkatError};
use crate::math::{self, encoding, One, Zero, G1, Zr};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IPA {
    /// Final element of the left vector
    #[serde(with = "encoding::canonical")]
    pub left: Zr,
    /// Final element of the right vector
    #[serde(with = "encoding::canonical")]
    pub right: Zr,
    #[serde(with = "encoding::canonical_vec")]
    pub l: Vec<G1>,
    #[serde(with = "encoding::canonical_vec")]
    pub r: Vec<G1>,
}

fn initial_challenge(right_gens: &[G1], left_gens: &[G1], q: &G1, com: &G1, ip: &Zr) -> Zr {
    Transcript::new()
        .append_all(right_gens)
        .append_all(left_gens)
        .append(q)
        .append(com)
        .append_bytes(SEPARATOR.as_bytes())
        .append(ip)
        .challenge()
}

fn round_challenge(l: &G1, r: &G1) -> Zr {
    Transcript::new().append(l).append(r).challenge()
}

pub(crate) struct IpaProver<'a> {
    pub inner_product: Zr,
    pub left: Vec<Zr>,
    pub right: Vec<Zr>,
    pub q: G1,
    pub left_generators: &'a [G1],
    pub right_generators: Vec<G1>,
    pub commitment: G1,
    pub rounds: u64,
}

impl IpaProver<'_> {
    pub fn prove(&self) -> Result<IPA> {
        let n = self.left.len();
        if n != self.right.len()
            || n != self.left_generators.len()
            || n != self.right_generators.len()
            || Some(n) != 1usize.checked_shl(self.rounds as u32)
        {
            return Err(ZkatError::InvalidInput(
                "cannot compute inner product argument: vector sizes do not match number of rounds".into(),
            ));
        }

        let x = initial_challenge(
            &self.right_generators,
            self.left_generators,
            &self.q,
            &self.commitment,
            &self.inner_product,
        );
        let xq = self.q * x;
        let mut com = self.commitment + self.q * (x * self.inner_product);

        let mut left_gen = self.left_generators.to_vec();
        let mut right_gen = self.right_generators.clone();
        let mut left = self.left.clone();
        let mut right = self.right.clone();
        let mut ls = Vec::with_capacity(self.rounds as usize);
        let mut rs = Vec::with_capacity(self.rounds as usize);

        for _ in 0..self.rounds {
            let h = left_gen.len() / 2;
            let l = math::inner_product_g1(&left_gen[h..], &left[..h])
                + math::inner_product_g1(&right_gen[..h], &right[h..])
                + xq * math::inner_product_zr(&left[..h], &right[h..]);
            let r = math::inner_product_g1(&left_gen[..h], &left[h..])
                + math::inner_product_g1(&right_gen[h..], &right[..h])
                + xq * math::inner_product_zr(&left[h..], &right[..h]);

            let x = round_challenge(&l, &r);
            let x_inv = math::zr_inverse(&x)?;

            for i in 0..h {
                left_gen[i] = left_gen[i] * x_inv + left_gen[i + h] * x;
                right_gen[i] = right_gen[i] * x + right_gen[i + h] * x_inv;
                left[i] = left[i] * x + left[i + h] * x_inv;
                right[i] = right[i] * x_inv + right[i + h] * x;
            }
            left_gen.truncate(h);
            right_gen.truncate(h);
            left.truncate(h);
            right.truncate(h);

            let x_square = x * x;
            com += l * x_square + r * math::zr_inverse(&x_square)?;
            ls.push(l);
            rs.push(r);
        }

        Ok(IPA {
            left: left[0],
            right: right[0],
            l: ls,
            r: rs,
        })
    }
}

pub(crate) struct IpaVerifier<'a> {
    pub inner_product: Zr,
    pub q: G1,
    pub left_generators: &'a [G1],
    pub right_generators: Vec<G1>,
    pub commitment: G1,
    pub rounds: u64,
}

impl IpaVerifier<'_> {
    pub fn verify(&self, proof: &IPA) -> Result<()> {
        if proof.l.len() != proof.r.len() || proof.l.len() as u64 != self.rounds {
            return Err(ZkatError::InvalidProof("invalid IPA proof".into()));
        }
        let n = self.left_generators.len();
        if n != self.right_generators.len() || Some(n) != 1usize.checked_shl(self.rounds as u32) {
            return Err(ZkatError::InvalidInput(
                "cannot verify inner product argument: generators do not match number of rounds".into(),
            ));
        }

        let x = initial_challenge(
            &self.right_generators,
            self.left_generators,
            &self.q,
            &self.commitment,
            &self.inner_product,
        );
        let xq = self.q * x;
        let mut expected = self.commitment + self.q * (x * self.inner_product);

        let mut challenges = Vec::with_capacity(proof.l.len());
        let mut inverses = Vec::with_capacity(proof.l.len());
        for (l, r) in proof.l.iter().zip(&proof.r) {
            let x = round_challenge(l, r);
            let x_inv = math::zr_inverse(&x)?;
            let x_square = x * x;
            expected += *l * x_square + *r * (x_inv * x_inv);
            challenges.push(x);
            inverses.push(x_inv);
        }

        // s_i is the product over rounds of x_j when the matching bit of i is
        // set, x_j^-1 otherwise; the highest bit belongs to the first round
        let k = challenges.len();
        let mut folded_left = G1::zero();
        let mut folded_right = G1::zero();
        for i in 0..n {
            let mut s = Zr::one();
            let mut s_inv = Zr::one();
            for j in 0..k {
                if math::bit(i as u64, k - 1 - j) {
                    s *= challenges[j];
                    s_inv *= inverses[j];
                } else {
                    s *= inverses[j];
                    s_inv *= challenges[j];
                }
            }
            folded_left += self.left_generators[i] * s;
            folded_right += self.right_generators[i] * s_inv;
        }

        let actual = folded_left * proof.left + folded_right * proof.right + xq * (proof.left * proof.right);
        if actual != expected {
            return Err(ZkatError::InvalidProof("invalid IPA".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn setup(n: usize) -> (Vec<Zr>, Vec<Zr>, Vec<G1>, Vec<G1>, G1) {
        let a = math::rand_zr_vec(&mut OsRng, n);
        let b = math::rand_zr_vec(&mut OsRng, n);
        let g: Vec<G1> = (0..n).map(|_| math::rand_g1(&mut OsRng)).collect();
        let h: Vec<G1> = (0..n).map(|_| math::rand_g1(&mut OsRng)).collect();
        let q = math::rand_g1(&mut OsRng);
        (a, b, g, h, q)
    }

    #[test]
    fn test_ipa() {
        let (a, b, g, h, q) = setup(16);
        let com = math::inner_product_g1(&g, &a) + math::inner_product_g1(&h, &b);
        let ip = math::inner_product_zr(&a, &b);

        let proof = IpaProver {
            inner_product: ip,
            left: a,
            right: b,
            q,
            left_generators: &g,
            right_generators: h.clone(),
            commitment: com,
            rounds: 4,
        }
        .prove()
        .unwrap();
        assert_eq!(proof.l.len(), 4);

        let verifier = IpaVerifier {
            inner_product: ip,
            q,
            left_generators: &g,
            right_generators: h,
            commitment: com,
            rounds: 4,
        };
        verifier.verify(&proof).unwrap();

        // Wrong inner product
        let bad = IpaVerifier {
            inner_product: ip + Zr::one(),
            ..verifier
        };
        assert_eq!(bad.verify(&proof).unwrap_err().to_string(), "invalid IPA");
    }

    #[test]
    fn test_ipa_wrong_number_of_rounds() {
        let (a, b, g, h, q) = setup(8);
        let com = math::inner_product_g1(&g, &a) + math::inner_product_g1(&h, &b);
        let ip = math::inner_product_zr(&a, &b);
        let mut proof = IpaProver {
            inner_product: ip,
            left: a,
            right: b,
            q,
            left_generators: &g,
            right_generators: h.clone(),
            commitment: com,
            rounds: 3,
        }
        .prove()
        .unwrap();
        proof.l.pop();

        let verifier = IpaVerifier {
            inner_product: ip,
            q,
            left_generators: &g,
            right_generators: h,
            commitment: com,
            rounds: 3,
        };
        assert!(verifier.verify(&proof).is_err());
    }
}
