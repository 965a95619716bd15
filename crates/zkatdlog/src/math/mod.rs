//! Group and field arithmetic over BN254
//!
//! Thin helpers around arkworks: scalar and group aliases, hashing into the
//! scalar field and into G1, canonical byte encodings and pairings. Every
//! function that needs randomness takes the RNG explicitly.

pub mod encoding;

use ark_bn254::{Bn254, Fq, G1Affine};
use ark_ec::pairing::{Pairing, PairingOutput};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use rand::SeedableRng;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::Result;

pub use ark_ff::Field;
pub use ark_std::{One, Zero};

/// Scalar field element
pub type Zr = ark_bn254::Fr;
/// Element of the first source group
pub type G1 = ark_bn254::G1Projective;
/// Element of the second source group
pub type G2 = ark_bn254::G2Projective;
/// Element of the target group, written additively
pub type Gt = PairingOutput<Bn254>;

/// Identifier of the curve the public parameters were generated for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CurveID {
    /// Barreto-Naehrig curve with a 254-bit prime
    #[default]
    Bn254,
}

/// Uniformly random scalar
pub fn rand_zr<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Zr {
    Zr::rand(rng)
}

/// Uniformly random G1 element
pub fn rand_g1<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> G1 {
    G1::rand(rng)
}

/// Uniformly random G2 element
pub fn rand_g2<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> G2 {
    G2::rand(rng)
}

/// Vector of `n` random scalars
pub fn rand_zr_vec<R: RngCore + CryptoRng + ?Sized>(rng: &mut R, n: usize) -> Vec<Zr> {
    (0..n).map(|_| Zr::rand(&mut *rng)).collect()
}

/// Independent RNG for a parallel task, seeded from the caller's RNG.
pub fn fork_rng<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> rand::rngs::StdRng {
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    rand::rngs::StdRng::from_seed(seed)
}

/// SHA-256 of `data`, reduced modulo the group order.
pub fn hash_to_zr(data: &[u8]) -> Zr {
    let digest = Sha256::digest(data);
    Zr::from_be_bytes_mod_order(&digest)
}

/// Hashes `data` to a G1 element by try-and-increment.
///
/// BN254 G1 has cofactor one, so every point on the curve lies in the
/// prime-order subgroup.
pub fn hash_to_g1(data: &[u8]) -> G1 {
    let mut counter: u64 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.update(counter.to_be_bytes());
        let digest = hasher.finalize();

        let x = Fq::from_be_bytes_mod_order(&digest);
        if let Some(point) = G1Affine::get_point_from_x_unchecked(x, digest[31] & 1 == 1) {
            return point.into_group();
        }
        counter = counter.wrapping_add(1);
    }
}

/// Scalar encoding of an unsigned integer
pub fn zr_from_u64(v: u64) -> Zr {
    Zr::from(v)
}

/// Returns `z` as a `u64` when it fits.
pub fn zr_to_u64(z: &Zr) -> Option<u64> {
    let limbs = z.into_bigint();
    let limbs = limbs.as_ref();
    if limbs[1..].iter().all(|l| *l == 0) {
        Some(limbs[0])
    } else {
        None
    }
}

/// `base^e` in the scalar field
pub fn zr_pow(base: &Zr, e: u64) -> Zr {
    base.pow([e])
}

/// Multiplicative inverse, failing on zero
pub fn zr_inverse(z: &Zr) -> Result<Zr> {
    z.inverse()
        .ok_or_else(|| crate::error::ZkatError::InvalidInput("cannot invert zero".into()))
}

/// Bit `i` of `v`
pub fn bit(v: u64, i: usize) -> bool {
    i < 64 && (v >> i) & 1 == 1
}

/// Canonical compressed encoding of a curve point or field element.
pub fn to_bytes<T: CanonicalSerialize>(t: &T) -> Vec<u8> {
    let mut buf = Vec::with_capacity(t.compressed_size());
    t.serialize_compressed(&mut buf)
        .expect("serialization into a Vec cannot fail");
    buf
}

/// Decodes a canonical compressed encoding, checking subgroup membership.
pub fn from_bytes<T: CanonicalDeserialize>(bytes: &[u8]) -> Result<T> {
    Ok(T::deserialize_compressed(bytes)?)
}

/// Big-endian bytes of a scalar, used when hashing message vectors.
pub fn zr_be_bytes(z: &Zr) -> Vec<u8> {
    z.into_bigint().to_bytes_be()
}

/// Constant-time equality of two scalars
pub fn zr_ct_eq(a: &Zr, b: &Zr) -> bool {
    to_bytes(a).ct_eq(&to_bytes(b)).into()
}

/// `e(a, b)`
pub fn pairing(a: &G1, b: &G2) -> Gt {
    Bn254::pairing(*a, *b)
}

/// `Σ e(a_i, b_i)` computed with a single final exponentiation
pub fn multi_pairing(a: &[G1], b: &[G2]) -> Gt {
    Bn254::multi_pairing(a.iter().copied(), b.iter().copied())
}

/// `Σ bases_i^exponents_i`
pub fn inner_product_g1(bases: &[G1], exponents: &[Zr]) -> G1 {
    bases
        .iter()
        .zip(exponents)
        .fold(G1::zero(), |acc, (b, e)| acc + *b * e)
}

/// `Σ a_i·b_i`
pub fn inner_product_zr(a: &[Zr], b: &[Zr]) -> Zr {
    a.iter().zip(b).fold(Zr::zero(), |acc, (x, y)| acc + *x * y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_hash_to_g1_deterministic() {
        let a = hash_to_g1(b"RangeProof.2");
        let b = hash_to_g1(b"RangeProof.2");
        let c = hash_to_g1(b"RangeProof.3");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }

    #[test]
    fn test_zr_u64_conversion() {
        assert_eq!(zr_to_u64(&zr_from_u64(42)), Some(42));
        assert_eq!(zr_to_u64(&zr_from_u64(u64::MAX)), Some(u64::MAX));
        // -1 does not fit
        assert_eq!(zr_to_u64(&-Zr::one()), None);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let g = rand_g1(&mut OsRng);
        let bytes = to_bytes(&g);
        assert_eq!(bytes.len(), g.compressed_size());
        let back: G1 = from_bytes(&bytes).unwrap();
        assert_eq!(g, back);

        // Truncated encodings are rejected
        assert!(from_bytes::<G1>(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_pairing_bilinear() {
        let g = rand_g1(&mut OsRng);
        let h = rand_g2(&mut OsRng);
        let a = rand_zr(&mut OsRng);

        assert_eq!(pairing(&(g * a), &h), pairing(&g, &h) * a);
        assert!(multi_pairing(&[g * a, -g], &[h, h * a]).is_zero());
    }

    #[test]
    fn test_ct_eq() {
        let a = rand_zr(&mut OsRng);
        assert!(zr_ct_eq(&a, &a));
        assert!(!zr_ct_eq(&a, &(a + Zr::one())));
    }
}
