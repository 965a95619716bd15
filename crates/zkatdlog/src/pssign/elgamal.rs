//! ElGamal encryption of G1 elements

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::math::{self, encoding, G1, Zr};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "encoding::canonical")]
    pub gen: G1,
    #[serde(with = "encoding::canonical")]
    pub h: G1,
}

#[derive(Clone, Debug)]
pub struct SecretKey {
    x: Zr,
    pub public_key: PublicKey,
}

/// `(C1, C2) = (gen^r, M + h^r)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    #[serde(with = "encoding::canonical")]
    pub c1: G1,
    #[serde(with = "encoding::canonical")]
    pub c2: G1,
}

impl PublicKey {
    /// Encrypts `m`, returning the ciphertext and the randomness used.
    pub fn encrypt<R: RngCore + CryptoRng>(&self, m: &G1, rng: &mut R) -> (Ciphertext, Zr) {
        let r = math::rand_zr(rng);
        let ct = Ciphertext {
            c1: self.gen * r,
            c2: *m + self.h * r,
        };
        (ct, r)
    }
}

impl SecretKey {
    /// Fresh key pair with a random generator
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let gen = math::rand_g1(rng);
        let x = math::rand_zr(rng);
        Self::from_parts(x, gen)
    }

    pub fn from_parts(x: Zr, gen: G1) -> Self {
        Self {
            x,
            public_key: PublicKey { gen, h: gen * x },
        }
    }

    pub fn decrypt(&self, ct: &Ciphertext) -> G1 {
        ct.c2 - ct.c1 * self.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_encrypt_decrypt() {
        let sk = SecretKey::new(&mut OsRng);
        let m = math::rand_g1(&mut OsRng);
        let (ct, r) = sk.public_key.encrypt(&m, &mut OsRng);

        assert_eq!(ct.c1, sk.public_key.gen * r);
        assert_eq!(sk.decrypt(&ct), m);

        // Another key does not decrypt
        let other = SecretKey::new(&mut OsRng);
        assert_ne!(other.decrypt(&ct), m);
    }
}
