//! Building blocks shared by every proof: Fiat-Shamir transcripts,
//! Pedersen commitments and Schnorr proofs.

pub mod schnorr;

use ark_serialize::CanonicalSerialize;

use crate::error::{Result, ZkatError};
use crate::math::{self, Zero, G1, Zr};

pub use schnorr::{SchnorrProof, SchnorrProver, SchnorrVerifier};

/// Domain separator placed between the public statement and the proof
/// data of an inner-product argument transcript.
pub const SEPARATOR: &str = "||";

/// Fiat-Shamir transcript
///
/// Accumulates canonical encodings of public values; the challenge is the
/// hash of the accumulated bytes reduced into the scalar field.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    bytes: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single element
    pub fn append<T: CanonicalSerialize>(&mut self, e: &T) -> &mut Self {
        e.serialize_compressed(&mut self.bytes)
            .expect("serialization into a Vec cannot fail");
        self
    }

    /// Appends every element of a slice in order
    pub fn append_all<T: CanonicalSerialize>(&mut self, es: &[T]) -> &mut Self {
        for e in es {
            self.append(e);
        }
        self
    }

    /// Appends raw bytes
    pub fn append_bytes(&mut self, b: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(b);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Challenge derived from everything appended so far
    pub fn challenge(&self) -> Zr {
        math::hash_to_zr(&self.bytes)
    }
}

/// Challenge over a list of group elements
pub fn compute_challenge(elements: &[G1]) -> Zr {
    Transcript::new().append_all(elements).challenge()
}

/// `Π bases_i^opening_i`
pub fn compute_pedersen_commitment(opening: &[Zr], bases: &[G1]) -> Result<G1> {
    if opening.len() != bases.len() {
        return Err(ZkatError::InvalidInput(format!(
            "can't compute Pedersen commitment: expect [{}] values, got [{}]",
            bases.len(),
            opening.len()
        )));
    }
    Ok(math::inner_product_g1(bases, opening))
}

/// `Σ elements`
pub fn sum(elements: &[G1]) -> G1 {
    elements.iter().fold(G1::zero(), |acc, e| acc + e)
}
