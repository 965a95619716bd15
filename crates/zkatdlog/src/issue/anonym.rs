//! Anonymous issuers
//!
//! An authorized issuer holds `sk` with `pk = G0^sk` listed in the issuing
//! policy. To issue anonymously it publishes a pseudonym
//! `nym = G0^sk·G2^r` and signs the issue with
//!
//! - an authorization proof: one-out-of-many over `nym - pk_j` with bases
//!   `(G0, G2)`, showing that one of them is a commitment to zero;
//! - a type correctness proof: a signature of knowledge of the openings of
//!   `nym` and of the issue's commitment to type.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::common::{SchnorrProver, Transcript};
use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::{self, Identity};
use crate::math::{self, encoding, G1, Zr};
use crate::o2omp;
use crate::range::TypeCommitment;
use crate::setup::PublicParams;
use crate::token::type_to_zr;

/// Key pair of an anonymous issuer
#[derive(Clone, Debug)]
pub struct IssuerKeyPair {
    sk: Zr,
    pub pk: G1,
}

impl IssuerKeyPair {
    pub fn new<R: RngCore + CryptoRng>(pp: &PublicParams, rng: &mut R) -> Result<Self> {
        let g0 = pp
            .pedersen_generators
            .first()
            .ok_or_else(|| ZkatError::InvalidParameters("invalid pedersen generators".into()))?;
        let sk = math::rand_zr(rng);
        Ok(Self { sk, pk: *g0 * sk })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeCorrectness {
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
    /// Responses for `(sk, r)` opening the pseudonym
    #[serde(with = "encoding::canonical_vec")]
    pub nym: Vec<Zr>,
    /// Responses for `(type, bf)` opening the commitment to type
    #[serde(with = "encoding::canonical_vec")]
    pub commitment_to_type: Vec<Zr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub authorization_correctness: o2omp::Proof,
    pub type_correctness: TypeCorrectness,
}

impl Signature {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal anonymous issuer signature")
    }
}

/// Identity under which an anonymous issue is recorded
pub fn nym_identity(nym: &G1) -> Identity {
    Identity::new(math::to_bytes(nym))
}

/// Pseudonym carried by an anonymous issuer identity
pub fn nym_from_identity(id: &Identity) -> Result<G1> {
    math::from_bytes(id.as_bytes()).context(|| "failed to unmarshal issuer pseudonym")
}

fn type_correctness_challenge(bases: &[G1; 2], nym: &G1, com_type: &G1, coms: &[G1; 2], message: &[u8]) -> Zr {
    Transcript::new()
        .append_all(bases)
        .append(nym)
        .append(com_type)
        .append_all(coms)
        .append_bytes(message)
        .challenge()
}

/// Checks signatures of an anonymous issuer
#[derive(Clone, Debug)]
pub struct Verifier {
    pub nym: G1,
    pub commitment_to_type: G1,
    /// Padded list of authorized issuer keys
    pub issuers: Vec<G1>,
    pub bit_length: usize,
    /// `(G0, G2)`
    pub pedersen_params: [G1; 2],
}

impl Verifier {
    pub fn new(nym: G1, commitment_to_type: G1, pp: &PublicParams) -> Result<Self> {
        let policy = &pp.issuing_policy;
        if policy.issuers.is_empty() {
            return Err(ZkatError::InvalidParameters("no anonymous issuers are authorized".into()));
        }
        policy.validate()?;
        let g = &pp.pedersen_generators;
        if g.len() != 3 {
            return Err(ZkatError::InvalidParameters("invalid pedersen generators".into()));
        }
        Ok(Self {
            nym,
            commitment_to_type,
            issuers: policy.issuers.clone(),
            bit_length: policy.bit_length as usize,
            pedersen_params: [g[0], g[2]],
        })
    }

    fn o2omp_verifier(&self, message: &[u8]) -> o2omp::Verifier {
        o2omp::Verifier::new(
            self.issuers.iter().map(|pk| self.nym - pk).collect(),
            message.to_vec(),
            self.pedersen_params.to_vec(),
            self.bit_length,
        )
    }

    fn verify_type_correctness(&self, message: &[u8], tc: &TypeCorrectness) -> Result<()> {
        if tc.nym.len() != 2 || tc.commitment_to_type.len() != 2 {
            return Err(ZkatError::InvalidInput("type correctness proof not well formed".into()));
        }
        let [g0, g2] = self.pedersen_params;
        let coms = [
            g0 * tc.nym[0] + g2 * tc.nym[1] - self.nym * tc.challenge,
            g0 * tc.commitment_to_type[0] + g2 * tc.commitment_to_type[1] - self.commitment_to_type * tc.challenge,
        ];
        let c = type_correctness_challenge(
            &self.pedersen_params,
            &self.nym,
            &self.commitment_to_type,
            &coms,
            message,
        );
        if !math::zr_ct_eq(&c, &tc.challenge) {
            return Err(ZkatError::InvalidProof("invalid type correctness proof".into()));
        }
        Ok(())
    }
}

impl identity::Verifier for Verifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let sig = Signature::deserialize(signature)?;
        self.o2omp_verifier(message)
            .verify(&sig.authorization_correctness)
            .context(|| "anonymous issuer is not authorized")?;
        self.verify_type_correctness(message, &sig.type_correctness)
    }
}

/// Signs issues on behalf of an anonymous issuer
pub struct Signer {
    verifier: Verifier,
    key: IssuerKeyPair,
    index: usize,
    nym_randomness: Zr,
    token_type: Zr,
    type_blinding_factor: Zr,
}

impl Signer {
    /// Derives a fresh pseudonym for `key`, bound to the commitment to type
    /// of the issue being signed.
    pub fn new<R: RngCore + CryptoRng>(
        key: IssuerKeyPair,
        token_type: &str,
        commitment_to_type: TypeCommitment,
        pp: &PublicParams,
        rng: &mut R,
    ) -> Result<Self> {
        let policy = &pp.issuing_policy;
        let index = policy.issuers[..policy.issuers_number.min(policy.issuers.len())]
            .iter()
            .position(|pk| *pk == key.pk)
            .ok_or_else(|| ZkatError::Identity("issuer key is not part of the issuing policy".into()))?;

        let nym_randomness = math::rand_zr(rng);
        let g = &pp.pedersen_generators;
        if g.len() != 3 {
            return Err(ZkatError::InvalidParameters("invalid pedersen generators".into()));
        }
        let nym = g[0] * key.sk + g[2] * nym_randomness;
        Ok(Self {
            verifier: Verifier::new(nym, commitment_to_type.commitment, pp)?,
            key,
            index,
            nym_randomness,
            token_type: type_to_zr(token_type),
            type_blinding_factor: commitment_to_type.blinding_factor,
        })
    }

    pub fn nym(&self) -> G1 {
        self.verifier.nym
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Signs `message` with an explicit RNG
    pub fn sign_with<R: RngCore + CryptoRng>(&self, message: &[u8], rng: &mut R) -> Result<Vec<u8>> {
        let authorization_correctness =
            o2omp::Prover::new(self.verifier.o2omp_verifier(message), self.index, self.nym_randomness)
                .prove(&mut *rng)
                .context(|| "failed to prove issuer authorization")?;

        let v = &self.verifier;
        let [g0, g2] = v.pedersen_params;
        let randomness = math::rand_zr_vec(&mut *rng, 4);
        let coms = [
            g0 * randomness[0] + g2 * randomness[1],
            g0 * randomness[2] + g2 * randomness[3],
        ];
        let challenge = type_correctness_challenge(&v.pedersen_params, &v.nym, &v.commitment_to_type, &coms, message);
        let responses = SchnorrProver::new(
            vec![self.key.sk, self.nym_randomness, self.token_type, self.type_blinding_factor],
            randomness,
            challenge,
        )
        .prove()?;

        Signature {
            authorization_correctness,
            type_correctness: TypeCorrectness {
                challenge,
                nym: responses[..2].to_vec(),
                commitment_to_type: responses[2..].to_vec(),
            },
        }
        .serialize()
    }
}

impl identity::Signer for Signer {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.sign_with(message, &mut rand::rngs::OsRng)
    }
}

impl identity::SigningIdentity for Signer {
    fn serialize(&self) -> Result<Identity> {
        Ok(nym_identity(&self.verifier.nym))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupConfig;
    use crate::identity::{Signer as _, SigningIdentity as _, Verifier as _};
    use crate::setup::setup;
    use rand::rngs::OsRng;

    fn authorized(n: usize) -> (PublicParams, Vec<IssuerKeyPair>) {
        let pp = setup(&SetupConfig::bulletproof(8), &mut OsRng).unwrap();
        let keys: Vec<IssuerKeyPair> = (0..n).map(|_| IssuerKeyPair::new(&pp, &mut OsRng).unwrap()).collect();
        let pp = pp
            .with_issuing_policy(keys.iter().map(|k| k.pk).collect(), &mut OsRng)
            .unwrap();
        (pp, keys)
    }

    #[test]
    fn test_sign_verify() {
        let (pp, keys) = authorized(3);
        let ct = TypeCommitment::new("ABC", &pp.pedersen_generators, &mut OsRng).unwrap();
        let signer = Signer::new(keys[2].clone(), "ABC", ct, &pp, &mut OsRng).unwrap();
        let sig = signer.sign(b"issue").unwrap();

        let id = signer.serialize().unwrap();
        let verifier = Verifier::new(nym_from_identity(&id).unwrap(), ct.commitment, &pp).unwrap();
        verifier.verify(b"issue", &sig).unwrap();
        assert!(verifier.verify(b"another issue", &sig).is_err());
    }

    #[test]
    fn test_wrong_commitment_to_type() {
        let (pp, keys) = authorized(2);
        let ct = TypeCommitment::new("ABC", &pp.pedersen_generators, &mut OsRng).unwrap();
        let signer = Signer::new(keys[0].clone(), "ABC", ct, &pp, &mut OsRng).unwrap();
        let sig = signer.sign(b"issue").unwrap();

        let other = TypeCommitment::new("ABC", &pp.pedersen_generators, &mut OsRng).unwrap();
        let verifier = Verifier::new(signer.nym(), other.commitment, &pp).unwrap();
        let err = verifier.verify(b"issue", &sig).unwrap_err();
        assert_eq!(err.to_string(), "invalid type correctness proof");
    }

    #[test]
    fn test_unauthorized_issuer() {
        let (pp, _) = authorized(2);
        let outsider = IssuerKeyPair::new(&pp, &mut OsRng).unwrap();
        let ct = TypeCommitment::new("ABC", &pp.pedersen_generators, &mut OsRng).unwrap();
        assert!(Signer::new(outsider, "ABC", ct, &pp, &mut OsRng).is_err());
    }
}
