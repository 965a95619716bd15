//! Blind PS signatures
//!
//! The recipient commits to its messages, encrypts `R^m_i` under a one-time
//! ElGamal key (with `R = H(commitment)`) and proves that ciphertexts and
//! commitment open to the same messages. The signer checks the proof and
//! answers with an encryption of `S`, which only the recipient can open.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::elgamal::{Ciphertext, PublicKey, SecretKey};
use super::{SignVerifier, Signature, Signer};
use crate::common::Transcript;
use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, Zero, G1, Zr};

/// Proof that ciphertexts and commitment hide the same messages
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncProof {
    #[serde(with = "encoding::canonical_vec")]
    pub messages: Vec<Zr>,
    #[serde(with = "encoding::canonical_vec")]
    pub enc_randomness: Vec<Zr>,
    #[serde(with = "encoding::canonical")]
    pub com_blinding_factor: Zr,
    #[serde(with = "encoding::canonical")]
    pub challenge: Zr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlindSignRequest {
    #[serde(with = "encoding::canonical")]
    pub commitment: G1,
    pub ciphertexts: Vec<Ciphertext>,
    /// Serialized [`EncProof`]
    #[serde(with = "hex")]
    pub proof: Vec<u8>,
    pub enc_pk: PublicKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlindSignResponse {
    #[serde(with = "encoding::canonical")]
    pub hash: Zr,
    pub ciphertext: Ciphertext,
}

struct EncProofCommitments {
    c1: Vec<G1>,
    c2: Vec<G1>,
    commitment: G1,
}

/// Public side of the encryption proof
#[derive(Clone, Debug)]
pub struct EncVerifier {
    /// `g_0 … g_{n-1}` for the messages, followed by the blinding base
    pub pedersen_params: Vec<G1>,
    pub commitment: G1,
    pub ciphertexts: Vec<Ciphertext>,
    pub enc_pk: PublicKey,
}

impl EncVerifier {
    fn challenge(&self, coms: &EncProofCommitments) -> Zr {
        let mut t = Transcript::new();
        t.append_all(&self.pedersen_params)
            .append(&self.enc_pk.gen)
            .append(&self.enc_pk.h);
        for ct in &self.ciphertexts {
            t.append(&ct.c1).append(&ct.c2);
        }
        t.append(&self.commitment)
            .append_all(&coms.c1)
            .append_all(&coms.c2)
            .append(&coms.commitment);
        t.challenge()
    }

    pub fn verify(&self, raw: &[u8]) -> Result<()> {
        if self.pedersen_params.is_empty() {
            return Err(ZkatError::InvalidInput(
                "failed to verify encryption proof: missing Pedersen parameters".into(),
            ));
        }
        let n = self.pedersen_params.len() - 1;
        if self.ciphertexts.len() != n {
            return Err(ZkatError::InvalidInput(format!(
                "failed to verify encryption proof: number of ciphertexts is different from [{}]",
                n
            )));
        }
        let p: EncProof = serde_json::from_slice(raw)
            .map_err(|_| ZkatError::Serialization("failed to unmarshal encryption proof".into()))?;
        if p.messages.len() != n || p.enc_randomness.len() != n {
            return Err(ZkatError::InvalidInput(format!(
                "failed to verify encryption proof: number of proofs is different from [{}]",
                n
            )));
        }

        let hash = math::hash_to_g1(&math::to_bytes(&self.commitment));
        let mut commitment =
            self.pedersen_params[n] * p.com_blinding_factor - self.commitment * p.challenge;
        for i in 0..n {
            commitment += self.pedersen_params[i] * p.messages[i];
        }
        let mut c1 = Vec::with_capacity(n);
        let mut c2 = Vec::with_capacity(n);
        for (i, ct) in self.ciphertexts.iter().enumerate() {
            c1.push(self.enc_pk.gen * p.enc_randomness[i] - ct.c1 * p.challenge);
            c2.push(
                self.enc_pk.h * p.enc_randomness[i] + hash * p.messages[i] - ct.c2 * p.challenge,
            );
        }

        let chal = self.challenge(&EncProofCommitments { c1, c2, commitment });
        if !math::zr_ct_eq(&chal, &p.challenge) {
            return Err(ZkatError::InvalidProof(
                "verification of encryption correctness failed".into(),
            ));
        }
        Ok(())
    }
}

/// Party requesting a blind signature on its messages
pub struct Recipient {
    enc: EncVerifier,
    verifier: SignVerifier,
    enc_sk: SecretKey,
    messages: Vec<Zr>,
    com_blinding_factor: Zr,
    enc_randomness: Vec<Zr>,
}

impl Recipient {
    pub fn new(
        messages: Vec<Zr>,
        com_blinding_factor: Zr,
        commitment: G1,
        enc_sk: SecretKey,
        pedersen_params: Vec<G1>,
        verifier: SignVerifier,
    ) -> Self {
        Self {
            enc: EncVerifier {
                pedersen_params,
                commitment,
                ciphertexts: vec![],
                enc_pk: enc_sk.public_key.clone(),
            },
            verifier,
            enc_sk,
            messages,
            com_blinding_factor,
            enc_randomness: vec![],
        }
    }

    /// Encrypts the messages and proves the encryption is consistent with
    /// the commitment.
    pub fn generate_blind_sign_request<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<BlindSignRequest> {
        let hash = math::hash_to_g1(&math::to_bytes(&self.enc.commitment));
        let (ciphertexts, randomness): (Vec<_>, Vec<_>) = self
            .messages
            .iter()
            .map(|m| self.enc_sk.public_key.encrypt(&(hash * m), &mut *rng))
            .unzip();
        self.enc.ciphertexts = ciphertexts;
        self.enc_randomness = randomness;

        let proof = self
            .prove(rng)
            .context(|| "failed to generate blind signature request")?;
        Ok(BlindSignRequest {
            commitment: self.enc.commitment,
            ciphertexts: self.enc.ciphertexts.clone(),
            proof,
            enc_pk: self.enc_sk.public_key.clone(),
        })
    }

    fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Vec<u8>> {
        let n = self.messages.len();
        if n != self.enc_randomness.len()
            || n + 1 != self.enc.pedersen_params.len()
            || n != self.enc.ciphertexts.len()
        {
            return Err(ZkatError::InvalidInput(
                "cannot generate encryption proof".into(),
            ));
        }
        let hash = math::hash_to_g1(&math::to_bytes(&self.enc.commitment));

        // 1. Randomness
        let r_bf = math::rand_zr(rng);
        let r_m = math::rand_zr_vec(rng, n);
        let r_enc = math::rand_zr_vec(rng, n);

        // 2. Commitments
        let pk = &self.enc_sk.public_key;
        let c1 = r_enc.iter().map(|r| pk.gen * r).collect();
        let c2 = (0..n).map(|i| hash * r_m[i] + pk.h * r_enc[i]).collect();
        let mut commitment = self.enc.pedersen_params[n] * r_bf;
        for i in 0..n {
            commitment += self.enc.pedersen_params[i] * r_m[i];
        }

        // 3. Challenge and responses
        let c = self.enc.challenge(&EncProofCommitments { c1, c2, commitment });
        let proof = EncProof {
            messages: (0..n).map(|i| r_m[i] + c * self.messages[i]).collect(),
            enc_randomness: (0..n).map(|i| r_enc[i] + c * self.enc_randomness[i]).collect(),
            com_blinding_factor: r_bf + c * self.com_blinding_factor,
            challenge: c,
        };
        Ok(serde_json::to_vec(&proof)?)
    }

    /// Decrypts the blind signature and checks it against the messages.
    pub fn verify_response(&self, response: &BlindSignResponse) -> Result<Signature> {
        let sig = Signature {
            r: math::hash_to_g1(&math::to_bytes(&self.enc.commitment)),
            s: self.enc_sk.decrypt(&response.ciphertext),
        };
        self.verifier
            .verify_with_hash(&self.messages, &response.hash, &sig)?;
        Ok(sig)
    }
}

/// PS signer answering blind signature requests
pub struct BlindSigner {
    signer: Signer,
    pedersen_params: Vec<G1>,
}

impl BlindSigner {
    pub fn new(signer: Signer, pedersen_params: Vec<G1>) -> Self {
        Self {
            signer,
            pedersen_params,
        }
    }

    pub fn blind_sign(&self, request: &BlindSignRequest) -> Result<BlindSignResponse> {
        let sk = &self.signer.sk;
        let n = sk.len() - 2;
        if request.ciphertexts.len() != n {
            return Err(ZkatError::InvalidInput(format!(
                "number of ciphertexts in blind signature request does not match number of public keys: expect [{}], got [{}]",
                n,
                request.ciphertexts.len()
            )));
        }
        EncVerifier {
            pedersen_params: self.pedersen_params.clone(),
            commitment: request.commitment,
            ciphertexts: request.ciphertexts.clone(),
            enc_pk: request.enc_pk.clone(),
        }
        .verify(&request.proof)?;

        let hash = math::hash_to_zr(&request.proof);
        let r = math::hash_to_g1(&math::to_bytes(&request.commitment));
        let mut c1 = G1::zero();
        let mut c2 = r * sk[0];
        for (i, ct) in request.ciphertexts.iter().enumerate() {
            c1 += ct.c1 * sk[i + 1];
            c2 += ct.c2 * sk[i + 1];
        }
        c2 += r * (hash * sk[n + 1]);

        Ok(BlindSignResponse {
            hash,
            ciphertext: Ciphertext { c1, c2 },
        })
    }
}
