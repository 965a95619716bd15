//! Issue actions and their proofs
//!
//! An issue creates new tokens of a single type. The proof shows that the
//! outputs are well formed and that their values are in range; the action
//! is then signed by the issuer, either a known identity or an anonymous
//! issuer hiding behind a pseudonym (see [`anonym`]).

pub mod anonym;
pub mod wellformedness;

use std::collections::BTreeMap;

use log::debug;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::{Identity, Signer, SigningIdentity};
use crate::math::G1;
use crate::range::{RangeCorrectness, RangeCorrectnessProver, RangeCorrectnessVerifier, TypeCommitment};
use crate::setup::PublicParams;
use crate::token::{get_tokens_with_witness, Metadata, Token, TokenDataWitness};

pub use wellformedness::{WellFormedness, WellFormednessProver, WellFormednessVerifier};

/// Proof of validity of an [`IssueAction`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub well_formedness: WellFormedness,
    pub range_correctness: RangeCorrectness,
}

impl Proof {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal issue proof")
    }
}

/// Checks issue proofs against the issued tokens
pub struct Verifier<'a> {
    well_formedness: WellFormednessVerifier,
    pp: &'a PublicParams,
}

impl<'a> Verifier<'a> {
    pub fn new(tokens: Vec<G1>, anonymous: bool, pp: &'a PublicParams) -> Self {
        Self {
            well_formedness: WellFormednessVerifier::new(pp.pedersen_generators.clone(), tokens, anonymous),
            pp,
        }
    }

    pub fn verify(&self, raw: &[u8]) -> Result<()> {
        let proof = Proof::deserialize(raw)?;
        self.verify_proof(&proof)
    }

    pub fn verify_proof(&self, proof: &Proof) -> Result<()> {
        self.well_formedness
            .verify(&proof.well_formedness)
            .context(|| "invalid issue proof")?;
        RangeCorrectnessVerifier::new(
            self.well_formedness.tokens.clone(),
            proof.well_formedness.commitment_to_type,
            self.pp,
        )
        .verify(&proof.range_correctness)
        .context(|| "invalid issue proof")
    }
}

/// Produces issue proofs
pub struct Prover<'a> {
    pub verifier: Verifier<'a>,
    witness: &'a [TokenDataWitness],
    commitment_to_type: TypeCommitment,
}

impl<'a> Prover<'a> {
    pub fn new(
        witness: &'a [TokenDataWitness],
        tokens: Vec<G1>,
        anonymous: bool,
        commitment_to_type: TypeCommitment,
        pp: &'a PublicParams,
    ) -> Result<Self> {
        if witness.is_empty() || witness.len() != tokens.len() {
            return Err(ZkatError::InvalidInput(format!(
                "cannot create issue prover: [{}] tokens, [{}] witnesses",
                tokens.len(),
                witness.len()
            )));
        }
        Ok(Self {
            verifier: Verifier::new(tokens, anonymous, pp),
            witness,
            commitment_to_type,
        })
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Vec<u8>> {
        let v = &self.verifier;
        let well_formedness =
            WellFormednessProver::new(v.well_formedness.clone(), self.witness, self.commitment_to_type)
                .prove(&mut *rng)
                .context(|| "failed to generate issue proof")?;
        let range_correctness = RangeCorrectnessProver::new(
            self.witness,
            v.well_formedness.tokens.clone(),
            self.commitment_to_type,
            v.pp,
        )
        .prove(&mut *rng)
        .context(|| "failed to generate range proof for issue")?;

        Proof {
            well_formedness,
            range_correctness,
        }
        .serialize()
    }
}

/// Issue of one or more tokens
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssueAction {
    pub issuer: Identity,
    pub outputs: Vec<Token>,
    #[serde(with = "hex")]
    pub proof: Vec<u8>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<u8>>,
}

impl IssueAction {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal issue action")
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Commitments carried by the outputs
    pub fn get_commitments(&self) -> Vec<G1> {
        self.outputs.iter().map(|t| t.data).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.issuer.is_none() {
            return Err(ZkatError::InvalidInput("issuer is not set".into()));
        }
        if self.outputs.is_empty() {
            return Err(ZkatError::InvalidInput("no outputs in issue action".into()));
        }
        if self.outputs.iter().any(|o| o.is_redeem()) {
            return Err(ZkatError::InvalidInput("issued tokens must have an owner".into()));
        }
        Ok(())
    }
}

/// Assembles an issue action from its parts
pub fn new_issue(
    issuer: Identity,
    commitments: Vec<G1>,
    owners: Vec<Vec<u8>>,
    proof: Vec<u8>,
    anonymous: bool,
) -> Result<IssueAction> {
    if owners.len() != commitments.len() {
        return Err(ZkatError::InvalidInput(
            "number of owners does not match number of tokens".into(),
        ));
    }
    Ok(IssueAction {
        issuer,
        outputs: owners
            .into_iter()
            .zip(commitments)
            .map(|(owner, data)| Token::new(owner, data))
            .collect(),
        proof,
        anonymous,
        metadata: BTreeMap::new(),
    })
}

/// Issues tokens of a single type
pub struct Issuer<'a> {
    token_type: String,
    signer: &'a dyn SigningIdentity,
    pp: &'a PublicParams,
}

impl<'a> Issuer<'a> {
    pub fn new(token_type: impl Into<String>, signer: &'a dyn SigningIdentity, pp: &'a PublicParams) -> Self {
        Self {
            token_type: token_type.into(),
            signer,
            pp,
        }
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Issue of `values` to `owners` with the type disclosed, plus the
    /// metadata each recipient needs to open its token
    pub fn generate_zk_issue<R: RngCore + CryptoRng>(
        &self,
        values: &[u64],
        owners: Vec<Vec<u8>>,
        rng: &mut R,
    ) -> Result<(IssueAction, Vec<Metadata>)> {
        let commitment_to_type = TypeCommitment::new(&self.token_type, &self.pp.pedersen_generators, &mut *rng)?;
        self.generate(values, owners, false, commitment_to_type, rng)
    }

    /// Issue with the type hidden; `commitment_to_type` must be the one the
    /// anonymous signer was created with
    pub fn generate_anonymous_zk_issue<R: RngCore + CryptoRng>(
        &self,
        values: &[u64],
        owners: Vec<Vec<u8>>,
        commitment_to_type: TypeCommitment,
        rng: &mut R,
    ) -> Result<(IssueAction, Vec<Metadata>)> {
        self.generate(values, owners, true, commitment_to_type, rng)
    }

    fn generate<R: RngCore + CryptoRng>(
        &self,
        values: &[u64],
        owners: Vec<Vec<u8>>,
        anonymous: bool,
        commitment_to_type: TypeCommitment,
        rng: &mut R,
    ) -> Result<(IssueAction, Vec<Metadata>)> {
        if owners.iter().any(|o| o.is_empty()) {
            return Err(ZkatError::InvalidInput("all recipients should be defined".into()));
        }
        let (tokens, witness) =
            get_tokens_with_witness(values, &self.token_type, &self.pp.pedersen_generators, &mut *rng)
                .context(|| "failed to generate tokens")?;
        let proof = Prover::new(&witness, tokens.clone(), anonymous, commitment_to_type, self.pp)?.prove(rng)?;

        let issuer = self.signer.serialize()?;
        let metadata = witness
            .iter()
            .zip(&owners)
            .map(|(w, owner)| w.to_metadata(owner.clone(), issuer.as_bytes().to_vec()))
            .collect();
        let action = new_issue(issuer, tokens, owners, proof, anonymous)?;
        debug!(
            "generated issue of [{}] tokens of type [{}], anonymous [{}]",
            action.num_outputs(),
            self.token_type,
            anonymous
        );
        Ok((action, metadata))
    }

    /// Signature over `raw ∥ tx_id`
    pub fn sign_token_actions(&self, raw: &[u8], tx_id: &str) -> Result<Vec<u8>> {
        self.signer
            .sign(&[raw, tx_id.as_bytes()].concat())
            .context(|| "failed to sign issue")
    }
}
