//! Transfer actions and their proofs
//!
//! A transfer spends input tokens and creates outputs of the same type and
//! total value. Which conservation proof is used follows the range engine:
//! the membership engine pairs with [`WellFormedness`], the bulletproof
//! engine with [`TypeAndSumProof`], whose commitment to type also anchors
//! the range proof over the outputs.
//!
//! Ownership transfers, with exactly one input and one output, carry no
//! range proof: the output value equals the input value, which was range
//! checked when it was created.

pub mod sender;
pub mod typeandsum;
pub mod wellformedness;

use std::collections::BTreeMap;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::RangeEngine;
use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::Identity;
use crate::math::{Zero, G1};
use crate::range::{RangeCorrectness, RangeCorrectnessProver, RangeCorrectnessVerifier, TypeCommitment};
use crate::setup::PublicParams;
use crate::token::{Token, TokenDataWitness, TokenID};

pub use sender::Sender;
pub use typeandsum::{TypeAndSumProof, TypeAndSumProver, TypeAndSumVerifier, TypeAndSumWitness};
pub use wellformedness::{WellFormedness, WellFormednessProver, WellFormednessVerifier, WellFormednessWitness};

/// Conservation proof of either construction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "proof", rename_all = "snake_case")]
pub enum TransferWellFormedness {
    WellFormedness(WellFormedness),
    TypeAndSum(TypeAndSumProof),
}

/// Proof of validity of a [`TransferAction`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub well_formedness: TransferWellFormedness,
    /// Absent for ownership transfers
    #[serde(default)]
    pub range_correctness: Option<RangeCorrectness>,
}

impl Proof {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "invalid transfer proof")
    }
}

fn is_ownership_transfer(inputs: usize, outputs: usize) -> bool {
    inputs == 1 && outputs == 1
}

/// Checks transfer proofs against input and output commitments
pub struct Verifier<'a> {
    pub inputs: Vec<G1>,
    pub outputs: Vec<G1>,
    pp: &'a PublicParams,
}

impl<'a> Verifier<'a> {
    pub fn new(inputs: Vec<G1>, outputs: Vec<G1>, pp: &'a PublicParams) -> Self {
        Self { inputs, outputs, pp }
    }

    pub fn verify(&self, raw: &[u8]) -> Result<()> {
        let proof = Proof::deserialize(raw)?;
        self.verify_proof(&proof)
    }

    pub fn verify_proof(&self, proof: &Proof) -> Result<()> {
        let pg = self.pp.pedersen_generators.clone();
        let commitment_to_type = match (&proof.well_formedness, self.pp.range_engine()) {
            (TransferWellFormedness::WellFormedness(wf), RangeEngine::Membership) => {
                WellFormednessVerifier::new(pg, self.inputs.clone(), self.outputs.clone())
                    .verify(wf)
                    .context(|| "invalid transfer proof")?;
                G1::zero()
            }
            (TransferWellFormedness::TypeAndSum(ts), RangeEngine::Bulletproof) => {
                TypeAndSumVerifier::new(pg, self.inputs.clone(), self.outputs.clone())
                    .verify(ts)
                    .context(|| "invalid transfer proof")?;
                ts.commitment_to_type
            }
            _ => {
                return Err(ZkatError::InvalidProof(
                    "invalid transfer proof: proof does not match the configured engine".into(),
                ))
            }
        };

        if is_ownership_transfer(self.inputs.len(), self.outputs.len()) {
            return Ok(());
        }
        let rc = proof
            .range_correctness
            .as_ref()
            .ok_or_else(|| ZkatError::InvalidProof("invalid transfer proof".into()))?;
        RangeCorrectnessVerifier::new(self.outputs.clone(), commitment_to_type, self.pp)
            .verify(rc)
            .context(|| "invalid transfer proof")
    }
}

/// Produces transfer proofs
pub struct Prover<'a> {
    pub verifier: Verifier<'a>,
    input_witness: &'a [TokenDataWitness],
    output_witness: &'a [TokenDataWitness],
}

impl<'a> Prover<'a> {
    pub fn new(
        input_witness: &'a [TokenDataWitness],
        output_witness: &'a [TokenDataWitness],
        inputs: Vec<G1>,
        outputs: Vec<G1>,
        pp: &'a PublicParams,
    ) -> Result<Self> {
        if input_witness.is_empty() || input_witness.len() != inputs.len() || output_witness.len() != outputs.len() {
            return Err(ZkatError::InvalidInput("invalid token witness".into()));
        }
        let token_type = &input_witness[0].token_type;
        if input_witness
            .iter()
            .chain(output_witness)
            .any(|w| &w.token_type != token_type)
        {
            return Err(ZkatError::InvalidInput(
                "cannot generate transfer: please choose inputs of the same token type".into(),
            ));
        }
        Ok(Self {
            verifier: Verifier::new(inputs, outputs, pp),
            input_witness,
            output_witness,
        })
    }

    pub fn prove<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Vec<u8>> {
        let v = &self.verifier;
        let pg = &v.pp.pedersen_generators;
        let commitment_to_type = TypeCommitment::new(&self.input_witness[0].token_type, pg, &mut *rng)?;

        let well_formedness = match v.pp.range_engine() {
            RangeEngine::Membership => {
                let witness = WellFormednessWitness::new(self.input_witness, self.output_witness)?;
                let prover = WellFormednessProver::new(
                    WellFormednessVerifier::new(pg.clone(), v.inputs.clone(), v.outputs.clone()),
                    witness,
                );
                TransferWellFormedness::WellFormedness(
                    prover.prove(&mut *rng).context(|| "failed to generate transfer proof")?,
                )
            }
            RangeEngine::Bulletproof => {
                let witness = TypeAndSumWitness::new(self.input_witness, self.output_witness, &commitment_to_type)?;
                let prover = TypeAndSumProver::new(
                    TypeAndSumVerifier::new(pg.clone(), v.inputs.clone(), v.outputs.clone()),
                    witness,
                    commitment_to_type.commitment,
                );
                TransferWellFormedness::TypeAndSum(
                    prover.prove(&mut *rng).context(|| "failed to generate transfer proof")?,
                )
            }
        };

        let range_correctness = if is_ownership_transfer(v.inputs.len(), v.outputs.len()) {
            None
        } else {
            Some(
                RangeCorrectnessProver::new(self.output_witness, v.outputs.clone(), commitment_to_type, v.pp)
                    .prove(&mut *rng)
                    .context(|| "failed to generate range proof for transfer")?,
            )
        };

        Proof {
            well_formedness,
            range_correctness,
        }
        .serialize()
    }
}

/// Transfer of ownership of one or more tokens
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferAction {
    /// Ledger references of the spent tokens
    pub inputs: Vec<TokenID>,
    /// Spent tokens, as they appear on the ledger
    pub input_tokens: Vec<Token>,
    pub output_tokens: Vec<Token>,
    #[serde(with = "hex")]
    pub proof: Vec<u8>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<u8>>,
}

impl TransferAction {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal transfer action")
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.output_tokens.len()
    }

    pub fn is_redeem_at(&self, index: usize) -> bool {
        self.output_tokens.get(index).map(Token::is_redeem).unwrap_or(false)
    }

    pub fn get_input_commitments(&self) -> Vec<G1> {
        self.input_tokens.iter().map(|t| t.data).collect()
    }

    pub fn get_output_commitments(&self) -> Vec<G1> {
        self.output_tokens.iter().map(|t| t.data).collect()
    }

    /// Owners of the spent tokens, in input order
    pub fn input_owners(&self) -> Vec<Identity> {
        self.input_tokens.iter().map(|t| Identity::new(t.owner.clone())).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(ZkatError::InvalidInput("invalid number of token inputs, expected at least 1".into()));
        }
        if self.inputs.len() != self.input_tokens.len() {
            return Err(ZkatError::InvalidInput(format!(
                "number of inputs [{}] does not match number of input tokens [{}]",
                self.inputs.len(),
                self.input_tokens.len()
            )));
        }
        if self.output_tokens.is_empty() {
            return Err(ZkatError::InvalidInput("invalid number of token outputs, expected at least 1".into()));
        }
        Ok(())
    }
}

/// Assembles a transfer action from its parts
pub fn new_transfer(
    inputs: Vec<TokenID>,
    input_tokens: Vec<Token>,
    outputs: Vec<G1>,
    owners: Vec<Vec<u8>>,
    proof: Vec<u8>,
) -> Result<TransferAction> {
    if outputs.len() != owners.len() {
        return Err(ZkatError::InvalidInput(format!(
            "number of recipients [{}] does not match number of outputs [{}]",
            owners.len(),
            outputs.len()
        )));
    }
    if inputs.len() != input_tokens.len() {
        return Err(ZkatError::InvalidInput(format!(
            "number of inputs [{}] does not match number of input tokens [{}]",
            inputs.len(),
            input_tokens.len()
        )));
    }
    Ok(TransferAction {
        inputs,
        input_tokens,
        output_tokens: owners
            .into_iter()
            .zip(outputs)
            .map(|(owner, data)| Token::new(owner, data))
            .collect(),
        proof,
        metadata: BTreeMap::new(),
    })
}
