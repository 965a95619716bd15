//! Token requests and the metadata that travels with them
//!
//! A [`TokenRequest`] is what reaches the ledger: serialized issue and
//! transfer actions plus the signatures over them. The matching
//! [`TokenRequestMetadata`] stays off-ledger and carries the openings the
//! auditor and the recipients need.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::Identity;
use crate::issue::IssueAction;
use crate::math::encoding;
use crate::token::TokenID;
use crate::transfer::TransferAction;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Serialized [`IssueAction`]s
    #[serde(with = "encoding::hex_vec", default)]
    pub issues: Vec<Vec<u8>>,
    /// Serialized [`TransferAction`]s
    #[serde(with = "encoding::hex_vec", default)]
    pub transfers: Vec<Vec<u8>>,
    /// Issuer signatures, then one signature per spent input, in action order
    #[serde(with = "encoding::hex_vec", default)]
    pub signatures: Vec<Vec<u8>>,
    #[serde(with = "encoding::hex_vec", default)]
    pub auditor_signatures: Vec<Vec<u8>>,
}

impl TokenRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, action: &IssueAction) -> Result<()> {
        self.issues.push(action.serialize().context(|| "failed to append issue action")?);
        Ok(())
    }

    pub fn add_transfer(&mut self, action: &TransferAction) -> Result<()> {
        self.transfers
            .push(action.serialize().context(|| "failed to append transfer action")?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.transfers.is_empty()
    }

    /// Bytes every signer signs, followed by the transaction binding
    pub fn marshal_to_message(&self) -> Result<Vec<u8>> {
        Self {
            issues: self.issues.clone(),
            transfers: self.transfers.clone(),
            ..Self::default()
        }
        .serialize()
        .context(|| "failed to marshal token request for signature")
    }

    /// `marshal_to_message() ∥ binding`
    pub fn message_to_sign(&self, binding: &str) -> Result<Vec<u8>> {
        let mut message = self.marshal_to_message()?;
        message.extend_from_slice(binding.as_bytes());
        Ok(message)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal token request")
    }
}

/// Off-ledger information about one issue action
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub issuer: Identity,
    /// Serialized output tokens
    #[serde(with = "encoding::hex_vec", default)]
    pub outputs: Vec<Vec<u8>>,
    /// Serialized [`crate::token::Metadata`], one per output
    #[serde(with = "encoding::hex_vec", default)]
    pub outputs_metadata: Vec<Vec<u8>>,
    #[serde(default)]
    pub receivers: Vec<Identity>,
    #[serde(with = "encoding::hex_vec", default)]
    pub receivers_audit_infos: Vec<Vec<u8>>,
}

/// Off-ledger information about one transfer action
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    #[serde(default)]
    pub token_ids: Vec<TokenID>,
    #[serde(default)]
    pub senders: Vec<Identity>,
    #[serde(with = "encoding::hex_vec", default)]
    pub sender_audit_infos: Vec<Vec<u8>>,
    #[serde(with = "encoding::hex_vec", default)]
    pub outputs: Vec<Vec<u8>>,
    #[serde(with = "encoding::hex_vec", default)]
    pub outputs_metadata: Vec<Vec<u8>>,
    /// Audit information of each output owner
    #[serde(with = "encoding::hex_vec", default)]
    pub output_audit_infos: Vec<Vec<u8>>,
    #[serde(default)]
    pub receivers: Vec<Identity>,
    #[serde(with = "encoding::hex_vec", default)]
    pub receiver_audit_infos: Vec<Vec<u8>>,
    #[serde(default)]
    pub receiver_is_sender: Vec<bool>,
}

impl TransferMetadata {
    pub fn token_id_at(&self, index: usize) -> Option<&TokenID> {
        self.token_ids.get(index)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequestMetadata {
    #[serde(default)]
    pub issues: Vec<IssueMetadata>,
    #[serde(default)]
    pub transfers: Vec<TransferMetadata>,
    #[serde(default)]
    pub application: BTreeMap<String, Vec<u8>>,
}

impl TokenRequestMetadata {
    /// Serialized opening of the output whose serialization is `token_raw`
    pub fn get_token_info(&self, token_raw: &[u8]) -> Option<&[u8]> {
        let issued = self
            .issues
            .iter()
            .flat_map(|md| md.outputs.iter().zip(&md.outputs_metadata));
        let transferred = self
            .transfers
            .iter()
            .flat_map(|md| md.outputs.iter().zip(&md.outputs_metadata));
        issued
            .chain(transferred)
            .find(|(out, _)| out.as_slice() == token_raw)
            .map(|(_, info)| info.as_slice())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal token request metadata")
    }
}
