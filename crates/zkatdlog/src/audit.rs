//! Auditing of token requests
//!
//! Before endorsing a request the auditor opens every output with the
//! metadata the parties disclosed to it, and matches every owner against
//! its audit information. A request that fails [`Auditor::check`] must not
//! be endorsed.

use log::debug;
use sha2::{Digest, Sha256};

use crate::common::compute_pedersen_commitment;
use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::htlc::{Script, ScriptInfo};
use crate::identity::{AuditInfoDeserializer, Signer, TypedIdentity, HTLC_SCRIPT, IDEMIX_IDENTITY, X509_IDENTITY};
use crate::issue::IssueAction;
use crate::math::{G1, Zr};
use crate::request::{IssueMetadata, TokenRequest, TokenRequestMetadata, TransferMetadata};
use crate::token::{type_to_zr, Metadata, Token};
use crate::transfer::TransferAction;

/// Opening of a token commitment as disclosed to the auditor
#[derive(Clone, Debug, PartialEq)]
pub struct TokenDataOpening {
    pub token_type: String,
    pub value: Zr,
    pub blinding_factor: Zr,
}

impl From<Metadata> for TokenDataOpening {
    fn from(meta: Metadata) -> Self {
        Self {
            token_type: meta.token_type,
            value: meta.value,
            blinding_factor: meta.blinding_factor,
        }
    }
}

/// Information identifying the owner of a token
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnerOpening {
    pub owner_info: Vec<u8>,
}

/// A token together with what the auditor needs to learn its content.
///
/// Inputs of transfers carry no data opening: they were audited when
/// created, only their owners are checked again.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditableToken {
    pub token: Token,
    pub data: Option<TokenDataOpening>,
    pub owner: OwnerOpening,
}

impl AuditableToken {
    pub fn new(token: Token, owner_info: Vec<u8>, data: Option<TokenDataOpening>) -> Self {
        Self {
            token,
            data,
            owner: OwnerOpening { owner_info },
        }
    }
}

/// Inspects requests and signs the ones that check out
pub struct Auditor<'a> {
    pub des: &'a dyn AuditInfoDeserializer,
    pub signer: &'a dyn Signer,
    /// `(G0, G1, G2)` the token commitments are computed with
    pub pedersen_params: Vec<G1>,
}

impl<'a> Auditor<'a> {
    pub fn new(des: &'a dyn AuditInfoDeserializer, signer: &'a dyn Signer, pedersen_params: Vec<G1>) -> Self {
        Self {
            des,
            signer,
            pedersen_params,
        }
    }

    /// Signature over `marshal_to_message() ∥ tx_id`
    pub fn endorse(&self, request: &TokenRequest, tx_id: &str) -> Result<Vec<u8>> {
        let message = request
            .message_to_sign(tx_id)
            .context(|| format!("audit of tx [{}] failed", tx_id))?;
        debug!("endorse [{}][{}]", hex::encode(Sha256::digest(&message)), tx_id);
        self.signer
            .sign(&message)
            .context(|| format!("audit of tx [{}] failed", tx_id))
    }

    /// Checks `request` against the disclosed `metadata`. `input_tokens`
    /// holds the ledger tokens spent by each transfer, in order.
    pub fn check(
        &self,
        request: &TokenRequest,
        metadata: &TokenRequestMetadata,
        input_tokens: &[Vec<Token>],
        tx_id: &str,
    ) -> Result<()> {
        debug!("audit of tx [{}]: checking issues", tx_id);
        let issued = get_audit_info_for_issues(&request.issues, &metadata.issues)
            .context(|| format!("failed getting audit info for issues for [{}]", tx_id))?;
        self.check_issue_requests(&issued, tx_id)
            .context(|| format!("failed checking issues for [{}]", tx_id))?;

        debug!("audit of tx [{}]: checking transfers", tx_id);
        let (inputs, transferred) = get_audit_info_for_transfers(&request.transfers, &metadata.transfers, input_tokens)
            .context(|| format!("failed getting audit info for transfers for [{}]", tx_id))?;
        self.check_transfer_requests(&inputs, &transferred, tx_id)
            .context(|| format!("failed checking transfers [{}]", tx_id))
    }

    pub fn check_issue_requests(&self, outputs: &[Vec<AuditableToken>], tx_id: &str) -> Result<()> {
        for (k, issued) in outputs.iter().enumerate() {
            self.inspect_outputs(issued)
                .context(|| format!("audit of {} th issue in tx [{}] failed", k, tx_id))?;
        }
        Ok(())
    }

    pub fn check_transfer_requests(
        &self,
        inputs: &[Vec<AuditableToken>],
        outputs: &[Vec<AuditableToken>],
        tx_id: &str,
    ) -> Result<()> {
        for (k, transferred) in outputs.iter().enumerate() {
            self.inspect_outputs(transferred)
                .context(|| format!("audit of {} th transfer in tx [{}] failed", k, tx_id))?;
        }
        for (k, spent) in inputs.iter().enumerate() {
            self.inspect_inputs(spent)
                .context(|| format!("audit of {} th transfer in tx [{}] failed", k, tx_id))?;
        }
        Ok(())
    }

    pub fn inspect_outputs(&self, tokens: &[AuditableToken]) -> Result<()> {
        for (i, t) in tokens.iter().enumerate() {
            self.inspect_output(t, i)
                .context(|| format!("failed inspecting output [{}]", i))?;
        }
        Ok(())
    }

    /// Recomputes the commitment of the output at `index` from its opening
    /// and checks its owner
    pub fn inspect_output(&self, output: &AuditableToken, index: usize) -> Result<()> {
        if self.pedersen_params.len() != 3 {
            return Err(ZkatError::InvalidParameters("length of Pedersen basis != 3".into()));
        }
        let data = output
            .data
            .as_ref()
            .ok_or_else(|| ZkatError::Audit(format!("invalid output at index [{}]", index)))?;
        let com = compute_pedersen_commitment(
            &[type_to_zr(&data.token_type), data.value, data.blinding_factor],
            &self.pedersen_params,
        )?;
        if com != output.token.data {
            return Err(ZkatError::Audit(format!(
                "output at index [{}] does not match the provided opening",
                index
            )));
        }
        if !output.token.is_redeem() {
            inspect_token_owner(self.des, output, index)
                .context(|| format!("failed inspecting output at index [{}]", index))?;
        }
        Ok(())
    }

    pub fn inspect_inputs(&self, inputs: &[AuditableToken]) -> Result<()> {
        for (i, input) in inputs.iter().enumerate() {
            if !input.token.is_redeem() {
                inspect_token_owner(self.des, input, i)
                    .context(|| format!("failed inspecting input at index [{}]", i))?;
            }
        }
        Ok(())
    }
}

/// Matches the owner of `token` against its audit information
pub fn inspect_token_owner(des: &dyn AuditInfoDeserializer, token: &AuditableToken, index: usize) -> Result<()> {
    if token.token.is_redeem() {
        return Err(ZkatError::Audit(format!(
            "token at index [{}] is a redeem token, cannot inspect ownership",
            index
        )));
    }
    if token.owner.owner_info.is_empty() {
        return Err(ZkatError::Audit(format!(
            "failed to inspect owner at index [{}]: owner info is nil",
            index
        )));
    }
    let owner = TypedIdentity::deserialize(token.token.owner())
        .map_err(|_| ZkatError::Audit(format!("owner at index [{}] cannot be unwrapped", index)))?;
    match owner.identity_type.as_str() {
        X509_IDENTITY | IDEMIX_IDENTITY => {
            let matcher = des
                .get_owner_matcher(&token.owner.owner_info)
                .context(|| format!("failed to get owner matcher for output [{}]", index))?;
            matcher
                .matches(token.token.owner())
                .map_err(|e| ZkatError::Audit(format!("owner at index [{}] does not match the provided opening: {}", index, e)))
        }
        HTLC_SCRIPT => inspect_token_owner_of_script(des, token, index),
        other => Err(ZkatError::Audit(format!("identity type [{}] not recognized", other))),
    }
}

fn inspect_token_owner_of_script(des: &dyn AuditInfoDeserializer, token: &AuditableToken, index: usize) -> Result<()> {
    let script = Script::from_owner(token.token.owner())?
        .ok_or_else(|| ZkatError::Audit(format!("input owner at index [{}] cannot be unmarshalled", index)))?;
    let info: ScriptInfo = serde_json::from_slice(&token.owner.owner_info)
        .map_err(ZkatError::from)
        .context(|| "failed to unmarshal script info")?;

    for (party, audit_info) in [(&script.sender, &info.sender), (&script.recipient, &info.recipient)] {
        let matcher = des
            .get_owner_matcher(audit_info)
            .context(|| format!("failed to unmarshal audit info from script party [{}]", hex::encode(audit_info)))?;
        matcher.matches(party.as_bytes()).map_err(|e| {
            ZkatError::Audit(format!(
                "token at index [{}] does not match the provided opening [{}]: {}",
                index,
                hex::encode(audit_info),
                e
            ))
        })?;
    }
    Ok(())
}

/// Auditable outputs of each issue action
pub fn get_audit_info_for_issues(issues: &[Vec<u8>], metadata: &[IssueMetadata]) -> Result<Vec<Vec<AuditableToken>>> {
    if issues.len() != metadata.len() {
        return Err(ZkatError::Audit(
            "number of issues does not match number of provided metadata".into(),
        ));
    }
    issues
        .iter()
        .zip(metadata)
        .map(|(raw, md)| -> Result<Vec<AuditableToken>> {
            let action = IssueAction::deserialize(raw)?;
            if action.outputs.len() != md.receivers_audit_infos.len() || action.outputs.len() != md.outputs_metadata.len()
            {
                return Err(ZkatError::Audit(
                    "number of output does not match number of provided metadata".into(),
                ));
            }
            action
                .outputs
                .into_iter()
                .zip(md.outputs_metadata.iter().zip(&md.receivers_audit_infos))
                .map(|(out, (info, audit_info))| -> Result<AuditableToken> {
                    if out.is_redeem() {
                        return Err(ZkatError::Audit("issue cannot redeem tokens".into()));
                    }
                    let meta = Metadata::deserialize(info)?;
                    Ok(AuditableToken::new(out, audit_info.clone(), Some(meta.into())))
                })
                .collect()
        })
        .collect()
}

/// Auditable inputs and outputs of each transfer action
#[allow(clippy::type_complexity)]
pub fn get_audit_info_for_transfers(
    transfers: &[Vec<u8>],
    metadata: &[TransferMetadata],
    inputs: &[Vec<Token>],
) -> Result<(Vec<Vec<AuditableToken>>, Vec<Vec<AuditableToken>>)> {
    if transfers.len() != metadata.len() {
        return Err(ZkatError::Audit(
            "number of transfers does not match the number of provided metadata".into(),
        ));
    }
    if inputs.len() != metadata.len() {
        return Err(ZkatError::Audit(
            "number of inputs does not match the number of provided metadata".into(),
        ));
    }
    let mut auditable_inputs = Vec::with_capacity(inputs.len());
    let mut outputs = Vec::with_capacity(transfers.len());
    for ((raw, md), spent) in transfers.iter().zip(metadata).zip(inputs) {
        if md.sender_audit_infos.len() != spent.len() {
            return Err(ZkatError::Audit(format!(
                "number of inputs does not match the number of senders [{}]!=[{}]",
                md.sender_audit_infos.len(),
                spent.len()
            )));
        }
        auditable_inputs.push(
            spent
                .iter()
                .zip(&md.sender_audit_infos)
                .map(|(tok, audit_info)| AuditableToken::new(tok.clone(), audit_info.clone(), None))
                .collect::<Vec<_>>(),
        );

        let action = TransferAction::deserialize(raw)?;
        if action.output_tokens.len() != md.receiver_audit_infos.len() {
            return Err(ZkatError::Audit(
                "number of outputs does not match the number of receivers".into(),
            ));
        }
        if action.output_tokens.len() != md.output_audit_infos.len() {
            return Err(ZkatError::Audit(
                "number of outputs does not match the number of output audit info".into(),
            ));
        }
        if action.output_tokens.len() != md.outputs_metadata.len() {
            return Err(ZkatError::Audit(
                "number of outputs does not match the number of output metadata".into(),
            ));
        }
        outputs.push(
            action
                .output_tokens
                .into_iter()
                .zip(md.outputs_metadata.iter().zip(&md.output_audit_infos))
                .map(|(out, (info, audit_info))| -> Result<AuditableToken> {
                    let meta = Metadata::deserialize(info)?;
                    Ok(AuditableToken::new(out, audit_info.clone(), Some(meta.into())))
                })
                .collect::<Result<Vec<_>>>()?,
        );
    }
    Ok((auditable_inputs, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupConfig;
    use crate::identity::schnorr::{SchnorrDeserializer, SchnorrSigningIdentity};
    use crate::identity::Verifier as _;
    use crate::issue::Issuer;
    use crate::math;
    use crate::setup::{setup, PublicParams};
    use rand::rngs::OsRng;

    struct Fixture {
        pp: PublicParams,
        auditor: SchnorrSigningIdentity,
        request: TokenRequest,
        metadata: TokenRequestMetadata,
    }

    fn issue_fixture() -> Fixture {
        let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng).unwrap();
        let issuer = SchnorrSigningIdentity::new(&mut OsRng);
        let alice = SchnorrSigningIdentity::new(&mut OsRng);
        let bob = SchnorrSigningIdentity::new(&mut OsRng);
        let owners = vec![alice.identity().into_bytes(), bob.identity().into_bytes()];
        let (action, meta) = Issuer::new("ABC", &issuer, &pp)
            .generate_zk_issue(&[50, 20], owners.clone(), &mut OsRng)
            .unwrap();

        let mut request = TokenRequest::new();
        request.add_issue(&action).unwrap();
        let metadata = TokenRequestMetadata {
            issues: vec![IssueMetadata {
                issuer: issuer.identity(),
                outputs: action.outputs.iter().map(|t| t.serialize().unwrap()).collect(),
                outputs_metadata: meta.iter().map(|m| m.serialize().unwrap()).collect(),
                receivers: owners.iter().map(|o| o.clone().into()).collect(),
                receivers_audit_infos: owners,
            }],
            ..Default::default()
        };
        Fixture {
            pp,
            auditor: SchnorrSigningIdentity::new(&mut OsRng),
            request,
            metadata,
        }
    }

    #[test]
    fn test_check_and_endorse() {
        let f = issue_fixture();
        let auditor = Auditor::new(&SchnorrDeserializer, &f.auditor, f.pp.pedersen_generators.clone());
        auditor.check(&f.request, &f.metadata, &[], "tx1").unwrap();

        let sig = auditor.endorse(&f.request, "tx1").unwrap();
        f.auditor
            .verifier()
            .verify(&f.request.message_to_sign("tx1").unwrap(), &sig)
            .unwrap();
    }

    #[test]
    fn test_wrong_opening() {
        let mut f = issue_fixture();
        let mut meta = Metadata::deserialize(&f.metadata.issues[0].outputs_metadata[1]).unwrap();
        meta.value = math::zr_from_u64(21);
        f.metadata.issues[0].outputs_metadata[1] = meta.serialize().unwrap();

        let auditor = Auditor::new(&SchnorrDeserializer, &f.auditor, f.pp.pedersen_generators.clone());
        let err = auditor.check(&f.request, &f.metadata, &[], "tx1").unwrap_err();
        assert_eq!(
            err.root().to_string(),
            "output at index [1] does not match the provided opening"
        );
    }

    #[test]
    fn test_wrong_owner_audit_info() {
        let mut f = issue_fixture();
        f.metadata.issues[0].receivers_audit_infos[0] = f.auditor.identity().into_bytes();

        let auditor = Auditor::new(&SchnorrDeserializer, &f.auditor, f.pp.pedersen_generators.clone());
        let err = auditor.check(&f.request, &f.metadata, &[], "tx1").unwrap_err();
        assert!(err
            .root()
            .to_string()
            .starts_with("owner at index [0] does not match the provided opening"));
    }

    #[test]
    fn test_missing_metadata() {
        let f = issue_fixture();
        let err = get_audit_info_for_issues(&f.request.issues, &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "number of issues does not match number of provided metadata"
        );

        let err = get_audit_info_for_transfers(&[vec![]], &[], &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "number of transfers does not match the number of provided metadata"
        );
    }

    #[test]
    fn test_redeemed_input_skips_owner() {
        let f = issue_fixture();
        let auditor = Auditor::new(&SchnorrDeserializer, &f.auditor, f.pp.pedersen_generators.clone());
        let redeemed = AuditableToken::new(Token::new(vec![], math::rand_g1(&mut OsRng)), vec![], None);
        auditor.inspect_inputs(&[redeemed.clone()]).unwrap();
        assert!(inspect_token_owner(&SchnorrDeserializer, &redeemed, 0).is_err());
        assert_eq!(
            auditor.inspect_output(&redeemed, 3).unwrap_err().to_string(),
            "invalid output at index [3]"
        );
    }
}
