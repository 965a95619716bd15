//! Validation of token requests
//!
//! The validator is what the ledger runs before committing a request:
//!
//! 1. the auditor signature, when the public parameters name an auditor;
//! 2. deserialization of every issue and transfer action;
//! 3. each issue: its proof, the issuer authorization and signature;
//! 4. each transfer, through a pipeline of [`ValidateTransferFn`]: the
//!    spent tokens are loaded from the ledger and their owners' signatures
//!    checked, then the proof, then the hash time lock rules and the
//!    output owners.
//!
//! Any failure rejects the whole request. Signatures are consumed in order
//! from a [`SignatureProvider`], so the request must carry them in the
//! order the steps above ask for them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::htlc::{self, unix_now, ClaimSignature, Operation, Script};
use crate::identity::{Deserializer, Identity, IdentityKind, Verifier};
use crate::issue::{self, anonym, IssueAction};
use crate::request::TokenRequest;
use crate::setup::PublicParams;
use crate::token::{Token, TokenID};
use crate::transfer::{self, TransferAction};

/// Metadata key of a claim preimage found among the request signatures
pub const CLAIM_PREIMAGE: &str = "claimPreimage";

/// Read access to committed tokens
pub trait Ledger {
    /// Serialized token stored under `id`; empty if there is none
    fn get_state(&self, id: &TokenID) -> Result<Vec<u8>>;
}

/// Source of the signatures attached to a request
pub trait SignatureProvider {
    /// Checks that `id` signed the request with `verifier`, returning the
    /// signature it used
    fn has_been_signed_by(&self, id: &Identity, verifier: &dyn Verifier) -> Result<Vec<u8>>;

    fn signatures(&self) -> &[Vec<u8>];
}

/// Ledger and signature provider over a raw request.
///
/// Each call to `has_been_signed_by` consumes the next signature.
pub struct Backend<F> {
    get_state: F,
    message: Vec<u8>,
    index: AtomicUsize,
    signatures: Vec<Vec<u8>>,
}

impl<F> Backend<F>
where
    F: Fn(&TokenID) -> Result<Vec<u8>>,
{
    pub fn new(get_state: F, message: Vec<u8>, signatures: Vec<Vec<u8>>) -> Self {
        Self {
            get_state,
            message,
            index: AtomicUsize::new(0),
            signatures,
        }
    }
}

impl<F> Ledger for Backend<F>
where
    F: Fn(&TokenID) -> Result<Vec<u8>>,
{
    fn get_state(&self, id: &TokenID) -> Result<Vec<u8>> {
        (self.get_state)(id)
    }
}

impl<F> SignatureProvider for Backend<F> {
    fn has_been_signed_by(&self, _id: &Identity, verifier: &dyn Verifier) -> Result<Vec<u8>> {
        let index = self.index.fetch_add(1, Ordering::SeqCst);
        let sigma = self
            .signatures
            .get(index)
            .ok_or_else(|| ZkatError::Identity("invalid state, insufficient number of signatures".into()))?;
        verifier.verify(&self.message, sigma)?;
        Ok(sigma.clone())
    }

    fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }
}

/// Something a valid request does to the ledger
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Issue(IssueAction),
    Transfer(TransferAction),
    /// Metadata carried by a signature, e.g. the preimage revealed by an
    /// htlc claim
    Signature(BTreeMap<String, Vec<u8>>),
}

/// State shared by the steps validating one transfer
pub struct TransferContext<'a> {
    pub pp: &'a PublicParams,
    pub deserializer: &'a dyn Deserializer,
    pub ledger: &'a dyn Ledger,
    pub signature_provider: &'a dyn SignatureProvider,
    pub action: &'a TransferAction,
    /// Spent tokens as loaded from the ledger
    pub input_tokens: Vec<Token>,
    /// Signature of the owner of each spent token
    pub signatures: Vec<Vec<u8>>,
}

/// One step of transfer validation
pub type ValidateTransferFn = fn(&mut TransferContext<'_>) -> Result<()>;

/// Loads the spent tokens and checks their owners signed the request
pub fn transfer_signature_validate(ctx: &mut TransferContext<'_>) -> Result<()> {
    let mut tokens = Vec::with_capacity(ctx.action.num_inputs());
    let mut signatures = Vec::with_capacity(ctx.action.num_inputs());
    for (i, (id, embedded)) in ctx.action.inputs.iter().zip(&ctx.action.input_tokens).enumerate() {
        debug!("load token [{}][{}]", i, id);
        let raw = ctx
            .ledger
            .get_state(id)
            .context(|| format!("failed to retrieve input to spend [{}]", id))?;
        if raw.is_empty() {
            return Err(ZkatError::Ledger(format!("input to spend [{}] does not exists", id)));
        }
        let tok = Token::deserialize(&raw).context(|| format!("failed to deserialize input to spend [{}]", id))?;
        if &tok != embedded {
            return Err(ZkatError::Ledger(format!(
                "input to spend [{}] does not match the token in the transfer action",
                id
            )));
        }

        let owner = Identity::new(tok.owner.clone());
        debug!("check sender [{}][{}]", i, owner);
        let verifier = ctx
            .deserializer
            .get_owner_verifier(&owner)
            .context(|| format!("failed deserializing owner [{}][{}][{}]", i, id, owner))?;
        let sigma = ctx
            .signature_provider
            .has_been_signed_by(&owner, verifier.as_ref())
            .context(|| format!("failed signature verification [{}][{}][{}]", i, id, owner))?;
        tokens.push(tok);
        signatures.push(sigma);
    }
    ctx.input_tokens = tokens;
    ctx.signatures = signatures;
    Ok(())
}

/// Verifies the transfer proof against the commitments loaded from the ledger
pub fn transfer_zk_proof_validate(ctx: &mut TransferContext<'_>) -> Result<()> {
    let inputs = ctx.input_tokens.iter().map(|t| t.data).collect();
    transfer::Verifier::new(inputs, ctx.action.get_output_commitments(), ctx.pp).verify(&ctx.action.proof)
}

/// Enforces the claim and reclaim rules on tokens locked by a script
pub fn transfer_htlc_validate(ctx: &mut TransferContext<'_>) -> Result<()> {
    let now = unix_now();
    for (i, input) in ctx.input_tokens.iter().enumerate() {
        if Script::from_owner(input.owner())?.is_none() {
            continue;
        }
        if ctx.input_tokens.len() != 1 || ctx.action.num_outputs() != 1 {
            return Err(ZkatError::InvalidInput(
                "invalid transfer action: an htlc script only transfers the ownership of a token".into(),
            ));
        }
        let out = &ctx.action.output_tokens[0];
        let (script, op) = htlc::verify_owner(input.owner(), out.owner(), now)
            .context(|| "failed to verify transfer from htlc script")?;
        let sigma = ctx
            .signatures
            .get(i)
            .ok_or_else(|| ZkatError::Identity(format!("missing signature for input [{}]", i)))?;
        htlc_metadata_check(ctx.action, &script, op, sigma).context(|| "failed to check htlc metadata")?;
    }
    Ok(())
}

/// A claim must publish its preimage in the action metadata
pub fn htlc_metadata_check(action: &TransferAction, script: &Script, op: Operation, sigma: &[u8]) -> Result<()> {
    if op == Operation::Reclaim {
        return Ok(());
    }
    let claim = ClaimSignature::deserialize(sigma)?;
    if claim.preimage.is_empty() || claim.recipient_signature.is_empty() {
        return Err(ZkatError::InvalidInput(
            "expected a valid claim preImage and recipient signature".into(),
        ));
    }
    if action.metadata.is_empty() {
        return Err(ZkatError::InvalidInput("cannot find htlc pre-image, no metadata".into()));
    }
    let image = script.hash_info.image(&claim.preimage);
    let value = action
        .metadata
        .get(&htlc::claim_key(&image))
        .ok_or_else(|| ZkatError::InvalidInput("cannot find htlc pre-image, missing metadata entry".into()))?;
    if value != &claim.preimage {
        return Err(ZkatError::InvalidInput(format!(
            "invalid action, cannot match htlc pre-image with metadata [{}]!=[{}]",
            hex::encode(value),
            hex::encode(&claim.preimage)
        )));
    }
    Ok(())
}

/// Checks the owner of every output: redeems pass, scripts must not have
/// expired, everything else must be a signing identity
pub fn transfer_output_owners_validate(ctx: &mut TransferContext<'_>) -> Result<()> {
    let now = unix_now();
    for (i, out) in ctx.action.output_tokens.iter().enumerate() {
        validate_output_owner(out, now).context(|| format!("invalid output owner at index [{}]", i))?;
    }
    Ok(())
}

fn validate_output_owner(out: &Token, now: u64) -> Result<()> {
    if out.is_redeem() {
        return Ok(());
    }
    if let Some(script) = Script::from_owner(out.owner())? {
        return script.validate(now).context(|| "htlc script invalid");
    }
    match IdentityKind::resolve(out.owner())? {
        IdentityKind::X509(_) | IdentityKind::Idemix(_) => Ok(()),
        IdentityKind::StringLabel(_) => Err(ZkatError::Identity("invalid output owner type".into())),
    }
}

/// Accepts or rejects token requests
pub struct Validator {
    pp: PublicParams,
    deserializer: Box<dyn Deserializer>,
    transfer_validators: Vec<ValidateTransferFn>,
}

impl Validator {
    /// Validator over `pp`; fails if the parameters do not validate
    pub fn new(pp: PublicParams, deserializer: Box<dyn Deserializer>) -> Result<Self> {
        pp.validate()?;
        Ok(Self {
            pp,
            deserializer,
            transfer_validators: vec![
                transfer_signature_validate,
                transfer_zk_proof_validate,
                transfer_htlc_validate,
                transfer_output_owners_validate,
            ],
        })
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.pp
    }

    /// Validates a serialized request bound to `binding`, reading spent
    /// tokens through `get_state`
    pub fn verify_token_request_from_raw<F>(&self, get_state: F, binding: &str, raw: &[u8]) -> Result<Vec<Action>>
    where
        F: Fn(&TokenID) -> Result<Vec<u8>>,
    {
        if raw.is_empty() {
            return Err(ZkatError::InvalidInput("empty token request".into()));
        }
        let request = TokenRequest::deserialize(raw)?;
        let message = request.message_to_sign(binding)?;
        debug!("cc tx-id [{}][{}]", hex::encode(Sha256::digest(&message)), binding);

        let signatures = if self.pp.auditor.is_none() {
            request.signatures.clone()
        } else {
            [request.auditor_signatures.clone(), request.signatures.clone()].concat()
        };
        let backend = Backend::new(get_state, message, signatures);
        self.verify_token_request(&backend, &backend, binding, &request)
    }

    pub fn verify_token_request(
        &self,
        ledger: &dyn Ledger,
        signature_provider: &dyn SignatureProvider,
        binding: &str,
        request: &TokenRequest,
    ) -> Result<Vec<Action>> {
        self.verify_auditor_signature(signature_provider)
            .context(|| format!("failed to verifier auditor's signature [{}]", binding))?;
        debug!("[{}] auditor signature verified", binding);

        let issues = request
            .issues
            .iter()
            .map(|raw| IssueAction::deserialize(raw))
            .collect::<Result<Vec<_>>>()
            .context(|| format!("failed to retrieve issue actions [{}]", binding))?;
        let transfers = request
            .transfers
            .iter()
            .map(|raw| TransferAction::deserialize(raw))
            .collect::<Result<Vec<_>>>()
            .context(|| format!("failed to retrieve transfer actions [{}]", binding))?;
        debug!(
            "[{}] deserialized [{}] issues and [{}] transfers",
            binding,
            issues.len(),
            transfers.len()
        );

        for action in &issues {
            self.verify_issue(action, signature_provider)
                .context(|| format!("failed to verify issuers' signatures [{}]", binding))?;
        }
        debug!("[{}] issues verified", binding);

        for action in &transfers {
            self.verify_transfer(ledger, signature_provider, action)
                .context(|| format!("failed to verify senders' signatures [{}]", binding))?;
        }
        debug!("[{}] transfers verified", binding);

        let mut actions: Vec<Action> = issues
            .into_iter()
            .map(Action::Issue)
            .chain(transfers.into_iter().map(Action::Transfer))
            .collect();
        for sigma in signature_provider.signatures() {
            let Ok(claim) = ClaimSignature::deserialize(sigma) else {
                continue;
            };
            if claim.preimage.is_empty() || claim.recipient_signature.is_empty() {
                continue;
            }
            actions.push(Action::Signature(BTreeMap::from([(
                CLAIM_PREIMAGE.to_string(),
                claim.preimage,
            )])));
        }
        Ok(actions)
    }

    fn verify_auditor_signature(&self, signature_provider: &dyn SignatureProvider) -> Result<()> {
        if self.pp.auditor.is_none() {
            return Ok(());
        }
        let verifier = self
            .deserializer
            .get_auditor_verifier(&self.pp.auditor)
            .map_err(|_| ZkatError::Identity("failed to deserialize auditor's public key".into()))?;
        signature_provider.has_been_signed_by(&self.pp.auditor, verifier.as_ref())?;
        Ok(())
    }

    fn verify_issue(&self, action: &IssueAction, signature_provider: &dyn SignatureProvider) -> Result<()> {
        action.validate()?;
        let proof = issue::Proof::deserialize(&action.proof)?;
        issue::Verifier::new(action.get_commitments(), action.anonymous, &self.pp)
            .verify_proof(&proof)
            .context(|| "failed to verify issue action")?;

        let verifier: Box<dyn Verifier> = if action.anonymous {
            let nym = anonym::nym_from_identity(&action.issuer)?;
            Box::new(anonym::Verifier::new(
                nym,
                proof.well_formedness.commitment_to_type,
                &self.pp,
            )?)
        } else {
            let issuers = self.pp.issuers();
            if !issuers.is_empty() && !issuers.contains(&action.issuer) {
                return Err(ZkatError::Identity(format!(
                    "issuer [{}] is not in issuers",
                    action.issuer
                )));
            }
            self.deserializer
                .get_issuer_verifier(&action.issuer)
                .context(|| format!("failed getting verifier for [{}]", action.issuer))?
        };
        signature_provider
            .has_been_signed_by(&action.issuer, verifier.as_ref())
            .context(|| "failed verifying signature")?;
        Ok(())
    }

    fn verify_transfer(
        &self,
        ledger: &dyn Ledger,
        signature_provider: &dyn SignatureProvider,
        action: &TransferAction,
    ) -> Result<()> {
        action.validate()?;
        let mut ctx = TransferContext {
            pp: &self.pp,
            deserializer: self.deserializer.as_ref(),
            ledger,
            signature_provider,
            action,
            input_tokens: Vec::new(),
            signatures: Vec::new(),
        };
        for validate in &self.transfer_validators {
            validate(&mut ctx).context(|| "failed to verify transfer action")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupConfig;
    use crate::identity::htlc::HashInfo;
    use crate::identity::schnorr::{SchnorrDeserializer, SchnorrSigningIdentity};
    use crate::identity::Signer;
    use crate::math;
    use crate::setup::setup;
    use rand::rngs::OsRng;

    struct Accept;

    impl Verifier for Accept {
        fn verify(&self, _message: &[u8], _signature: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_backend_consumes_signatures_in_order() {
        let alice = SchnorrSigningIdentity::new(&mut OsRng);
        let message = b"request".to_vec();
        let sigs = vec![alice.sign(&message).unwrap(), b"other".to_vec()];
        let backend = Backend::new(|_: &TokenID| Ok(vec![]), message, sigs.clone());

        let id = alice.identity();
        assert_eq!(backend.has_been_signed_by(&id, &alice.verifier()).unwrap(), sigs[0]);
        assert!(backend.has_been_signed_by(&id, &alice.verifier()).is_err());
        let err = backend.has_been_signed_by(&id, &Accept).unwrap_err();
        assert_eq!(err.to_string(), "invalid state, insufficient number of signatures");
        assert_eq!(backend.signatures().len(), 2);
    }

    #[test]
    fn test_empty_request() {
        let pp = setup(&SetupConfig::bulletproof(8), &mut OsRng).unwrap();
        let validator = Validator::new(pp, Box::new(SchnorrDeserializer)).unwrap();
        let err = validator
            .verify_token_request_from_raw(|_: &TokenID| Ok(vec![]), "tx", &[])
            .unwrap_err();
        assert!(err.to_string().contains("empty token request"));
    }

    #[test]
    fn test_rejects_invalid_public_params() {
        let mut pp = setup(&SetupConfig::membership(16, 2), &mut OsRng).unwrap();
        pp.membership_params.as_mut().unwrap().exponent = 0;
        let err = Validator::new(pp, Box::new(SchnorrDeserializer)).err().unwrap();
        assert!(err.to_string().starts_with("invalid public parameters"));
        assert!(err.root().to_string().contains("exponent [0]"));

        let mut pp = setup(&SetupConfig::bulletproof(16), &mut OsRng).unwrap();
        pp.range_proof_params.as_mut().unwrap().number_of_rounds = 64;
        assert!(Validator::new(pp, Box::new(SchnorrDeserializer)).is_err());
    }

    #[test]
    fn test_missing_auditor_signature() {
        let pp = setup(&SetupConfig::bulletproof(8), &mut OsRng).unwrap();
        let auditor = SchnorrSigningIdentity::new(&mut OsRng);
        let validator = Validator::new(pp.with_auditor(auditor.identity()), Box::new(SchnorrDeserializer)).unwrap();
        let raw = TokenRequest::new().serialize().unwrap();
        let err = validator
            .verify_token_request_from_raw(|_: &TokenID| Ok(vec![]), "tx", &raw)
            .unwrap_err();
        assert_eq!(err.root().to_string(), "invalid state, insufficient number of signatures");
    }

    #[test]
    fn test_output_owners() {
        let now = unix_now();
        let alice = SchnorrSigningIdentity::new(&mut OsRng);
        let data = math::rand_g1(&mut OsRng);
        validate_output_owner(&Token::new(vec![], data), now).unwrap();
        validate_output_owner(&Token::new(alice.identity().into_bytes(), data), now).unwrap();
        assert!(validate_output_owner(&Token::new(b"alice".to_vec(), data), now).is_err());

        let script = Script {
            sender: alice.identity(),
            recipient: alice.identity(),
            deadline: now - 1,
            hash_info: HashInfo::new(b"secret"),
        };
        let owner = script.to_identity().unwrap().into_bytes();
        let err = validate_output_owner(&Token::new(owner, data), now).unwrap_err();
        assert!(err.to_string().contains("expiration date has already passed"));
    }

    #[test]
    fn test_htlc_metadata_check() {
        let alice = SchnorrSigningIdentity::new(&mut OsRng);
        let bob = SchnorrSigningIdentity::new(&mut OsRng);
        let script = Script {
            sender: alice.identity(),
            recipient: bob.identity(),
            deadline: unix_now() + 600,
            hash_info: HashInfo::new(b"secret"),
        };
        let claim = ClaimSignature {
            recipient_signature: vec![1],
            preimage: b"secret".to_vec(),
        }
        .serialize()
        .unwrap();

        let mut action = transfer::new_transfer(vec![], vec![], vec![], vec![], vec![]).unwrap();
        htlc_metadata_check(&action, &script, Operation::Reclaim, &[]).unwrap();

        let err = htlc_metadata_check(&action, &script, Operation::Claim, &claim).unwrap_err();
        assert_eq!(err.to_string(), "invalid input: cannot find htlc pre-image, no metadata");

        action.metadata.insert("other".into(), vec![0]);
        let err = htlc_metadata_check(&action, &script, Operation::Claim, &claim).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input: cannot find htlc pre-image, missing metadata entry"
        );

        let key = htlc::claim_key(&script.hash_info.image(b"secret"));
        action.metadata.insert(key.clone(), b"secret".to_vec());
        htlc_metadata_check(&action, &script, Operation::Claim, &claim).unwrap();

        action.metadata.insert(key, b"secreT".to_vec());
        assert!(htlc_metadata_check(&action, &script, Operation::Claim, &claim).is_err());
    }
}
