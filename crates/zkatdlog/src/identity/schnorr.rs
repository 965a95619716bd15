//! Software signing keys
//!
//! Schnorr signatures over G1 with deterministic nonces. Owners, issuers and
//! auditors serialize as `x509` typed identities wrapping the compressed
//! public key; the audit information of such an identity is the identity
//! itself.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::htlc::{Script, ScriptInfo, ScriptMatcher, ScriptVerifier};
use super::{
    AuditInfoDeserializer, Deserializer, Identity, IdentityKind, Matcher, Signer, SigningIdentity, TypedIdentity,
    Verifier, HTLC_SCRIPT, X509_IDENTITY,
};
use crate::common::Transcript;
use crate::error::{Result, ResultExt, ZkatError};
use crate::math::{self, encoding, G1, Zr};

fn generator() -> G1 {
    math::hash_to_g1(b"zkatdlog.identity.generator")
}

fn challenge(pk: &G1, commitment: &G1, message: &[u8]) -> Zr {
    Transcript::new()
        .append(pk)
        .append(commitment)
        .append_bytes(message)
        .challenge()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct SchnorrSignature {
    #[serde(with = "encoding::canonical")]
    challenge: Zr,
    #[serde(with = "encoding::canonical")]
    response: Zr,
}

/// Secret key with its public identity
pub struct SchnorrSigningIdentity {
    sk: Zr,
    pk: G1,
}

impl SchnorrSigningIdentity {
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(math::rand_zr(rng))
    }

    pub fn from_secret(sk: Zr) -> Self {
        Self {
            sk,
            pk: generator() * sk,
        }
    }

    pub fn public_key(&self) -> G1 {
        self.pk
    }

    pub fn identity(&self) -> Identity {
        public_key_identity(&self.pk)
    }

    pub fn verifier(&self) -> SchnorrVerifier {
        SchnorrVerifier { pk: self.pk }
    }
}

/// `x509` typed identity of a public key
pub fn public_key_identity(pk: &G1) -> Identity {
    let typed = TypedIdentity::new(X509_IDENTITY, math::to_bytes(pk));
    // JSON encoding of a string and a hex blob cannot fail
    typed.serialize().unwrap_or_default()
}

impl Signer for SchnorrSigningIdentity {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let nonce = Transcript::new()
            .append(&self.sk)
            .append_bytes(message)
            .challenge();
        let commitment = generator() * nonce;
        let c = challenge(&self.pk, &commitment, message);
        let sig = SchnorrSignature {
            challenge: c,
            response: nonce + c * self.sk,
        };
        Ok(serde_json::to_vec(&sig)?)
    }
}

impl SigningIdentity for SchnorrSigningIdentity {
    fn serialize(&self) -> Result<Identity> {
        Ok(self.identity())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchnorrVerifier {
    pub pk: G1,
}

impl Verifier for SchnorrVerifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let sig: SchnorrSignature = serde_json::from_slice(signature)
            .map_err(ZkatError::from)
            .context(|| "failed unmarshalling signature")?;
        let commitment = generator() * sig.response - self.pk * sig.challenge;
        if !math::zr_ct_eq(&challenge(&self.pk, &commitment, message), &sig.challenge) {
            return Err(ZkatError::Identity("invalid signature".into()));
        }
        Ok(())
    }
}

/// Matches identities byte for byte
pub struct EqualityMatcher {
    pub expected: Vec<u8>,
}

impl Matcher for EqualityMatcher {
    fn matches(&self, identity: &[u8]) -> Result<()> {
        if self.expected != identity {
            return Err(ZkatError::Identity("identity does not match the audit info".into()));
        }
        Ok(())
    }
}

/// Resolves `x509` identities to [`SchnorrVerifier`]s and `htlc` identities
/// to script verifiers over them.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchnorrDeserializer;

impl SchnorrDeserializer {
    fn public_key_verifier(&self, raw: &[u8]) -> Result<Box<dyn Verifier>> {
        match IdentityKind::resolve(raw)? {
            IdentityKind::X509(pk) => {
                let pk: G1 = math::from_bytes(&pk).context(|| "failed deserializing public key")?;
                Ok(Box::new(SchnorrVerifier { pk }))
            }
            IdentityKind::Idemix(_) => Err(ZkatError::Identity("idemix identities are not supported".into())),
            IdentityKind::StringLabel(label) => Err(ZkatError::Identity(format!(
                "cannot get verifier for wallet label [{}]",
                label
            ))),
        }
    }
}

impl Deserializer for SchnorrDeserializer {
    fn get_owner_verifier(&self, id: &Identity) -> Result<Box<dyn Verifier>> {
        if let Some(script) = Script::from_owner(id.as_bytes())? {
            return Ok(Box::new(ScriptVerifier {
                sender: self
                    .public_key_verifier(script.sender.as_bytes())
                    .context(|| "failed to unmarshal the identity of the sender in the htlc script")?,
                recipient: self
                    .public_key_verifier(script.recipient.as_bytes())
                    .context(|| "failed to unmarshal the identity of the recipient in the htlc script")?,
                deadline: script.deadline,
                hash_info: script.hash_info,
            }));
        }
        self.public_key_verifier(id.as_bytes())
    }

    fn get_issuer_verifier(&self, id: &Identity) -> Result<Box<dyn Verifier>> {
        self.public_key_verifier(id.as_bytes())
    }

    fn get_auditor_verifier(&self, id: &Identity) -> Result<Box<dyn Verifier>> {
        self.public_key_verifier(id.as_bytes())
    }
}

impl AuditInfoDeserializer for SchnorrDeserializer {
    fn get_owner_matcher(&self, audit_info: &[u8]) -> Result<Box<dyn Matcher>> {
        if let Ok(info) = serde_json::from_slice::<ScriptInfo>(audit_info) {
            return Ok(Box::new(ScriptMatcher {
                sender: Box::new(EqualityMatcher { expected: info.sender }),
                recipient: Box::new(EqualityMatcher {
                    expected: info.recipient,
                }),
            }));
        }
        Ok(Box::new(EqualityMatcher {
            expected: audit_info.to_vec(),
        }))
    }
}

/// Audit information of a script owned by plain identities
pub fn script_audit_info(script: &Script) -> Result<Vec<u8>> {
    let info = ScriptInfo {
        sender: script.sender.as_bytes().to_vec(),
        recipient: script.recipient.as_bytes().to_vec(),
    };
    Ok(serde_json::to_vec(&info)?)
}

/// True if `owner` is an `htlc` typed identity
pub fn is_script(owner: &[u8]) -> bool {
    TypedIdentity::deserialize(owner)
        .map(|t| t.identity_type == HTLC_SCRIPT)
        .unwrap_or(false)
}
