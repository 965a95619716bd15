//! Identities and the signing collaborators consumed by the proof engine
//!
//! Owners, issuers and auditors are opaque byte strings on the ledger. The
//! engine only needs to turn them into [`Verifier`]s and to match them
//! against audit information; concrete key schemes plug in through the
//! [`Deserializer`] and [`AuditInfoDeserializer`] traits.

pub mod htlc;
pub mod schnorr;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt, ZkatError};

/// Identity type of certificate-style owners
pub const X509_IDENTITY: &str = "x509";
/// Identity type of anonymous credential owners
pub const IDEMIX_IDENTITY: &str = "idemix";
/// Identity type of hash time lock scripts
pub const HTLC_SCRIPT: &str = "htlc";

/// Serialized identity
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(#[serde(with = "hex")] Vec<u8>);

impl Identity {
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self(raw.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// True for the empty identity
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Identity {
    fn from(raw: Vec<u8>) -> Self {
        Self(raw)
    }
}

impl From<&[u8]> for Identity {
    fn from(raw: &[u8]) -> Self {
        Self(raw.to_vec())
    }
}

impl AsRef<[u8]> for Identity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

/// Identity tagged with the scheme that interprets it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedIdentity {
    #[serde(rename = "type")]
    pub identity_type: String,
    #[serde(with = "hex")]
    pub identity: Vec<u8>,
}

impl TypedIdentity {
    pub fn new(identity_type: impl Into<String>, identity: Vec<u8>) -> Self {
        Self {
            identity_type: identity_type.into(),
            identity,
        }
    }

    pub fn serialize(&self) -> Result<Identity> {
        Ok(Identity(serde_json::to_vec(self)?))
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal typed identity")
    }
}

/// What an identity refers to, resolved once at the boundary
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityKind {
    X509(Vec<u8>),
    Idemix(Vec<u8>),
    /// Wallet label, not an on-ledger identity
    StringLabel(String),
}

impl IdentityKind {
    pub fn resolve(raw: &[u8]) -> Result<Self> {
        if let Ok(typed) = TypedIdentity::deserialize(raw) {
            return match typed.identity_type.as_str() {
                X509_IDENTITY => Ok(IdentityKind::X509(typed.identity)),
                IDEMIX_IDENTITY => Ok(IdentityKind::Idemix(typed.identity)),
                other => Err(ZkatError::Identity(format!("identity type [{}] not recognized", other))),
            };
        }
        match std::str::from_utf8(raw) {
            Ok(label) if !label.is_empty() => Ok(IdentityKind::StringLabel(label.to_string())),
            _ => Err(ZkatError::Identity("cannot resolve identity".into())),
        }
    }
}

/// Produces signatures
pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Checks signatures
pub trait Verifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()>;
}

/// Signer that can disclose its public identity
pub trait SigningIdentity: Signer {
    fn serialize(&self) -> Result<Identity>;
}

/// Checks an identity against audit information
pub trait Matcher: Send + Sync {
    fn matches(&self, identity: &[u8]) -> Result<()>;
}

/// Turns ledger identities into verifiers
pub trait Deserializer: Send + Sync {
    fn get_owner_verifier(&self, id: &Identity) -> Result<Box<dyn Verifier>>;
    fn get_issuer_verifier(&self, id: &Identity) -> Result<Box<dyn Verifier>>;
    fn get_auditor_verifier(&self, id: &Identity) -> Result<Box<dyn Verifier>>;
}

/// Interprets the audit information that accompanies an owner identity
pub trait AuditInfoDeserializer: Send + Sync {
    fn get_owner_matcher(&self, audit_info: &[u8]) -> Result<Box<dyn Matcher>>;
}
