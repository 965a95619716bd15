//! Hash time lock scripts
//!
//! A token owned by a [`Script`] can be claimed by the recipient before the
//! deadline by revealing the preimage of the lock hash, or reclaimed by the
//! sender once the deadline has passed.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Identity, Matcher, Signer, TypedIdentity, Verifier, HTLC_SCRIPT};
use crate::error::{Result, ResultExt, ZkatError};

/// Prefix of the metadata key carrying a claim preimage
pub const CLAIM_PREIMAGE: &str = "htlc.claim.preimage.";

/// Metadata key under which the preimage of `image` is published
pub fn claim_key(image: &[u8]) -> String {
    format!("{}{}", CLAIM_PREIMAGE, hex::encode(image))
}

/// Seconds since the unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunc {
    #[default]
    Sha256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashEncoding {
    #[default]
    None,
    Hex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashInfo {
    #[serde(with = "hex")]
    pub hash: Vec<u8>,
    #[serde(default)]
    pub hash_func: HashFunc,
    #[serde(default)]
    pub hash_encoding: HashEncoding,
}

impl HashInfo {
    /// Lock for `preimage`
    pub fn new(preimage: &[u8]) -> Self {
        let mut info = Self {
            hash: Vec::new(),
            hash_func: HashFunc::Sha256,
            hash_encoding: HashEncoding::None,
        };
        info.hash = info.image(preimage);
        info
    }

    /// Image of `preimage` under the configured hash and encoding
    pub fn image(&self, preimage: &[u8]) -> Vec<u8> {
        let digest = match self.hash_func {
            HashFunc::Sha256 => Sha256::digest(preimage).to_vec(),
        };
        match self.hash_encoding {
            HashEncoding::None => digest,
            HashEncoding::Hex => hex::encode(digest).into_bytes(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hash.is_empty() {
            return Err(ZkatError::InvalidInput("hash is not set".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub sender: Identity,
    pub recipient: Identity,
    /// Unix seconds after which only the sender can spend
    pub deadline: u64,
    pub hash_info: HashInfo,
}

impl Script {
    pub fn validate(&self, now: u64) -> Result<()> {
        if self.sender.is_none() {
            return Err(ZkatError::InvalidInput("sender not set".into()));
        }
        if self.recipient.is_none() {
            return Err(ZkatError::InvalidInput("recipient not set".into()));
        }
        if self.deadline < now {
            return Err(ZkatError::InvalidInput("expiration date has already passed".into()));
        }
        self.hash_info.validate()
    }

    /// Owner identity that locks a token with this script
    pub fn to_identity(&self) -> Result<Identity> {
        TypedIdentity::new(HTLC_SCRIPT, serde_json::to_vec(self)?).serialize()
    }

    /// Script carried by an owner identity, `None` if the owner is not a script
    pub fn from_owner(owner: &[u8]) -> Result<Option<Self>> {
        let Ok(typed) = TypedIdentity::deserialize(owner) else {
            return Ok(None);
        };
        if typed.identity_type != HTLC_SCRIPT {
            return Ok(None);
        }
        let script = serde_json::from_slice(&typed.identity)
            .map_err(ZkatError::from)
            .context(|| "failed to unmarshal htlc script")?;
        Ok(Some(script))
    }
}

/// Signature spending a script before its deadline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSignature {
    #[serde(with = "hex")]
    pub recipient_signature: Vec<u8>,
    #[serde(with = "hex")]
    pub preimage: Vec<u8>,
}

impl ClaimSignature {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed unmarshalling claim signature")
    }

    /// Message the recipient signs to claim
    pub fn message(message: &[u8], preimage: &[u8]) -> Vec<u8> {
        [message, preimage].concat()
    }
}

/// Signs on behalf of the recipient of a script, revealing the preimage
pub struct ClaimSigner<'a> {
    pub recipient: &'a dyn Signer,
    pub preimage: Vec<u8>,
}

impl Signer for ClaimSigner<'_> {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let recipient_signature = self
            .recipient
            .sign(&ClaimSignature::message(message, &self.preimage))
            .context(|| "failed signing claim")?;
        ClaimSignature {
            recipient_signature,
            preimage: self.preimage.clone(),
        }
        .serialize()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Claim,
    Reclaim,
}

/// Checks that `output_owner` is the party allowed to receive the token
/// locked by `input_owner` at time `now`.
pub fn verify_owner(input_owner: &[u8], output_owner: &[u8], now: u64) -> Result<(Script, Operation)> {
    let script = Script::from_owner(input_owner)?
        .ok_or_else(|| ZkatError::InvalidInput("input owner is not an htlc script".into()))?;
    if now < script.deadline {
        if script.recipient.as_bytes() != output_owner {
            return Err(ZkatError::InvalidInput(
                "owner of output token does not correspond to recipient in htlc request".into(),
            ));
        }
        Ok((script, Operation::Claim))
    } else {
        if script.sender.as_bytes() != output_owner {
            return Err(ZkatError::InvalidInput(
                "owner of output token does not correspond to sender in htlc request".into(),
            ));
        }
        Ok((script, Operation::Reclaim))
    }
}

/// Verifies spends of a script owned token
pub struct ScriptVerifier {
    pub sender: Box<dyn Verifier>,
    pub recipient: Box<dyn Verifier>,
    pub deadline: u64,
    pub hash_info: HashInfo,
}

impl Verifier for ScriptVerifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        if unix_now() < self.deadline {
            let claim = ClaimSignature::deserialize(signature)?;
            self.recipient
                .verify(&ClaimSignature::message(message, &claim.preimage), &claim.recipient_signature)
                .context(|| "failed verifying recipient signature")?;
            if self.hash_info.image(&claim.preimage) != self.hash_info.hash {
                return Err(ZkatError::Identity("hash mismatch: preimage does not open the lock".into()));
            }
            return Ok(());
        }
        self.sender.verify(message, signature)
    }
}

/// Audit information of a script: one entry per party
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfo {
    #[serde(with = "hex")]
    pub sender: Vec<u8>,
    #[serde(with = "hex")]
    pub recipient: Vec<u8>,
}

/// Matches a script owner against the audit information of both parties
pub struct ScriptMatcher {
    pub sender: Box<dyn Matcher>,
    pub recipient: Box<dyn Matcher>,
}

impl Matcher for ScriptMatcher {
    fn matches(&self, identity: &[u8]) -> Result<()> {
        let script = Script::from_owner(identity)?
            .ok_or_else(|| ZkatError::Identity("identity is not an htlc script".into()))?;
        self.sender
            .matches(script.sender.as_bytes())
            .context(|| format!("failed matching sender identity [{}]", script.sender))?;
        self.recipient
            .matches(script.recipient.as_bytes())
            .context(|| format!("failed matching recipient identity [{}]", script.recipient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(deadline: u64) -> Script {
        Script {
            sender: Identity::new(b"alice".to_vec()),
            recipient: Identity::new(b"bob".to_vec()),
            deadline,
            hash_info: HashInfo::new(b"secret"),
        }
    }

    #[test]
    fn test_hash_info() {
        let info = HashInfo::new(b"secret");
        assert_eq!(info.image(b"secret"), info.hash);
        assert_ne!(info.image(b"guess"), info.hash);

        let hex_info = HashInfo {
            hash_encoding: HashEncoding::Hex,
            ..info.clone()
        };
        assert_eq!(hex_info.image(b"secret"), hex::encode(&info.hash).into_bytes());
    }

    #[test]
    fn test_validate() {
        let now = unix_now();
        script(now + 3600).validate(now).unwrap();
        let err = script(now - 1).validate(now).unwrap_err();
        assert!(err.to_string().contains("expiration date has already passed"));

        let mut s = script(now + 3600);
        s.sender = Identity::default();
        assert!(s.validate(now).is_err());
    }

    #[test]
    fn test_verify_owner() {
        let owner = script(1000).to_identity().unwrap();

        let (_, op) = verify_owner(owner.as_bytes(), b"bob", 999).unwrap();
        assert_eq!(op, Operation::Claim);
        assert!(verify_owner(owner.as_bytes(), b"alice", 999).is_err());

        let (_, op) = verify_owner(owner.as_bytes(), b"alice", 1000).unwrap();
        assert_eq!(op, Operation::Reclaim);
        assert!(verify_owner(owner.as_bytes(), b"bob", 1001).is_err());

        assert!(verify_owner(b"alice", b"bob", 0).is_err());
    }

    #[test]
    fn test_from_owner() {
        let s = script(10);
        let owner = s.to_identity().unwrap();
        assert_eq!(Script::from_owner(owner.as_bytes()).unwrap(), Some(s));
        assert_eq!(Script::from_owner(b"plain").unwrap(), None);
    }

    #[test]
    fn test_claim_key() {
        assert_eq!(claim_key(&[0xab, 0x01]), "htlc.claim.preimage.ab01");
    }
}
