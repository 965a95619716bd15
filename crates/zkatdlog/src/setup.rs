//! Public parameters
//!
//! Everything a participant needs to produce or check proofs: Pedersen
//! generators, the parameters of the configured range proof engine, the
//! issuing policy for anonymous issuers and the auditor and issuer
//! identities. Parameters are never changed in place; the `with_*` methods
//! return an updated copy that must be redistributed as a whole.

use log::debug;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{RangeEngine, SetupConfig};
use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::Identity;
use crate::math::{self, encoding, CurveID, Zero, G1};
use crate::range::membership::MembershipParams;
use crate::rp::RangeProofParams;

/// Identifier of this driver's public parameters
pub const DLOG_PUBLIC_PARAMETERS: &str = "zkatdlog";
/// Precision of token quantities
pub const DEFAULT_PRECISION: u64 = 64;

/// Envelope distributed to participants
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPublicParameters {
    #[serde(rename = "Identifier")]
    pub identifier: String,
    #[serde(rename = "Raw", with = "hex")]
    pub raw: Vec<u8>,
}

/// Public keys of the issuers allowed to issue anonymously
///
/// The list is padded with random elements to a power of two so that
/// one-out-of-many proofs can run over it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuingPolicy {
    #[serde(with = "encoding::canonical_vec")]
    pub issuers: Vec<G1>,
    /// Number of real issuers at the front of `issuers`
    pub issuers_number: usize,
    /// `log2(issuers.len())`
    pub bit_length: u64,
}

impl IssuingPolicy {
    pub fn new<R: RngCore + CryptoRng>(issuers: Vec<G1>, rng: &mut R) -> Result<Self> {
        if issuers.is_empty() {
            return Err(ZkatError::InvalidInput("issuing policy needs at least one issuer".into()));
        }
        let issuers_number = issuers.len();
        let size = issuers_number.next_power_of_two().max(2);
        let mut issuers = issuers;
        while issuers.len() < size {
            issuers.push(math::rand_g1(rng));
        }
        Ok(Self {
            issuers,
            issuers_number,
            bit_length: size.trailing_zeros() as u64,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let expected = u32::try_from(self.bit_length)
            .ok()
            .and_then(|b| 1usize.checked_shl(b));
        if expected != Some(self.issuers.len()) {
            return Err(ZkatError::InvalidParameters(format!(
                "issuing policy: number of issuers [{}] is not 2^[{}]",
                self.issuers.len(),
                self.bit_length
            )));
        }
        if self.issuers_number > self.issuers.len() {
            return Err(ZkatError::InvalidParameters("issuing policy: too many declared issuers".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicParams {
    /// Driver label, also the envelope identifier
    #[serde(skip)]
    pub label: String,
    pub curve: CurveID,
    /// `(G0, G1, G2)`: type, value and blinding bases
    #[serde(with = "encoding::canonical_vec")]
    pub pedersen_generators: Vec<G1>,
    /// Set when the bulletproof engine is configured
    #[serde(default)]
    pub range_proof_params: Option<RangeProofParams>,
    /// Set when the membership engine is configured
    #[serde(default)]
    pub membership_params: Option<MembershipParams>,
    #[serde(with = "hex", default)]
    pub idemix_issuer_pk: Vec<u8>,
    #[serde(default)]
    pub auditor: Identity,
    #[serde(default)]
    pub issuer_ids: Vec<Identity>,
    #[serde(default)]
    pub issuing_policy: IssuingPolicy,
    pub max_token: u64,
    pub quantity_precision: u64,
}

/// Generates fresh public parameters
pub fn setup<R: RngCore + CryptoRng>(config: &SetupConfig, rng: &mut R) -> Result<PublicParams> {
    let pedersen_generators = (0..3).map(|_| math::rand_g1(&mut *rng)).collect();
    let (range_proof_params, membership_params) = match config.engine {
        RangeEngine::Bulletproof => (
            Some(RangeProofParams::new(config.bit_length).context(|| "failed to generate range-proof parameters")?),
            None,
        ),
        RangeEngine::Membership => (
            None,
            Some(
                MembershipParams::new(config.base, config.exponent, rng)
                    .context(|| "failed to generate membership parameters")?,
            ),
        ),
    };
    let mut pp = PublicParams {
        label: config.label.clone(),
        curve: CurveID::Bn254,
        pedersen_generators,
        range_proof_params,
        membership_params,
        idemix_issuer_pk: config.idemix_issuer_pk.clone(),
        auditor: Identity::default(),
        issuer_ids: Vec::new(),
        issuing_policy: IssuingPolicy::default(),
        max_token: 0,
        quantity_precision: DEFAULT_PRECISION,
    };
    pp.max_token = pp.compute_max_token_value();
    debug!(
        "generated public parameters [{}] with {:?} range proofs, max token [{}]",
        pp.label, config.engine, pp.max_token
    );
    Ok(pp)
}

impl PublicParams {
    pub fn identifier(&self) -> &str {
        &self.label
    }

    pub fn range_engine(&self) -> RangeEngine {
        if self.membership_params.is_some() {
            RangeEngine::Membership
        } else {
            RangeEngine::Bulletproof
        }
    }

    pub fn range_proof_params(&self) -> Result<&RangeProofParams> {
        self.range_proof_params
            .as_ref()
            .ok_or_else(|| ZkatError::InvalidParameters("nil range proof parameters".into()))
    }

    pub fn membership_params(&self) -> Result<&MembershipParams> {
        self.membership_params
            .as_ref()
            .ok_or_else(|| ZkatError::InvalidParameters("nil membership parameters".into()))
    }

    /// Largest quantity a single token can carry
    pub fn compute_max_token_value(&self) -> u64 {
        match (&self.membership_params, &self.range_proof_params) {
            (Some(mp), _) => mp.max_value(),
            (None, Some(rp)) => rp.max_value(),
            (None, None) => 0,
        }
    }

    pub fn max_token_value(&self) -> u64 {
        self.max_token
    }

    pub fn precision(&self) -> u64 {
        self.quantity_precision
    }

    pub fn auditors(&self) -> Vec<Identity> {
        if self.auditor.is_none() {
            Vec::new()
        } else {
            vec![self.auditor.clone()]
        }
    }

    pub fn issuers(&self) -> &[Identity] {
        &self.issuer_ids
    }

    /// Copy of these parameters with `auditor` set
    pub fn with_auditor(&self, auditor: Identity) -> Self {
        Self {
            auditor,
            ..self.clone()
        }
    }

    /// Copy of these parameters with `issuer` authorized
    pub fn with_issuer(&self, issuer: Identity) -> Self {
        let mut pp = self.clone();
        pp.issuer_ids.push(issuer);
        pp
    }

    /// Copy of these parameters authorizing the anonymous issuers `issuers`
    pub fn with_issuing_policy<R: RngCore + CryptoRng>(&self, issuers: Vec<G1>, rng: &mut R) -> Result<Self> {
        Ok(Self {
            issuing_policy: IssuingPolicy::new(issuers, rng)?,
            ..self.clone()
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let raw = serde_json::to_vec(self)?;
        Ok(serde_json::to_vec(&SerializedPublicParameters {
            identifier: self.label.clone(),
            raw,
        })?)
    }

    /// Parses parameters distributed under `label`
    pub fn deserialize(raw: &[u8], label: &str) -> Result<Self> {
        let envelope: SerializedPublicParameters = serde_json::from_slice(raw)
            .map_err(ZkatError::from)
            .context(|| "failed parsing public parameters")?;
        if envelope.identifier != label {
            return Err(ZkatError::InvalidParameters(format!(
                "invalid identifier, expecting [{}], got [{}]",
                label, envelope.identifier
            )));
        }
        let mut pp: Self = serde_json::from_slice(&envelope.raw)
            .map_err(ZkatError::from)
            .context(|| "failed unmarshalling public parameters")?;
        pp.label = envelope.identifier;
        Ok(pp)
    }

    /// SHA-256 of the serialized parameters
    pub fn compute_hash(&self) -> Result<Vec<u8>> {
        let raw = self.serialize().context(|| "failed to serialize public params")?;
        Ok(Sha256::digest(&raw).to_vec())
    }

    pub fn validate(&self) -> Result<()> {
        if self.curve != CurveID::Bn254 {
            return Err(ZkatError::InvalidParameters(format!("invalid curveID [{:?}]", self.curve)));
        }
        if self.pedersen_generators.len() != 3 {
            return Err(ZkatError::InvalidParameters(format!(
                "invalid pedersen generators: expect [3], got [{}]",
                self.pedersen_generators.len()
            )));
        }
        if self.pedersen_generators.iter().any(|g| g.is_zero()) {
            return Err(ZkatError::InvalidParameters(
                "invalid pedersen generators: generator is the identity".into(),
            ));
        }
        match (&self.range_proof_params, &self.membership_params) {
            (Some(rp), None) => rp.validate()?,
            (None, Some(mp)) => mp.validate()?,
            (None, None) => return Err(ZkatError::InvalidParameters("nil range proof parameters".into())),
            (Some(_), Some(_)) => {
                return Err(ZkatError::InvalidParameters(
                    "more than one range proof engine configured".into(),
                ))
            }
        }
        if self.quantity_precision != DEFAULT_PRECISION {
            return Err(ZkatError::InvalidParameters(format!(
                "quantity precision should be [{}] instead it is [{}]",
                DEFAULT_PRECISION, self.quantity_precision
            )));
        }
        let max_token = self.compute_max_token_value();
        if max_token != self.max_token {
            return Err(ZkatError::InvalidParameters(format!(
                "invalid max token, [{}]!=[{}]",
                max_token, self.max_token
            )));
        }
        if !self.issuing_policy.issuers.is_empty() {
            self.issuing_policy.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_setup_bulletproof() {
        let pp = setup(&SetupConfig::bulletproof(32), &mut OsRng).unwrap();
        pp.validate().unwrap();
        assert_eq!(pp.range_engine(), RangeEngine::Bulletproof);
        assert_eq!(pp.max_token_value(), (1u64 << 32) - 1);
        assert_eq!(pp.identifier(), DLOG_PUBLIC_PARAMETERS);
    }

    #[test]
    fn test_setup_membership() {
        let pp = setup(&SetupConfig::membership(100, 2), &mut OsRng).unwrap();
        pp.validate().unwrap();
        assert_eq!(pp.range_engine(), RangeEngine::Membership);
        assert_eq!(pp.max_token_value(), 9999);
    }

    #[test]
    fn test_serialization() {
        let pp = setup(&SetupConfig::membership(4, 2), &mut OsRng)
            .unwrap()
            .with_auditor(Identity::new(b"auditor".to_vec()));
        let raw = pp.serialize().unwrap();
        assert_eq!(PublicParams::deserialize(&raw, DLOG_PUBLIC_PARAMETERS).unwrap(), pp);

        let err = PublicParams::deserialize(&raw, "fabtoken").unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid identifier, expecting [fabtoken], got [zkatdlog]"));
    }

    #[test]
    fn test_copy_on_write() {
        let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng).unwrap();
        let hash = pp.compute_hash().unwrap();

        let updated = pp.with_issuer(Identity::new(b"issuer".to_vec()));
        assert!(pp.issuers().is_empty());
        assert_eq!(updated.issuers().len(), 1);
        assert_ne!(updated.compute_hash().unwrap(), hash);
        assert_eq!(pp.compute_hash().unwrap(), hash);

        assert!(pp.auditors().is_empty());
        assert_eq!(pp.with_auditor(Identity::new(b"a".to_vec())).auditors().len(), 1);
    }

    #[test]
    fn test_issuing_policy_padding() {
        let issuers: Vec<G1> = (0..3).map(|_| math::rand_g1(&mut OsRng)).collect();
        let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng)
            .unwrap()
            .with_issuing_policy(issuers.clone(), &mut OsRng)
            .unwrap();
        let policy = &pp.issuing_policy;
        assert_eq!(policy.issuers.len(), 4);
        assert_eq!(policy.bit_length, 2);
        assert_eq!(policy.issuers_number, 3);
        assert_eq!(&policy.issuers[..3], &issuers[..]);
        pp.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_tampering() {
        let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng).unwrap();

        let mut bad = pp.clone();
        bad.max_token += 1;
        assert!(bad.validate().unwrap_err().to_string().contains("invalid max token"));

        let mut bad = pp.clone();
        bad.pedersen_generators.pop();
        assert!(bad.validate().is_err());

        let mut bad = pp;
        bad.quantity_precision = 32;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_issuing_policy_bit_length_overflow() {
        let issuers = vec![math::rand_g1(&mut OsRng)];
        let mut pp = setup(&SetupConfig::bulletproof(16), &mut OsRng)
            .unwrap()
            .with_issuing_policy(issuers, &mut OsRng)
            .unwrap();

        for bit_length in [64, 200, u64::MAX] {
            pp.issuing_policy.bit_length = bit_length;
            let raw = pp.serialize().unwrap();
            let err = (crate::driver::zkatdlog_driver().public_params)(&raw).unwrap_err();
            assert!(err.to_string().contains("is not 2^"));
            assert!(pp.issuing_policy.validate().is_err());
        }
    }
}
