//! # zkatdlog - Confidential Tokens over Discrete-Log Commitments
//!
//! Issue, transfer, audit and validation of tokens whose type and value are
//! hidden in Pedersen commitments, with zero-knowledge proofs that keep the
//! ledger publicly verifiable.
//!
//! ## Features
//!
//! - **Tokens**: `G0^H(type)·G1^value·G2^bf` commitments with an owner
//! - **Issue proofs**: well-formedness plus range correctness, with the type
//!   disclosed or hidden behind an anonymous issuer
//! - **Transfer proofs**: conservation of value and type across inputs and
//!   outputs, range correctness of the outputs
//! - **Range proofs**: bulletproofs (inner-product argument) or membership
//!   proofs against a table of Pointcheval-Sanders signed digits
//! - **Anonymous issuers**: one-out-of-many proofs over the issuing policy
//! - **Auditing**: opening and owner checks before endorsement
//! - **Validation**: the accept/reject state machine run by the ledger
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          zkatdlog                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  validator  │  audit  │  issue  │  transfer  │  driver        │
//! └──────────────────────────────────────────────────────────────┘
//!        │            │         │          │
//!        ├─ request   │         ├─ anonym ─┼─ o2omp
//!        └─ identity ─┘         └─ range ──┴─ rp (bulletproof)
//!                                          └─ membership ─ sigproof ─ pssign
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use zkatdlog::config::SetupConfig;
//! use zkatdlog::identity::schnorr::SchnorrSigningIdentity;
//! use zkatdlog::issue::{self, Issuer};
//! use zkatdlog::setup::setup;
//! use rand::rngs::OsRng;
//!
//! // 1. Public parameters: values up to 100^2 - 1
//! let pp = setup(&SetupConfig::membership(100, 2), &mut OsRng).unwrap();
//!
//! // 2. Issue two tokens of type "ABC"
//! let issuer = SchnorrSigningIdentity::new(&mut OsRng);
//! let alice = SchnorrSigningIdentity::new(&mut OsRng);
//! let owners = vec![alice.identity().into_bytes(); 2];
//! let (action, metadata) = Issuer::new("ABC", &issuer, &pp)
//!     .generate_zk_issue(&[50, 20], owners, &mut OsRng)
//!     .unwrap();
//!
//! // 3. Anyone can check the proof
//! issue::Verifier::new(action.get_commitments(), false, &pp)
//!     .verify(&action.proof)
//!     .unwrap();
//!
//! // 4. The recipient opens its token
//! let clear = action.outputs[0].to_clear(&metadata[0], &pp.pedersen_generators).unwrap();
//! assert_eq!(clear.quantity, "0x32");
//! ```
//!
//! ## Security Considerations
//!
//! - Proofs are made non-interactive with SHA-256 Fiat-Shamir transcripts
//!   over canonical compressed encodings
//! - Every prover takes its RNG explicitly; use `OsRng` or another CSPRNG
//! - Challenges are compared in constant time
//! - Public parameters are immutable once loaded; updates produce new ones

pub mod audit;
pub mod common;
pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod issue;
pub mod math;
pub mod o2omp;
pub mod pssign;
pub mod range;
pub mod request;
pub mod rp;
pub mod setup;
pub mod sigproof;
pub mod token;
pub mod transfer;
pub mod validator;

// Re-export main types
pub use audit::{AuditableToken, Auditor};
pub use config::{RangeEngine, SetupConfig};
pub use driver::DriverRegistry;
pub use error::{Result, ResultExt, ZkatError};
pub use issue::{IssueAction, Issuer};
pub use request::{TokenRequest, TokenRequestMetadata};
pub use setup::{setup, PublicParams};
pub use token::{ClearToken, Metadata, Token, TokenDataWitness, TokenID};
pub use transfer::{Sender, TransferAction};
pub use validator::{Action, Validator};
