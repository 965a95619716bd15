//! Error types for token proof operations

use thiserror::Error;

/// Result type for token proof operations
pub type Result<T> = std::result::Result<T, ZkatError>;

/// Token proof errors
#[derive(Debug, Error)]
pub enum ZkatError {
    /// Malformed input: length mismatches, missing fields, bad witnesses
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A recomputed challenge or equation did not match the proof
    #[error("{0}")]
    InvalidProof(String),

    /// Value exceeds the maximum allowed by the public parameters
    #[error("value of token outside authorized range: [{value}] exceeds [{max}]")]
    OutOfRange { value: u64, max: u64 },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Identity, signer or verifier failure
    #[error("{0}")]
    Identity(String),

    /// Ledger access failure
    #[error("{0}")]
    Ledger(String),

    /// Audit mismatch
    #[error("{0}")]
    Audit(String),

    /// Public parameters are not valid
    #[error("invalid public parameters: {0}")]
    InvalidParameters(String),

    /// Driver registry failure
    #[error("{0}")]
    Registry(String),

    /// Error with context added while propagating
    #[error("{context}: {source}")]
    Context {
        /// What was being done when `source` occurred
        context: String,
        /// Underlying error
        #[source]
        source: Box<ZkatError>,
    },
}

impl ZkatError {
    /// Wraps this error with a context message.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        ZkatError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error of a context chain.
    pub fn root(&self) -> &ZkatError {
        match self {
            ZkatError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Adds context to errors returned by fallible operations.
pub trait ResultExt<T> {
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.wrap(f()))
    }
}

impl From<serde_json::Error> for ZkatError {
    fn from(e: serde_json::Error) -> Self {
        ZkatError::Serialization(e.to_string())
    }
}

impl From<ark_serialize::SerializationError> for ZkatError {
    fn from(e: ark_serialize::SerializationError) -> Self {
        ZkatError::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for ZkatError {
    fn from(e: hex::FromHexError) -> Self {
        ZkatError::Serialization(e.to_string())
    }
}
