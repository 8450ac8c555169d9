//! Validation error types

use thiserror::Error;

/// Reasons a raw parameter was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Empty input
    #[error("value is empty")]
    Empty,

    /// Input is not a plain decimal integer
    #[error("malformed integer: {0}")]
    MalformedInteger(String),

    /// Integer parsed but falls outside the accepted range
    #[error("integer out of range: {0}")]
    OutOfRange(String),

    /// Bech32 decoding failed
    #[error("bech32 error: {0}")]
    Bech32(#[from] Bech32Error),

    /// Human readable part is not a stake address prefix
    #[error("unexpected address prefix: {0}")]
    UnexpectedPrefix(String),

    /// Decoded payload has the wrong size
    #[error("invalid address length: expected 29 bytes, got {0}")]
    InvalidLength(usize),

    /// Header byte does not describe a reward address
    #[error("not a reward address header: {0:#04x}")]
    NotRewardAddress(u8),

    /// Header network id disagrees with the prefix
    #[error("network id {network_id} does not match prefix {prefix}")]
    NetworkMismatch {
        /// Prefix found in the input
        prefix: String,
        /// Network id found in the header byte
        network_id: u8,
    },
}

/// Bech32 decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Bech32Error {
    /// Input longer than the accepted limit
    #[error("input too long: {0} characters")]
    TooLong(usize),

    /// Upper and lower case characters mixed
    #[error("mixed case")]
    MixedCase,

    /// No `1` separator, or it is misplaced
    #[error("missing or misplaced separator")]
    MissingSeparator,

    /// Character outside the printable range in the human readable part
    #[error("invalid character in prefix: {0:?}")]
    InvalidPrefixChar(char),

    /// Character outside the bech32 alphabet in the data part
    #[error("invalid data character: {0:?}")]
    InvalidDataChar(char),

    /// Checksum does not verify
    #[error("invalid checksum")]
    InvalidChecksum,

    /// Leftover bits when regrouping 5-bit words into bytes
    #[error("invalid padding")]
    InvalidPadding,
}

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;
