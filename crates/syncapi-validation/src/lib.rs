//! # syncapi-validation
//!
//! Pure validation predicates for raw path and query parameters.
//!
//! Every predicate works on the raw string exactly as it arrived in the
//! request. Nothing here performs I/O, and a rejected value never reaches
//! the database layer.
//!
//! ## Parameter kinds
//!
//! | Kind | Accepted input |
//! |------|----------------|
//! | [`ParamKind::StakeAddress`] | bech32 reward address (`stake1...` / `stake_test1...`) |
//! | [`ParamKind::PositiveSignedInt`] | decimal integer in `0..=i32::MAX` |
//! | [`ParamKind::PositiveSignedBigInt`] | decimal integer in `0..=i64::MAX` |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod bech32;
pub mod error;
pub mod number;

pub use address::{StakeAddress, StakeCredential};
pub use error::{ValidationError, ValidationResult};
pub use number::{parse_positive_i32, parse_positive_i64};

/// Parameter formats understood by [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Bech32 encoded stake (reward) address
    StakeAddress,
    /// Non-negative integer that fits a signed 32-bit column
    PositiveSignedInt,
    /// Non-negative integer that fits a signed 64-bit column
    PositiveSignedBigInt,
}

impl ParamKind {
    /// Parse `raw` according to this kind
    pub fn check(self, raw: &str) -> ValidationResult<()> {
        match self {
            ParamKind::StakeAddress => StakeAddress::parse(raw).map(|_| ()),
            ParamKind::PositiveSignedInt => parse_positive_i32(raw).map(|_| ()),
            ParamKind::PositiveSignedBigInt => parse_positive_i64(raw).map(|_| ()),
        }
    }
}

/// Returns `true` when `raw` is present and well-formed for `kind`.
pub fn validate(kind: ParamKind, raw: Option<&str>) -> bool {
    match raw {
        Some(value) => kind.check(value).is_ok(),
        None => false,
    }
}
