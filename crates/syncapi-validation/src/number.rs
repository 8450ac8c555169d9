//! Decimal integer predicates for numeric path parameters

use crate::error::{ValidationError, ValidationResult};

fn digits(raw: &str) -> ValidationResult<&str> {
    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedInteger(raw.to_string()));
    }
    Ok(raw)
}

/// Parse a non-negative integer that fits an `int4` column
pub fn parse_positive_i32(raw: &str) -> ValidationResult<i32> {
    digits(raw)?
        .parse::<i32>()
        .map_err(|_| ValidationError::OutOfRange(raw.to_string()))
}

/// Parse a non-negative integer that fits an `int8` column
pub fn parse_positive_i64(raw: &str) -> ValidationResult<i64> {
    digits(raw)?
        .parse::<i64>()
        .map_err(|_| ValidationError::OutOfRange(raw.to_string()))
}
