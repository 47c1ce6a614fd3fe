//! Hex parameter parsing. EIP-1474 quantities are `0x`-prefixed with no
//! leading zeros; data is `0x`-prefixed with an even digit count. Strictness
//! is gated by the dispatcher's `strict_hex_format` flag: the lenient mode
//! tolerates leading zeros and a missing prefix.

use crate::{ErrorCode, ErrorObject};
use alloy_primitives::U256;

fn invalid(message: &str) -> ErrorObject {
    ErrorObject::with_message(ErrorCode::InvalidParams, message)
}

fn strip_prefix(input: &str, strict: bool) -> Result<&str, ErrorObject> {
    match input.strip_prefix("0x") {
        Some(digits) => Ok(digits),
        None if strict => Err(invalid("quantity must be 0x-prefixed")),
        None => Ok(input),
    }
}

fn check_quantity_digits(digits: &str, strict: bool) -> Result<(), ErrorObject> {
    if digits.is_empty() {
        return Err(invalid("quantity has no digits"));
    }
    if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(invalid("quantity has non-hex digits"));
    }
    if strict && digits.len() > 1 && digits.starts_with('0') {
        return Err(invalid("quantity has leading zeros"));
    }
    Ok(())
}

/// Parses a hex quantity into a `u64`.
pub fn parse_quantity_u64(input: &str, strict: bool) -> Result<u64, ErrorObject> {
    let digits = strip_prefix(input, strict)?;
    check_quantity_digits(digits, strict)?;
    u64::from_str_radix(digits, 16).map_err(|_| invalid("quantity out of range"))
}

/// Parses a hex quantity into a [U256].
pub fn parse_quantity_u256(input: &str, strict: bool) -> Result<U256, ErrorObject> {
    let digits = strip_prefix(input, strict)?;
    check_quantity_digits(digits, strict)?;
    U256::from_str_radix(digits, 16).map_err(|_| invalid("quantity out of range"))
}

/// Parses hex data into bytes. Data keeps its leading zeros but must have an
/// even number of digits.
pub fn parse_data(input: &str, strict: bool) -> Result<Vec<u8>, ErrorObject> {
    let digits = strip_prefix(input, strict)?;
    if digits.len() % 2 != 0 {
        return Err(invalid("data has an odd number of hex digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|index| {
            u8::from_str_radix(&digits[index..index + 2], 16)
                .map_err(|_| invalid("data has non-hex digits"))
        })
        .collect()
}

/// Formats a value as a minimal hex quantity.
pub fn to_quantity(value: impl Into<U256>) -> String {
    let value = value.into();
    if value.is_zero() {
        "0x0".to_string()
    } else {
        format!("0x{value:x}")
    }
}
