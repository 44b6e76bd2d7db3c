//! Display units <-> ledger base units, and operator-entered addresses.
//!
//! Amounts cross the ledger boundary as base-unit integers. The operator types
//! decimal display units; the two are related by a fixed scale of
//! `10^decimals` (18 by default, so "1.5" is 1500000000000000000).

use crate::error::{Result, WalletError};
use alloy_primitives::utils::format_units;
use alloy_primitives::{Address, U256};
use std::str::FromStr;

pub const DEFAULT_DECIMALS: u8 = 18;

/// Parse a strictly positive display amount into base units.
///
/// Accepts plain decimal digits with at most `decimals` fractional digits.
/// Empty, non-numeric, signed, zero, over-precise and out-of-range amounts
/// are all rejected with the same validation error; nothing is rounded.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256> {
    let input = input.trim();
    let (whole, frac) = input.split_once('.').unwrap_or((input, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(WalletError::InvalidAmount);
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) || frac.len() > usize::from(decimals) {
        return Err(WalletError::InvalidAmount);
    }

    let ten = U256::from(10u8);
    let padding = usize::from(decimals) - frac.len();
    let mut value = U256::ZERO;
    for digit in whole.bytes().chain(frac.bytes()).map(|b| b - b'0').chain(std::iter::repeat(0).take(padding)) {
        value = value
            .checked_mul(ten)
            .and_then(|v| v.checked_add(U256::from(digit)))
            .ok_or(WalletError::InvalidAmount)?;
    }
    if value.is_zero() {
        return Err(WalletError::InvalidAmount);
    }
    Ok(value)
}

/// Render base units for display: "1.5", "2.0", "0.0".
pub fn format_amount(value: U256, decimals: u8) -> String {
    let raw = match format_units(value, decimals) {
        Ok(raw) => raw,
        Err(_) => return value.to_string(),
    };
    match raw.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() { format!("{whole}.0") } else { format!("{whole}.{frac}") }
        }
        None => raw,
    }
}

/// Parse an operator-entered ledger address.
///
/// Accepts 40 hex digits with or without `0x`. All-lowercase and
/// all-uppercase forms are taken as-is; mixed case must carry a valid
/// EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address> {
    let input = input.trim();
    let digits = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")).unwrap_or(input);
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidRecipient);
    }
    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{digits}"), None).map_err(|_| WalletError::InvalidRecipient)
    } else {
        Address::from_str(digits).map_err(|_| WalletError::InvalidRecipient)
    }
}
