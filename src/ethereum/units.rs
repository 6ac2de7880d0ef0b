//! Exact conversion between human decimal amounts and on-chain base units.

use alloy::primitives::U256;

use crate::error::{ClientError, ClientResult};

/// Decimal count of the native currency on the eth-rpc bridge
pub const NATIVE_DECIMALS: u8 = 18;

/// Scale a decimal string such as `"1000.5"` into base units.
///
/// Trailing fractional zeros beyond `decimals` are accepted; any other excess
/// precision is rejected rather than rounded.
pub fn parse_units(amount: &str, decimals: u8) -> ClientResult<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(ClientError::Argument("Amount cannot be empty".to_string()));
    }

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(ClientError::Argument(format!(
            "Invalid amount '{}': no digits",
            amount
        )));
    }

    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ClientError::Argument(format!(
            "Invalid amount '{}': only digits and a single '.' are allowed",
            amount
        )));
    }

    let decimals = decimals as usize;
    let mut fraction = fraction;
    while fraction.len() > decimals && fraction.ends_with('0') {
        fraction = &fraction[..fraction.len() - 1];
    }
    if fraction.len() > decimals {
        return Err(ClientError::Argument(format!(
            "Invalid amount '{}': more than {} decimal places",
            amount, decimals
        )));
    }

    let digits = format!("{}{:0<width$}", whole, fraction, width = decimals);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10).map_err(|_| {
        ClientError::Argument(format!(
            "Invalid amount '{}': does not fit in 256 bits at {} decimals",
            amount, decimals
        ))
    })
}

/// Render base units as a decimal string, keeping at least one fractional digit.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;

    let (whole, fraction) = if digits.len() > decimals {
        let (w, f) = digits.split_at(digits.len() - decimals);
        (w.to_string(), f.to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
    };

    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, fraction)
    }
}

pub fn parse_ether(amount: &str) -> ClientResult<U256> {
    parse_units(amount, NATIVE_DECIMALS)
}

pub fn format_ether(value: U256) -> String {
    format_units(value, NATIVE_DECIMALS)
}
