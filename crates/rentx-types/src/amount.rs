//! # Amounts
//!
//! Conversion between caller-facing decimal strings (`"0.001"`) and the
//! integer base units chains operate on (`100000` satoshis).

use crate::errors::AmountError;

/// Parse a decimal amount into base units of an asset with `decimals` places.
///
/// Trailing zeros beyond the supported precision are accepted.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<u64, AmountError> {
    let trimmed = amount.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
    {
        return Err(AmountError::Invalid(amount.to_string()));
    }

    let width = usize::try_from(decimals).map_err(|_| AmountError::Overflow(amount.to_string()))?;
    let fraction = if fraction.len() > width {
        let (kept, dropped) = fraction.split_at(width);
        if dropped.bytes().any(|b| b != b'0') {
            return Err(AmountError::TooPrecise {
                amount: amount.to_string(),
                decimals,
            });
        }
        kept
    } else {
        fraction
    };

    let overflow = || AmountError::Overflow(amount.to_string());
    let scale = 10u64.checked_pow(decimals).ok_or_else(overflow)?;
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };

    let mut fractional: u64 = 0;
    for (i, digit) in fraction.bytes().enumerate() {
        let place = 10u64
            .checked_pow(decimals - 1 - u32::try_from(i).map_err(|_| overflow())?)
            .ok_or_else(overflow)?;
        fractional += u64::from(digit - b'0') * place;
    }

    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fractional))
        .ok_or_else(overflow)
}

/// Render base units as a decimal string without trailing zeros.
#[must_use]
pub fn from_base_units(value: u64, decimals: u32) -> String {
    let Some(scale) = 10u64.checked_pow(decimals) else {
        return value.to_string();
    };
    if decimals == 0 {
        return value.to_string();
    }
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
