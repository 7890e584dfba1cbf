//! Decimal ether strings and their wei values.

use crate::{TypesError, ETHER_DECIMALS, WEI_PER_ETHER};

/// Parse a decimal ether amount such as `"0.045"` into wei.
///
/// # Errors
///
/// [`TypesError::InvalidAmount`] for empty input, signs, non-digits, more
/// than 18 fractional digits, or values that overflow `u128`.
pub fn parse_ether(value: &str) -> crate::Result<u128> {
    let invalid = |reason| TypesError::InvalidAmount {
        value: value.to_string(),
        reason,
    };

    let trimmed = value.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("empty amount"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("not a decimal number"));
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(invalid("more than 18 fractional digits"));
    }

    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .ok()
            .and_then(|w| w.checked_mul(WEI_PER_ETHER))
            .ok_or_else(|| invalid("amount too large"))?
    };
    let fraction_wei = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = ETHER_DECIMALS);
        padded
            .parse::<u128>()
            .map_err(|_| invalid("not a decimal number"))?
    };

    whole_wei
        .checked_add(fraction_wei)
        .ok_or_else(|| invalid("amount too large"))
}

/// Format wei as a decimal ether string, always with at least one
/// fractional digit (`1.0`, `0.045`).
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let fraction = wei % WEI_PER_ETHER;
    let digits = format!("{fraction:0width$}", width = ETHER_DECIMALS);
    let trimmed = digits.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{trimmed}")
    }
}
