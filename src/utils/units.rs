//! Fixed-point unit conversion
//!
//! Token amounts are `u128` integers scaled by `10^decimals` (18 by default,
//! like wei). These helpers convert to and from human-readable decimals.

use crate::errors::ConfigError;

/// Default number of decimal places for token amounts
pub const DEFAULT_DECIMALS: u8 = 18;

/// Largest `decimals` whose scale fits in a `u128`
pub const MAX_DECIMALS: u8 = 38;

/// Fixed-point one (1e18), used for prices and share fractions
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// `10^decimals`, `None` past [`MAX_DECIMALS`]
pub fn scale(decimals: u8) -> Option<u128> {
    10u128.checked_pow(decimals as u32)
}

/// Parse a decimal string ("100", "0.5") into base units
pub fn parse_units(input: &str, decimals: u8) -> Result<u128, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidAmount {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim().replace('_', "");
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed.as_str(), ""),
    };

    if fraction.len() > decimals as usize {
        return Err(invalid("too many decimal places"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("out of range"))?
    };

    let fraction_units: u128 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse().map_err(|_| invalid("out of range"))?
    };

    let unit = scale(decimals).ok_or_else(|| invalid("too many decimals"))?;
    whole_units
        .checked_mul(unit)
        .and_then(|w| w.checked_add(fraction_units))
        .ok_or_else(|| invalid("out of range"))
}

/// Format base units as a decimal string, always keeping one fractional digit
/// ("1000.0", "181.818181818181818181")
pub fn format_units(amount: u128, decimals: u8) -> String {
    if decimals == 0 {
        return format!("{}.0", amount);
    }

    // Split the digit string so any `decimals` works without a u128 scale
    let width = decimals as usize;
    let digits = format!("{:0>width$}", amount, width = width + 1);
    let (whole, fraction) = digits.split_at(digits.len() - width);

    let trimmed = fraction.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, trimmed)
    }
}

/// Format a signed delta in base units
pub fn format_signed_units(amount: i128, decimals: u8) -> String {
    let formatted = format_units(amount.unsigned_abs(), decimals);
    if amount < 0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Lossy conversion for charts and summaries
pub fn to_f64(amount: u128, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

pub fn signed_to_f64(amount: i128, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_units("1000", 18).unwrap(), 1000 * WAD);
        assert_eq!(parse_units("0.5", 18).unwrap(), WAD / 2);
        assert_eq!(parse_units(".25", 18).unwrap(), WAD / 4);
        assert_eq!(parse_units("1_000", 6).unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("0.1234567", 6).is_err());
    }

    #[test]
    fn test_format_like_ethers() {
        assert_eq!(format_units(1000 * WAD, 18), "1000.0");
        assert_eq!(format_units(181_818_181_818_181_818_181, 18), "181.818181818181818181");
        assert_eq!(format_units(WAD / 2, 18), "0.5");
        assert_eq!(format_signed_units(-(WAD as i128) * 3 / 2, 18), "-1.5");
    }

    #[test]
    fn test_wide_decimals_do_not_overflow() {
        assert_eq!(scale(MAX_DECIMALS), Some(10u128.pow(38)));
        assert_eq!(scale(MAX_DECIMALS + 1), None);

        assert_eq!(format_units(1, 40), "0.0000000000000000000000000000000000000001");
        assert_eq!(format_units(u128::MAX, 0), format!("{}.0", u128::MAX));
        assert_eq!(format_units(15, 1), "1.5");
        assert!(matches!(
            parse_units("1", 40),
            Err(ConfigError::InvalidAmount { .. })
        ));
        assert!((to_f64(5, 40) - 5e-40).abs() < 1e-50);
    }
}
