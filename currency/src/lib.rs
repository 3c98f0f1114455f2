//! Balance strings with an SI-style suffix, expanded to or formatted from atomic units.
//!
//! Units, smallest to largest, each a thousand times the last:
//!
//! ```text
//! atto  (a)  10^-18
//! femto (f)  10^-15
//! pico  (p)  10^-12
//! nano  (n)  10^-9
//! micro (u)  10^-6
//! milli (m)  10^-3
//! Token (T)  1
//! ```
//!
//! All suffix letters are lowercase except `T`.

use evml_common::error::{DecodeError, Error};

const TOKEN_LETTERS: &[u8] = b"afpnumT";
const THOU_SEPARATOR: char = ',';
const DEC_SEPARATOR: char = '.';

/// Expands a suffixed balance string into its atomic-unit decimal representation.
///
/// A leading `0x`/`0X` is preserved verbatim (hex balances pass through once the suffix,
/// if any, has been stripped and zero-padded the same way a decimal balance would be).
pub fn expand_currency_string(input: &str) -> String {
    let clean = input.trim();
    if clean.is_empty() {
        return String::new();
    }

    let token = clean.chars().last().unwrap();
    let token_index = TOKEN_LETTERS.iter().position(|&b| b as char == token);

    let Some(token_index) = token_index else {
        return clean.to_string();
    };

    let mut token_power = ((token_index + 1) * 3) as i64 - 3;

    // Drop the suffix letter.
    let mut clean = clean[..clean.len() - 1].to_string();

    if let Some(idx) = clean.find(DEC_SEPARATOR) {
        let pre = &clean[..idx];
        let fraction = &clean[idx + DEC_SEPARATOR.len_utf8()..];
        token_power -= fraction.len() as i64;
        clean = format!("{pre}{fraction}");
    }

    if token_power > 0 {
        clean.push_str(&"0".repeat(token_power as usize));
    }

    strip_leading_zeros(&clean)
}

fn strip_leading_zeros(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut start = 0;
    while start + 1 < bytes.len()
        && bytes[start] == b'0'
        && bytes[start + 1] != b'x'
        && bytes[start + 1] != b'X'
    {
        start += 1;
    }
    input[start..].to_string()
}

/// Expands the input then inserts thousands separators.
pub fn expand_and_separate_currency_string(input: &str) -> String {
    let mut expanded = expand_currency_string(input);
    let mut len = expanded.len();
    while len > 3 {
        len -= 3;
        expanded.insert(len, THOU_SEPARATOR);
    }
    expanded
}

/// Formats an atomic-unit string as a fixed-point decimal with `power` fractional digits
/// (no suffix letter).
pub fn format_unit_string(input: &str, power: usize) -> String {
    let clean = expand_currency_string(input);

    if clean == "0" {
        return clean;
    }

    if clean.len() == 18 {
        return trim_trailing_zeros(&format!("0.{clean}"));
    }

    if clean.len() < 18 {
        let pad = power.saturating_sub(clean.len());
        return trim_trailing_zeros(&format!("0.{}{clean}", "0".repeat(pad)));
    }

    let split = clean.len() - power;
    let suffix = trim_trailing_zeros(&clean[split..]);
    if suffix.is_empty() {
        clean[..split].to_string()
    } else {
        format!("{}.{}", &clean[..split], suffix)
    }
}

fn trim_trailing_zeros(input: &str) -> String {
    input.trim_end_matches('0').to_string()
}

/// [`format_unit_string`] fixed at 18 fractional digits (the atto..Token span).
pub fn format_tenom_string(input: &str) -> String {
    format_unit_string(input, 18)
}

/// Formats an atomic-unit string back into the largest whole suffix unit that fits,
/// e.g. `"1200000000000000000"` -> `"1.2T"`.
pub fn format_currency_string(input: &str) -> String {
    let clean = expand_currency_string(input);

    if clean.len() < 4 {
        return clean;
    }

    let mut strpos = clean.len() / 3;
    if strpos >= TOKEN_LETTERS.len() {
        strpos = TOKEN_LETTERS.len() - 1;
    }
    let token_letter = TOKEN_LETTERS[strpos] as char;

    let mut zero_places = strpos * 3;
    let mut clean = clean;
    while zero_places > 0 && clean.ends_with('0') {
        clean.truncate(clean.len() - 1);
        zero_places -= 1;
    }

    if zero_places == 0 {
        return format!("{clean}{token_letter}");
    }

    let idx = clean.len() - zero_places;
    format!(
        "{}{DEC_SEPARATOR}{}{token_letter}",
        &clean[..idx],
        &clean[idx..]
    )
}

/// Parses an expanded currency string into an integer amount of atomic units.
///
/// `0x`-prefixed input is parsed as hexadecimal; anything else as decimal.
pub fn parse_atomic_units(input: &str) -> Result<u128, Error> {
    let expanded = expand_currency_string(input);
    if let Some(hex) = expanded.strip_prefix("0x").or_else(|| expanded.strip_prefix("0X")) {
        u128::from_str_radix(hex, 16).map_err(|_| Error::Decode(DecodeError::Hex))
    } else {
        expanded
            .parse::<u128>()
            .map_err(|_| Error::Decode(DecodeError::CurrencySuffix(expanded.chars().last().unwrap_or('?'))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1T", "1000000000000000000"; "whole token")]
    #[test_case("1.2T", "1200000000000000000"; "fractional token")]
    #[test_case("200u", "200000000000000"; "micro")]
    #[test_case("1a", "1"; "atto is already atomic")]
    #[test_case("0x10", "0x10"; "hex passes through unchanged")]
    #[test_case("", ""; "empty is empty")]
    #[test_case("42", "42"; "no suffix is trimmed only")]
    fn expands_as_expected(input: &str, expected: &str) {
        assert_eq!(expand_currency_string(input), expected);
    }

    #[test_case("1200000000000000000", "1.2T"; "token with fraction")]
    #[test_case("1000000000000000000", "1T"; "whole token round trip")]
    #[test_case("200000000000000", "200u"; "micro round trip")]
    #[test_case("1", "1"; "below a thousand stays bare")]
    fn formats_as_expected(input: &str, expected: &str) {
        assert_eq!(format_currency_string(input), expected);
    }

    #[test]
    fn round_trips_through_expand_and_format() {
        for original in ["1T", "1.2T", "200u", "999m"] {
            let expanded = expand_currency_string(original);
            let formatted = format_currency_string(&expanded);
            assert_eq!(formatted, original);
        }
    }

    #[test]
    fn separates_thousands() {
        assert_eq!(
            expand_and_separate_currency_string("1T"),
            "1,000,000,000,000,000,000"
        );
    }

    #[test]
    fn parses_atomic_units_from_suffixed_string() {
        assert_eq!(parse_atomic_units("1.2T").unwrap(), 1_200_000_000_000_000_000);
        assert_eq!(parse_atomic_units("0").unwrap(), 0);
    }
}
