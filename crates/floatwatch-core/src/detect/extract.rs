//! Amount and merchant extraction
//!
//! Pure text scans that pull a monetary amount and a best-effort merchant
//! label out of raw snippet text. Extraction misses are never errors: the
//! caller gets `None` (amount) or a fixed placeholder (merchant).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Money;

/// Strict money pattern: grouped thousands, exactly two fraction digits,
/// optional sign. Matches "¥-12.50", "1,234.00", "+3.99".
static STRICT_AMOUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d{1,3}(?:,\d{3})*\.\d{2}").unwrap());

/// Loose fallback: any digit run, optionally with two fraction digits.
/// View IDs change with app updates; a forgiving number scan is more robust
/// than anchoring on layout.
static LOOSE_AMOUNT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d{2})?").unwrap());

/// Fixed merchant placeholder used when no stronger signal is available.
/// Users usually edit the description before committing anyway.
pub const MERCHANT_FALLBACK: &str = "自动识别交易";

/// Extract the first amount in document order.
///
/// The strict pattern always wins over the loose one, even when the loose
/// pattern would match earlier in the text. A loose match of "0.00" is the
/// extraction-miss sentinel and comes back as `None`.
pub fn extract_amount(text: &str) -> Option<Money> {
    if let Some(m) = STRICT_AMOUNT_PATTERN.find(text) {
        return Money::from_match(m.as_str());
    }
    LOOSE_AMOUNT_PATTERN
        .find(text)
        .and_then(|m| Money::from_match(m.as_str()))
}

/// Best-effort merchant extraction.
///
/// Stub extension point: merchant labels are hard to generalize across app
/// layouts, so this returns the fixed placeholder until a per-app strategy
/// exists.
pub fn extract_merchant(_text: &str) -> String {
    MERCHANT_FALLBACK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_match_verbatim() {
        let m = extract_amount("支付成功 ¥-12.50").unwrap();
        assert_eq!(m.as_str(), "-12.50");

        let m = extract_amount("total 1,234.56 yuan").unwrap();
        assert_eq!(m.as_str(), "1,234.56");
    }

    #[test]
    fn test_first_strict_match_wins_in_document_order() {
        let m = extract_amount("paid 3.50 then 99.99").unwrap();
        assert_eq!(m.as_str(), "3.50");
    }

    #[test]
    fn test_strict_beats_earlier_loose() {
        // "12" (loose) appears before "45.00" (strict); strict wins.
        let m = extract_amount("order 12 items for 45.00").unwrap();
        assert_eq!(m.as_str(), "45.00");
    }

    #[test]
    fn test_loose_fallback() {
        let m = extract_amount("Your balance is now 100").unwrap();
        assert_eq!(m.as_str(), "100");
        assert_eq!(m.display(), "100.00");
    }

    #[test]
    fn test_loose_with_fraction() {
        let m = extract_amount("received 20.00 today").unwrap();
        assert_eq!(m.as_str(), "20.00");
    }

    #[test]
    fn test_no_match_is_absent() {
        assert!(extract_amount("payment succeeded").is_none());
        assert!(extract_amount("").is_none());
    }

    #[test]
    fn test_zero_sentinel_is_absent() {
        assert!(extract_amount("charged 0.00").is_none());
    }

    #[test]
    fn test_merchant_fallback() {
        assert_eq!(extract_merchant("anything"), "自动识别交易");
    }
}
