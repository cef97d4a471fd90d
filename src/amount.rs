// 💰 Amount Parsing - locale-aware decimal parsing for bank exports
//
// "1.500,00" (Brazilian) and "1500.00" (plain) both mean 1500.00; which one a
// column uses is decided per bank layout, never globally.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// `.` thousands, `,` decimal: 1.500,00
    Brazilian,
    /// `,` thousands, `.` decimal: 1,500.00
    Plain,
    /// Decide per value from the separators present
    Auto,
}

impl NumberFormat {
    /// Parse a money cell.
    ///
    /// Understands `R$`, surrounding spaces, a leading `+`/`-`, accounting
    /// parentheses and the trailing `-`, `D` (debit) or `C` (credit) markers
    /// some exports append. Returns `None` for blank or non-numeric cells.
    pub fn parse(&self, raw: &str) -> Option<Decimal> {
        let mut s: String = raw
            .trim()
            .replace("R$", "")
            .replace("r$", "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if s.is_empty() {
            return None;
        }

        let mut negative = false;

        if s.starts_with('(') && s.ends_with(')') {
            negative = true;
            s = s[1..s.len() - 1].to_string();
        }

        if let Some(rest) = s.strip_suffix('-') {
            negative = true;
            s = rest.to_string();
        } else if let Some(rest) = s.strip_suffix(['D', 'd']) {
            negative = true;
            s = rest.to_string();
        } else if let Some(rest) = s.strip_suffix(['C', 'c']) {
            s = rest.to_string();
        }

        if let Some(rest) = s.strip_prefix('-') {
            negative = !negative;
            s = rest.to_string();
        } else if let Some(rest) = s.strip_prefix('+') {
            s = rest.to_string();
        }

        let canonical = match self {
            NumberFormat::Brazilian => s.replace('.', "").replace(',', "."),
            NumberFormat::Plain => s.replace(',', ""),
            NumberFormat::Auto => auto_canonical(&s),
        };

        if canonical.is_empty()
            || !canonical.chars().all(|c| c.is_ascii_digit() || c == '.')
            || canonical.matches('.').count() > 1
        {
            return None;
        }

        let value = Decimal::from_str(&canonical).ok()?;
        Some(if negative { -value } else { value })
    }
}

/// Rewrite a value with unknown separators into `1234.56` form
fn auto_canonical(s: &str) -> String {
    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');

    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) if s.matches(',').count() == 1 => s.replace(',', "."),
        (None, Some(_)) => s.replace(',', ""),
        (Some(_), None) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_brazilian_format() {
        let f = NumberFormat::Brazilian;
        assert_eq!(f.parse("1.500,00"), Some(dec!(1500.00)));
        assert_eq!(f.parse("-250,00"), Some(dec!(-250.00)));
        assert_eq!(f.parse("R$ 1.234.567,89"), Some(dec!(1234567.89)));
        assert_eq!(f.parse("89,90-"), Some(dec!(-89.90)));
        assert_eq!(f.parse("1.500"), Some(dec!(1500)));
    }

    #[test]
    fn test_plain_format() {
        let f = NumberFormat::Plain;
        assert_eq!(f.parse("1500.00"), Some(dec!(1500.00)));
        assert_eq!(f.parse("-89.90"), Some(dec!(-89.90)));
        assert_eq!(f.parse("1,500.00"), Some(dec!(1500.00)));
    }

    #[test]
    fn test_auto_format() {
        let f = NumberFormat::Auto;
        assert_eq!(f.parse("1.500,00"), Some(dec!(1500.00)));
        assert_eq!(f.parse("1,500.00"), Some(dec!(1500.00)));
        assert_eq!(f.parse("250,5"), Some(dec!(250.5)));
        assert_eq!(f.parse("250.5"), Some(dec!(250.5)));
        assert_eq!(f.parse("1.234.567"), Some(dec!(1234567)));
    }

    #[test]
    fn test_markers() {
        let f = NumberFormat::Brazilian;
        assert_eq!(f.parse("(10,00)"), Some(dec!(-10.00)));
        assert_eq!(f.parse("10,00 D"), Some(dec!(-10.00)));
        assert_eq!(f.parse("10,00 C"), Some(dec!(10.00)));
        assert_eq!(f.parse("+10,00"), Some(dec!(10.00)));
    }

    #[test]
    fn test_rejects_garbage() {
        let f = NumberFormat::Auto;
        assert_eq!(f.parse(""), None);
        assert_eq!(f.parse("   "), None);
        assert_eq!(f.parse("abc"), None);
        assert_eq!(f.parse("12/01/2026"), None);
        assert_eq!(f.parse("-"), None);
    }
}
