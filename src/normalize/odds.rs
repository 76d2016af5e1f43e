//! Odds conversion to canonical decimal.
//!
//! Sources quote fractional ("5/2", "5-2", "EVS"), decimal ("3.50") or
//! moneyline ("+150", "-200") prices. Everything is converted to a single
//! decimal value (stake returned per unit, including the stake) rounded to
//! four places.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

use crate::types::RawOdds;

/// Decimal places kept on canonical odds.
pub const ODDS_DP: u32 = 4;

/// What a quote means once interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Price(Decimal),
    /// No price available (SP, VOID, blank).
    Unpriced,
    /// Token that also means the runner is out (NR, WD).
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OddsError {
    #[error("unrecognised odds token: {0:?}")]
    Unrecognised(String),

    #[error("odds {0} do not exceed evens-money floor of 1.0")]
    OutOfRange(String),
}

/// Convert a raw quote to its canonical meaning.
pub fn convert(raw: &RawOdds) -> Result<Quote, OddsError> {
    match raw {
        RawOdds::Text(s) => parse_text(s),
        RawOdds::Decimal(d) => checked(*d),
        RawOdds::Fractional { numerator, denominator } => fractional(*numerator, *denominator),
        RawOdds::Moneyline(m) => moneyline(*m),
    }
}

fn checked(d: Decimal) -> Result<Quote, OddsError> {
    let d = d.round_dp(ODDS_DP);
    if d <= Decimal::ONE {
        return Err(OddsError::OutOfRange(d.to_string()));
    }
    Ok(Quote::Price(d))
}

fn fractional(num: u32, den: u32) -> Result<Quote, OddsError> {
    if den == 0 {
        return Err(OddsError::Unrecognised(format!("{num}/{den}")));
    }
    checked(Decimal::ONE + Decimal::from(num) / Decimal::from(den))
}

fn moneyline(m: i32) -> Result<Quote, OddsError> {
    if m.unsigned_abs() < 100 {
        return Err(OddsError::Unrecognised(format!("{m:+}")));
    }
    let m = Decimal::from(m);
    let d = if m > Decimal::ZERO {
        Decimal::ONE + m / dec!(100)
    } else {
        Decimal::ONE + dec!(100) / m.abs()
    };
    checked(d)
}

fn parse_text(raw: &str) -> Result<Quote, OddsError> {
    let s = raw.trim().to_uppercase();
    // Favourite markers trail the price on some cards: "5/2F", "2/1JF".
    let s = s
        .trim_end_matches("JF")
        .trim_end_matches("CF")
        .trim_end_matches('F')
        .trim();

    match s {
        "" | "SP" | "VOID" | "-" | "N/A" => return Ok(Quote::Unpriced),
        "NR" | "WD" => return Ok(Quote::Withdrawn),
        "EVS" | "EVENS" | "EVEN" | "EV" => return Ok(Quote::Price(dec!(2))),
        _ => {}
    }

    let bad = || OddsError::Unrecognised(raw.trim().to_string());

    if s.starts_with('+') || s.starts_with('-') {
        let m: i32 = s.parse().map_err(|_| bad())?;
        return moneyline(m);
    }

    if let Some((n, d)) = s.split_once('/').or_else(|| s.split_once('-')) {
        let num: u32 = n.trim().parse().map_err(|_| bad())?;
        let den: u32 = d.trim().parse().map_err(|_| bad())?;
        return fractional(num, den);
    }

    let d = Decimal::from_str(s).map_err(|_| bad())?;
    checked(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Result<Quote, OddsError> {
        convert(&RawOdds::Text(s.to_string()))
    }

    #[test]
    fn test_fractional_forms() {
        assert_eq!(text("5/2"), Ok(Quote::Price(dec!(3.5))));
        assert_eq!(text("5-2"), Ok(Quote::Price(dec!(3.5))));
        assert_eq!(text(" 11/4 "), Ok(Quote::Price(dec!(3.75))));
        assert_eq!(text("1/2"), Ok(Quote::Price(dec!(1.5))));
        assert_eq!(text("2/1JF"), Ok(Quote::Price(dec!(3))));
    }

    #[test]
    fn test_evens() {
        assert_eq!(text("EVS"), Ok(Quote::Price(dec!(2))));
        assert_eq!(text("evens"), Ok(Quote::Price(dec!(2))));
    }

    #[test]
    fn test_decimal_text_and_value() {
        assert_eq!(text("3.50"), Ok(Quote::Price(dec!(3.5))));
        assert_eq!(convert(&RawOdds::Decimal(dec!(2.123456))), Ok(Quote::Price(dec!(2.1235))));
    }

    #[test]
    fn test_moneyline() {
        assert_eq!(text("+150"), Ok(Quote::Price(dec!(2.5))));
        assert_eq!(text("-200"), Ok(Quote::Price(dec!(1.5))));
        assert_eq!(convert(&RawOdds::Moneyline(100)), Ok(Quote::Price(dec!(2))));
        assert_eq!(convert(&RawOdds::Moneyline(-300)), Ok(Quote::Price(dec!(1.3333))));
        assert!(convert(&RawOdds::Moneyline(50)).is_err());
    }

    #[test]
    fn test_fractional_struct() {
        let q = convert(&RawOdds::Fractional { numerator: 9, denominator: 4 });
        assert_eq!(q, Ok(Quote::Price(dec!(3.25))));
        assert!(convert(&RawOdds::Fractional { numerator: 1, denominator: 0 }).is_err());
    }

    #[test]
    fn test_no_price_tokens() {
        assert_eq!(text("SP"), Ok(Quote::Unpriced));
        assert_eq!(text(""), Ok(Quote::Unpriced));
        assert_eq!(text("void"), Ok(Quote::Unpriced));
        assert_eq!(text("NR"), Ok(Quote::Withdrawn));
        assert_eq!(text("WD"), Ok(Quote::Withdrawn));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(text("abc"), Err(OddsError::Unrecognised(_))));
        assert!(matches!(text("1.0"), Err(OddsError::OutOfRange(_))));
        assert!(matches!(text("0/1"), Err(OddsError::OutOfRange(_))));
        assert!(matches!(convert(&RawOdds::Decimal(dec!(0.9))), Err(OddsError::OutOfRange(_))));
    }

    #[test]
    fn test_extreme_moneyline_is_rejected_not_panicking() {
        assert!(matches!(convert(&RawOdds::Moneyline(i32::MIN)), Err(OddsError::OutOfRange(_))));
        assert!(matches!(text("-2147483648"), Err(OddsError::OutOfRange(_))));
        assert!(matches!(text("-99999999999"), Err(OddsError::Unrecognised(_))));
        assert!(matches!(convert(&RawOdds::Moneyline(i32::MAX)), Ok(Quote::Price(_))));
    }
}
