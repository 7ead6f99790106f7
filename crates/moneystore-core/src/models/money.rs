use std::{fmt::Display, str::FromStr};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use super::FieldError;

/// Number of minor units in one major unit. Every currency is treated as
/// having two decimal places.
pub const MINOR_UNITS: i64 = 100;

/// Three letter currency code, always upper case ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, FieldError> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(FieldError::InvalidCurrencyCode(code.to_string()));
        }
        let mut upper = [0u8; 3];
        for (dst, src) in upper.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for CurrencyCode {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An amount of money held as integer minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: CurrencyCode,
}

impl Money {
    pub fn new(amount: i64, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Builds a `Money` from a major unit decimal such as `12.34`.
    /// More than two fractional digits is an error rather than a rounding.
    pub fn from_decimal(value: Decimal, currency: CurrencyCode) -> Result<Self, FieldError> {
        let minor = value
            .checked_mul(Decimal::from(MINOR_UNITS))
            .ok_or_else(|| FieldError::InvalidAmount(value.to_string()))?;
        if !minor.fract().is_zero() {
            return Err(FieldError::InvalidAmount(value.to_string()));
        }
        let amount = minor
            .to_i64()
            .ok_or_else(|| FieldError::InvalidAmount(value.to_string()))?;
        Ok(Self { amount, currency })
    }

    /// Amount in minor units.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn currency_code_is_normalised() {
        let code = CurrencyCode::new("gbp").unwrap();
        assert_eq!(code.as_str(), "GBP");
        assert_eq!(code, "GBP".parse().unwrap());
    }

    #[test]
    fn currency_code_rejects_bad_input() {
        for bad in ["", "GB", "GBPX", "G1P", "££$"] {
            assert!(
                matches!(CurrencyCode::new(bad), Err(FieldError::InvalidCurrencyCode(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn oversized_decimal_is_an_invalid_amount() {
        let gbp = CurrencyCode::new("GBP").unwrap();
        assert!(matches!(Money::from_decimal(Decimal::MAX, gbp), Err(FieldError::InvalidAmount(_))));
        assert!(matches!(Money::from_decimal(Decimal::MIN, gbp), Err(FieldError::InvalidAmount(_))));
        // Fits in a Decimal once scaled but not in i64 minor units.
        assert!(matches!(
            Money::from_decimal(dec!(100000000000000000000), gbp),
            Err(FieldError::InvalidAmount(_))
        ));
    }

    #[test]
    fn money_decimal_view() {
        let gbp = CurrencyCode::new("GBP").unwrap();
        let m = Money::from_decimal(dec!(12.34), gbp).unwrap();
        assert_eq!(m.amount(), 1234);
        assert_eq!(m.to_decimal(), dec!(12.34));
        assert_eq!(m.to_string(), "12.34 GBP");

        let negative = Money::from_decimal(dec!(-0.5), gbp).unwrap();
        assert_eq!(negative.amount(), -50);
    }

    #[test]
    fn money_rejects_sub_minor_precision() {
        let eur = CurrencyCode::new("EUR").unwrap();
        assert!(matches!(
            Money::from_decimal(dec!(1.005), eur),
            Err(FieldError::InvalidAmount(_))
        ));
    }

    #[test]
    fn money_json_shape() {
        let m = Money::new(-250, CurrencyCode::new("USD").unwrap());
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json, serde_json::json!({"amount": -250, "currency": "USD"}));
        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }
}
