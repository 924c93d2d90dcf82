//! Chec price representation using decimal arithmetic.
//!
//! Chec returns every monetary amount as an object carrying the raw number
//! and the merchant-formatted strings:
//!
//! ```json
//! {
//!   "raw": 24.5,
//!   "formatted": "24.50",
//!   "formatted_with_symbol": "$24.50",
//!   "formatted_with_code": "24.50 USD"
//! }
//! ```
//!
//! The formatted strings are authoritative for display; `raw` is kept as a
//! [`Decimal`] so it never picks up float rounding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price as returned by Chec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub raw: Decimal,
    /// Amount formatted without symbol or code (e.g., "24.50").
    #[serde(default)]
    pub formatted: String,
    /// Amount formatted with the currency symbol (e.g., "$24.50").
    #[serde(default)]
    pub formatted_with_symbol: String,
    /// Amount formatted with the currency code (e.g., "24.50 USD").
    #[serde(default)]
    pub formatted_with_code: String,
}

impl Price {
    /// A zero amount formatted for the given currency.
    #[must_use]
    pub fn zero(currency: &Currency) -> Self {
        Self::from_decimal(Decimal::ZERO, currency)
    }

    /// Build a price from a decimal amount, formatting it the way Chec does
    /// for two-decimal currencies.
    #[must_use]
    pub fn from_decimal(raw: Decimal, currency: &Currency) -> Self {
        let formatted = format!("{:.2}", raw.round_dp(2));
        Self {
            raw,
            formatted_with_symbol: format!("{}{formatted}", currency.symbol),
            formatted_with_code: format!("{formatted} {}", currency.code),
            formatted,
        }
    }

    /// Format for display (e.g., "$24.50").
    ///
    /// Uses Chec's own formatting when present and falls back to the raw
    /// amount with two decimals.
    #[must_use]
    pub fn display(&self) -> String {
        if !self.formatted_with_symbol.is_empty() {
            return self.formatted_with_symbol.clone();
        }
        if !self.formatted.is_empty() {
            return self.formatted.clone();
        }
        format!("{:.2}", self.raw.round_dp(2))
    }
}

/// A merchant currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 currency code (e.g., "USD").
    pub code: String,
    /// Display symbol (e.g., "$").
    pub symbol: String,
}

impl Default for Currency {
    fn default() -> Self {
        Self {
            code: "USD".to_string(),
            symbol: "$".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_chec_price() {
        let json = r#"{
            "raw": 24.5,
            "formatted": "24.50",
            "formatted_with_symbol": "$24.50",
            "formatted_with_code": "24.50 USD"
        }"#;
        let price: Price = serde_json::from_str(json).unwrap();
        assert_eq!(price.raw, Decimal::new(245, 1));
        assert_eq!(price.display(), "$24.50");
    }

    #[test]
    fn test_deserialize_integer_raw() {
        let price: Price = serde_json::from_str(r#"{"raw": 10}"#).unwrap();
        assert_eq!(price.raw, Decimal::new(10, 0));
        assert_eq!(price.display(), "10.00");
    }

    #[test]
    fn test_display_prefers_symbol_then_plain() {
        let price = Price {
            raw: Decimal::new(1999, 2),
            formatted: "19.99".to_string(),
            formatted_with_symbol: String::new(),
            formatted_with_code: String::new(),
        };
        assert_eq!(price.display(), "19.99");
    }

    #[test]
    fn test_from_decimal_formats_currency() {
        let eur = Currency {
            code: "EUR".to_string(),
            symbol: "€".to_string(),
        };
        let price = Price::from_decimal(Decimal::new(5, 0), &eur);
        assert_eq!(price.formatted, "5.00");
        assert_eq!(price.formatted_with_symbol, "€5.00");
        assert_eq!(price.formatted_with_code, "5.00 EUR");
    }

    #[test]
    fn test_zero() {
        let price = Price::zero(&Currency::default());
        assert_eq!(price.raw, Decimal::ZERO);
        assert_eq!(price.display(), "$0.00");
    }
}
