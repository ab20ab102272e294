// Convert wire prices (strings or JSON floats) into fixed-scale decimals.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

pub struct Normaliser {
    pub price_scale: u32, // decimal places kept, e.g. 6
}

impl Normaliser {
    pub fn new(price_scale: u32) -> Self {
        Self { price_scale }
    }

    pub fn price_from_str(&self, s: &str) -> Option<Decimal> {
        // Alpha Vantage pads ("189.9800") and percentages carry a '%'
        let trimmed = s.trim().trim_end_matches('%').trim();
        let value = Decimal::from_str(trimmed).ok()?;
        Some(value.round_dp(self.price_scale).normalize())
    }

    pub fn price_from_f64(&self, v: f64) -> Option<Decimal> {
        if !v.is_finite() {
            return None;
        }
        let value = Decimal::from_f64(v)?;
        Some(value.round_dp(self.price_scale).normalize())
    }

    /// A quote price must be strictly positive to price orders against.
    pub fn quote_price_from_str(&self, s: &str) -> Option<Decimal> {
        self.price_from_str(s).filter(|p| *p > Decimal::ZERO)
    }

    pub fn quote_price_from_f64(&self, v: f64) -> Option<Decimal> {
        self.price_from_f64(v).filter(|p| *p > Decimal::ZERO)
    }
}

impl Default for Normaliser {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_price_from_str() {
        let norm = Normaliser::new(6);
        assert_eq!(norm.price_from_str("189.9800"), Some(dec("189.98")));
        assert_eq!(norm.price_from_str(" 0.1234567 "), Some(dec("0.123457")));
        assert_eq!(norm.price_from_str("-0.4512%"), Some(dec("-0.4512")));
        assert_eq!(norm.price_from_str("n/a"), None);
    }

    #[test]
    fn test_price_from_f64() {
        let norm = Normaliser::new(2);
        assert_eq!(norm.price_from_f64(50000.0), Some(dec("50000")));
        assert_eq!(norm.price_from_f64(1.2751), Some(dec("1.28")));
        assert_eq!(norm.price_from_f64(f64::NAN), None);
        assert_eq!(norm.price_from_f64(f64::INFINITY), None);
    }

    #[test]
    fn test_quote_price_rejects_non_positive() {
        let norm = Normaliser::default();
        assert_eq!(norm.quote_price_from_str("0.0000"), None);
        assert_eq!(norm.quote_price_from_f64(-3.0), None);
        assert_eq!(norm.quote_price_from_f64(3.0), Some(dec("3")));
    }
}
