//! Display currency and amount formatting.
//!
//! Order amounts always arrive in the storefront base currency (TND). The
//! [`CurrencyContext`] picked at the composition root converts them to the
//! display currency and formats them with a suffixed unit, e.g. `1 234.50 TND`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{InvoiceError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Tnd,
    Eur,
    Usd,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Tnd => "TND",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }

    pub fn from_code(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TND" | "DT" => Some(Self::Tnd),
            "EUR" | "€" => Some(Self::Eur),
            "USD" | "$" => Some(Self::Usd),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrencyContext {
    display: Currency,
    rate: f64,
}

impl Default for CurrencyContext {
    fn default() -> Self {
        Self::base()
    }
}

impl CurrencyContext {
    /// Amounts shown as-is in the base currency.
    pub fn base() -> Self {
        Self {
            display: Currency::Tnd,
            rate: 1.0,
        }
    }

    /// `rate` converts one unit of base currency into `display`.
    pub fn new(display: Currency, rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(InvoiceError::Config(format!(
                "conversion rate for {display} must be a positive number, got {rate}"
            )));
        }
        if display == Currency::Tnd && (rate - 1.0).abs() > f64::EPSILON {
            return Err(InvoiceError::Config(
                "the base currency TND always converts at rate 1".to_string(),
            ));
        }
        Ok(Self { display, rate })
    }

    pub fn display(&self) -> Currency {
        self.display
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn convert(&self, base_amount: f64) -> f64 {
        if !base_amount.is_finite() {
            return 0.0;
        }
        base_amount * self.rate
    }

    pub fn format(&self, base_amount: f64) -> String {
        format_amount(self.convert(base_amount), self.display.code())
    }
}

/// Two decimals, space-grouped thousands, optional unit suffix.
pub fn format_amount(value: f64, unit: &str) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" {
        "-"
    } else {
        ""
    };
    let grouped = group_thousands(int_part);
    if unit.trim().is_empty() {
        format!("{sign}{grouped}.{frac_part}")
    } else {
        format!("{sign}{grouped}.{frac_part} {}", unit.trim())
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_unit_suffix() {
        assert_eq!(format_amount(123.4, "TND"), "123.40 TND");
        assert_eq!(format_amount(0.0, "TND"), "0.00 TND");
        assert_eq!(format_amount(7.0, ""), "7.00");
    }

    #[test]
    fn groups_thousands_with_spaces() {
        assert_eq!(format_amount(1234.5, "TND"), "1 234.50 TND");
        assert_eq!(format_amount(1_234_567.891, "EUR"), "1 234 567.89 EUR");
        assert_eq!(format_amount(100.0, "TND"), "100.00 TND");
    }

    #[test]
    fn never_renders_nan_or_negative_zero() {
        assert_eq!(format_amount(f64::NAN, "TND"), "0.00 TND");
        assert_eq!(format_amount(f64::INFINITY, "TND"), "0.00 TND");
        assert_eq!(format_amount(-0.001, "TND"), "0.00 TND");
        assert_eq!(format_amount(-12.5, "TND"), "-12.50 TND");
    }

    #[test]
    fn currency_codes_round_trip_through_lookup() {
        assert_eq!(Currency::from_code(" eur "), Some(Currency::Eur));
        assert_eq!(Currency::from_code("DT"), Some(Currency::Tnd));
        assert_eq!(Currency::from_code("GBP"), None);
    }

    #[test]
    fn context_converts_before_formatting() {
        let ctx = CurrencyContext::new(Currency::Eur, 0.3).expect("valid rate");
        assert_eq!(ctx.format(100.0), "30.00 EUR");
        assert_eq!(CurrencyContext::base().format(100.0), "100.00 TND");
    }

    #[test]
    fn context_rejects_bad_rates() {
        assert!(CurrencyContext::new(Currency::Usd, 0.0).is_err());
        assert!(CurrencyContext::new(Currency::Usd, f64::NAN).is_err());
        assert!(CurrencyContext::new(Currency::Tnd, 2.0).is_err());
    }
}
