//! Locale-aware number formatting for dashboard output.

use crate::config::{DashboardConfig, Locale};
use rust_decimal::{Decimal, RoundingStrategy};

/// Formats currency, counts and percentages for one locale.
#[derive(Debug, Clone)]
pub struct NumberFormatter {
    locale: Locale,
    currency_symbol: String,
}

impl NumberFormatter {
    pub fn new(locale: Locale, currency_symbol: impl Into<String>) -> Self {
        Self {
            locale,
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.locale, config.currency_symbol.clone())
    }

    /// `R$ 1.234,56`, two decimal places, sign before the symbol.
    pub fn currency(&self, amount: Decimal) -> String {
        let (sign, digits) = self.fixed(amount, 2);
        if self.currency_symbol.is_empty() {
            format!("{}{}", sign, digits)
        } else {
            format!("{}{} {}", sign, self.currency_symbol, digits)
        }
    }

    /// `-11,1%`, one decimal place.
    pub fn percent(&self, value: Decimal) -> String {
        let (sign, digits) = self.fixed(value, 1);
        format!("{}{}%", sign, digits)
    }

    /// Whole number with thousands separators.
    pub fn count(&self, value: u64) -> String {
        group_thousands(&value.to_string(), self.locale.thousands_separator())
    }

    /// Plain decimal with a fixed number of places and no grouping.
    pub fn quantity(&self, value: Decimal, places: u32) -> String {
        let (sign, digits) = self.fixed(value, places);
        format!("{}{}", sign, digits.replace(self.locale.thousands_separator(), ""))
    }

    /// Round half away from zero, then split into sign and grouped digits.
    fn fixed(&self, value: Decimal, places: u32) -> (&'static str, String) {
        let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(places);

        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };

        let text = rounded.abs().to_string();
        let (int_part, frac_part) = match text.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (text.as_str(), None),
        };

        let mut digits = group_thousands(int_part, self.locale.thousands_separator());
        if let Some(frac) = frac_part {
            digits.push(self.locale.decimal_separator());
            digits.push_str(frac);
        }

        (sign, digits)
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }

    grouped
}
