//! Field rule checking for requests and notifications.
//!
//! Every rule runs; failures are collected so a caller sees all offending
//! fields at once instead of only the first.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::payments::codec::round_amount;
use crate::payments::tables;

pub mod patterns {
    use super::*;

    fn compile(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {}: {}", pattern, e))
    }

    pub static PROTOCOL: Lazy<Regex> = Lazy::new(|| compile(r"^[0-9]\.[0-9]{2}$"));
    pub static VENDOR: Lazy<Regex> = Lazy::new(|| compile(r"^[A-Za-z0-9_-]+$"));
    pub static VENDOR_TX_CODE: Lazy<Regex> = Lazy::new(|| compile(r"^[A-Za-z0-9_{}.-]+$"));
    pub static NAME: Lazy<Regex> = Lazy::new(|| compile(r"^[\p{L} /\\&.\-']+$"));
    pub static ADDRESS: Lazy<Regex> =
        Lazy::new(|| compile(r"^[\p{L}0-9 +'/\\&:,.\-\r\n()]+$"));
    pub static POST_CODE: Lazy<Regex> = Lazy::new(|| compile(r"^[a-zA-Z0-9 -]+$"));
    pub static PHONE: Lazy<Regex> = Lazy::new(|| compile(r"^[0-9\-a-zA-Z+ ()]+$"));
    pub static CV2: Lazy<Regex> = Lazy::new(|| compile(r"^[0-9]{3,4}$"));
    pub static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| compile(r"^[0-9]{4}$"));
    pub static EMAIL: Lazy<Regex> = Lazy::new(|| compile(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"));
}

pub const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ValidationError::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Anything that declares field rules.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Collects rule violations for one model.
#[derive(Debug, Default)]
pub struct Rules {
    errors: ValidationErrors,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<'r, 'v>(&'r mut self, name: &'static str, value: Option<&'v str>) -> FieldRules<'r, 'v> {
        FieldRules {
            errors: &mut self.errors,
            name,
            value: value.filter(|v| !v.is_empty()),
        }
    }

    /// Records `message` against `field` unless `condition` holds.
    pub fn ensure(&mut self, condition: bool, field: &'static str, message: &str) {
        if !condition {
            self.errors.push(field, message);
        }
    }

    /// Checks the amount as it will be sent, after two-decimal rounding.
    pub fn amount(&mut self, name: &'static str, value: Option<Decimal>, required: bool) {
        match value.map(round_amount) {
            None if required => self.errors.push(name, "must not be blank"),
            None => {}
            Some(amount) if amount < MIN_AMOUNT || amount > MAX_AMOUNT => self.errors.push(
                name,
                format!("must be between {} and {}", MIN_AMOUNT, MAX_AMOUNT),
            ),
            Some(_) => {}
        }
    }

    pub fn flag(&mut self, name: &'static str, value: Option<u8>, max: u8) {
        if let Some(v) = value {
            if v > max {
                self.errors.push(name, format!("must be between 0 and {}", max));
            }
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        self.errors.into_result()
    }
}

/// Rules applied to a single string field. Every rule except `required`
/// passes on an absent value.
pub struct FieldRules<'r, 'v> {
    errors: &'r mut ValidationErrors,
    name: &'static str,
    value: Option<&'v str>,
}

impl<'r, 'v> FieldRules<'r, 'v> {
    fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(self.name, message);
    }

    fn check(mut self, predicate: impl FnOnce(&str) -> bool, message: impl Into<String>) -> Self {
        if let Some(value) = self.value {
            if !predicate(value) {
                self.fail(message);
            }
        }
        self
    }

    pub fn required(mut self) -> Self {
        if self.value.map(|v| v.trim().is_empty()).unwrap_or(true) {
            self.fail("must not be blank");
        }
        self
    }

    pub fn max_len(self, max: usize) -> Self {
        self.check(
            |v| v.chars().count() <= max,
            format!("must be at most {} characters", max),
        )
    }

    pub fn len_between(self, min: usize, max: usize) -> Self {
        self.check(
            |v| (min..=max).contains(&v.chars().count()),
            format!("must be between {} and {} characters", min, max),
        )
    }

    pub fn matches(self, pattern: &Regex) -> Self {
        self.check(|v| pattern.is_match(v), "has an invalid format")
    }

    pub fn one_of(self, choices: &[&str]) -> Self {
        let message = format!("must be one of {:?}", choices);
        self.check(|v| choices.contains(&v), message)
    }

    pub fn currency(self) -> Self {
        self.check(tables::is_currency, "is not an ISO 4217 currency code")
    }

    pub fn country(self) -> Self {
        self.check(tables::is_country, "is not an ISO 3166 country code")
    }

    pub fn us_state(self) -> Self {
        self.check(tables::is_us_state, "is not a US state abbreviation")
    }

    pub fn email(self) -> Self {
        self.check(|v| patterns::EMAIL.is_match(v), "is not a valid e-mail address")
    }

    /// Fully-qualified http(s) URL.
    pub fn url(self) -> Self {
        self.check(
            |v| {
                url::Url::parse(v)
                    .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
                    .unwrap_or(false)
            },
            "is not a fully-qualified http(s) URL",
        )
    }
}
