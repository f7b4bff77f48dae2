//! Chilean RUT (Rol Único Tributario) parsing, validation and formatting.
//!
//! A RUT is a numeric body followed by a modulo-11 check digit (`0`-`9` or `K`).
//! Input is accepted with or without thousands separators and hyphen, e.g.
//! `12.345.678-5`, `12345678-5` and `123456785` all parse to the same value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MAX_BODY_DIGITS: usize = 8;

/// Validated RUT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rut {
    body: u32,
    check_digit: char,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RutError {
    #[error("RUT is empty")]
    Empty,
    #[error("RUT contains invalid characters")]
    InvalidCharacters,
    #[error("RUT body must have between 1 and 8 digits")]
    InvalidLength,
    #[error("RUT check digit mismatch: expected {expected}, found {found}")]
    CheckDigitMismatch { expected: char, found: char },
}

/// Strip separators and whitespace, normalising the check digit to uppercase.
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '.' | '-') && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Modulo-11 check digit for a RUT body.
pub fn check_digit(body: u32) -> char {
    let mut remaining = body;
    let mut sum = 0u32;
    let mut weight = 2u32;

    while remaining > 0 {
        sum += (remaining % 10) * weight;
        remaining /= 10;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }

    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        digit => char::from_digit(digit, 10).unwrap_or('0'),
    }
}

pub fn is_valid(raw: &str) -> bool {
    Rut::parse(raw).is_ok()
}

/// Parse and re-render a RUT in its dotted form.
pub fn format(raw: &str) -> Result<String, RutError> {
    Rut::parse(raw).map(|rut| rut.formatted())
}

impl Rut {
    pub fn parse(raw: &str) -> Result<Self, RutError> {
        let cleaned = clean(raw);
        let mut chars = cleaned.chars();
        let found = chars.next_back().ok_or(RutError::Empty)?;
        let digits = chars.as_str();

        if !found.is_ascii_digit() && found != 'K' {
            return Err(RutError::InvalidCharacters);
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(RutError::InvalidCharacters);
        }

        let significant = digits.trim_start_matches('0');
        if significant.is_empty() || significant.len() > MAX_BODY_DIGITS {
            return Err(RutError::InvalidLength);
        }

        let body: u32 = significant
            .parse()
            .map_err(|_| RutError::InvalidCharacters)?;
        let expected = check_digit(body);
        if expected != found {
            return Err(RutError::CheckDigitMismatch { expected, found });
        }

        Ok(Self {
            body,
            check_digit: expected,
        })
    }

    /// Build a RUT from a body, computing its check digit.
    pub fn from_body(body: u32) -> Result<Self, RutError> {
        if body == 0 || body.to_string().len() > MAX_BODY_DIGITS {
            return Err(RutError::InvalidLength);
        }
        Ok(Self {
            body,
            check_digit: check_digit(body),
        })
    }

    pub const fn body(&self) -> u32 {
        self.body
    }

    pub const fn check_digit(&self) -> char {
        self.check_digit
    }

    /// `12345678-5`
    pub fn compact(&self) -> String {
        format!("{}-{}", self.body, self.check_digit)
    }

    /// `12.345.678-5`
    pub fn formatted(&self) -> String {
        let digits = self.body.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (index, digit) in digits.chars().enumerate() {
            if index > 0 && (digits.len() - index) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(digit);
        }
        format!("{}-{}", grouped, self.check_digit)
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl FromStr for Rut {
    type Err = RutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Rut {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.formatted())
    }
}

impl<'de> Deserialize<'de> for Rut {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Rut::parse(&raw)
            .map_err(|err| serde::de::Error::custom(format!("invalid RUT '{raw}': {err}")))
    }
}
