//! Amount type for API boundary enforcement

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Strict amount grammar: `digits` or `digits.digits`, nothing else.
///
/// - Rejects `.5` (must be `0.5`)
/// - Rejects `5.` (must be `5.0` or `5`)
/// - Rejects any sign, whitespace or exponent
/// - Rejects empty strings
pub fn parse_strict(s: &str) -> Result<Decimal, String> {
    if s.is_empty() {
        return Err("Amount cannot be empty".to_string());
    }
    if s.starts_with('.') {
        return Err("Invalid format: use 0.5 not .5".to_string());
    }
    if s.ends_with('.') {
        return Err("Invalid format: use 5.0 not 5.".to_string());
    }
    if s.starts_with(['+', '-']) {
        return Err("Invalid format: sign not allowed".to_string());
    }
    if s.contains(['e', 'E']) {
        return Err("Invalid format: scientific notation not allowed".to_string());
    }
    if !s.chars().all(|c| c.is_ascii_digit() || c == '.') || s.matches('.').count() > 1 {
        return Err(format!("Invalid decimal: {s}"));
    }

    Decimal::from_str(s).map_err(|e| format!("Invalid decimal: {e}"))
}

/// Format-validated decimal, accepted only as a JSON string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrictDecimal(Decimal);

impl StrictDecimal {
    /// Get the inner Decimal value
    pub fn inner(self) -> Decimal {
        self.0
    }
}

impl std::ops::Deref for StrictDecimal {
    type Target = Decimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StrictDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        // JSON numbers bypass format validation, so only strings are accepted
        let s = String::deserialize(deserializer)?;
        parse_strict(&s).map(StrictDecimal).map_err(D::Error::custom)
    }
}

impl Serialize for StrictDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Serialize as string to preserve precision
        serializer.serialize_str(&self.0.to_string())
    }
}
