//! Canonical JSON encoding for hashing and signing.
//!
//! Two logically equal documents must encode to the same bytes regardless of
//! key insertion order or float noise from independent summation paths, so the
//! encoder sorts object keys at every level and rounds floats to a fixed
//! precision. The encoder is total: anything serde cannot lower becomes `null`.
use serde::Serialize;
use serde_json::{Number, Value};

/// Decimal places kept for floating point values.
pub const DEFAULT_PRECISION: u32 = 4;

/// Past 2^53 every f64 is an integer, so scaling can only lose information.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Deterministic encoder with an explicit numeric precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalEncoder {
    precision: u32,
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl CanonicalEncoder {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Encode any serializable value, terminated by exactly one newline.
    ///
    /// The value's `Serialize` impl acts as its conversion hook. Fields skipped
    /// during serialization are dropped; `None` inside a sequence stays `null`.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(error = %err, "value not representable as JSON; encoding null");
                Value::Null
            }
        };
        self.encode_value(&value)
    }

    /// Encode an already-parsed JSON document.
    pub fn encode_value(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value);
        out.push('\n');
        out
    }

    fn write_value(&self, out: &mut String, value: &Value) {
        match value {
            Value::Null => out.push_str("null"),
            Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
            Value::Number(number) => out.push_str(&self.format_number(number)),
            Value::String(text) => write_string(out, text),
            Value::Array(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    self.write_value(out, item);
                }
                out.push(']');
            }
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (idx, key) in keys.into_iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    write_string(out, key);
                    out.push(':');
                    self.write_value(out, &map[key]);
                }
                out.push('}');
            }
        }
    }

    fn format_number(&self, number: &Number) -> String {
        if let Some(value) = number.as_i64() {
            return value.to_string();
        }
        if let Some(value) = number.as_u64() {
            return value.to_string();
        }
        match number.as_f64() {
            Some(value) => self.format_float(value),
            None => "null".to_string(),
        }
    }

    /// Round to the configured precision and strip trailing zeros.
    ///
    /// Non-finite values encode as `null`; `-0` collapses to `0`.
    pub fn format_float(&self, value: f64) -> String {
        let rounded = self.round(value);
        if !rounded.is_finite() {
            return "null".to_string();
        }
        let fixed = format!("{:.*}", self.precision as usize, rounded);
        let trimmed = if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.')
        } else {
            fixed.as_str()
        };
        if trimmed == "-0" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Round a float to the configured precision, keeping it numeric.
    ///
    /// Infinities pass through unchanged so sentinel values survive. Values
    /// too large to carry the configured decimals are returned as is.
    pub fn round(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let factor = 10f64.powi(self.precision as i32);
        let scaled = value * factor;
        if !scaled.is_finite() || value.abs() >= MAX_EXACT_INTEGER / factor {
            return value;
        }
        let rounded = scaled.round() / factor;
        if rounded == 0.0 {
            0.0
        } else {
            rounded
        }
    }
}

/// Canonicalize with the default precision.
#[cfg(test)]
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> String {
    CanonicalEncoder::default().encode(value)
}

/// Canonicalize a parsed document with the default precision.
#[cfg(test)]
pub fn canonicalize_value(value: &Value) -> String {
    CanonicalEncoder::default().encode_value(value)
}

fn write_string(out: &mut String, text: &str) {
    match serde_json::to_string(text) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("null"),
    }
}

#[cfg(test)]
#[path = "canonical_tests.rs"]
mod tests;
