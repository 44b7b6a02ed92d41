//! Scalar parsing for user-supplied annotations and customized variables
//!
//! User input never fails a values computation. Every helper here either
//! returns a parsed value or logs why the input was rejected and returns the
//! default the caller supplied.

use tracing::error;

use crate::Error;

/// Default log level when the user-provided level is rejected
pub const DEFAULT_LOG_LEVEL: i8 = 0;

/// Log an annotation/variable value that could not be used
pub fn log_fallback(key: &str, value: &str, component: &str, default: impl std::fmt::Display) {
    error!(
        key = %key,
        value = %value,
        component = %component,
        default = %default,
        "Failed to verify '{}' annotation value '{}' for component {} (falling back to default value {})",
        key,
        value,
        component,
        default
    );
}

/// Parse a zap-style log level
///
/// `"error"` maps to -1. Integers in `i8` range and not below -1 are returned
/// as-is. Anything else, surrounding whitespace included, is `None`.
pub fn parse_log_level(raw: &str) -> Option<i8> {
    if raw == "error" {
        return Some(-1);
    }
    raw.parse::<i8>().ok().filter(|level| *level >= -1)
}

/// [`parse_log_level`], falling back to [`DEFAULT_LOG_LEVEL`]
pub fn log_level(key: &str, component: &str, raw: &str) -> i8 {
    parse_log_level(raw).unwrap_or_else(|| {
        log_fallback(key, raw, component, DEFAULT_LOG_LEVEL);
        DEFAULT_LOG_LEVEL
    })
}

/// Parse a boolean with the spellings accepted by Go's `strconv.ParseBool`
pub fn parse_bool(raw: &str) -> Result<bool, Error> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(Error::validation(format!(
            "invalid boolean value '{}'",
            raw
        ))),
    }
}

/// Parse a boolean, falling back to `default` when the input is rejected
pub fn bool_or_default(key: &str, component: &str, raw: &str, default: bool) -> bool {
    parse_bool(raw).unwrap_or_else(|_| {
        log_fallback(key, raw, component, default);
        default
    })
}

/// Case-insensitive `"true"`/`"false"`; anything else yields `None`
pub fn equal_fold_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse a positive `u8` (concurrency, QPS, burst)
///
/// Zero, negative, out of range, or non-numeric input yields `None`.
pub fn parse_uint8(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok().filter(|value| *value > 0)
}

/// [`parse_uint8`], falling back to `default` when the input is rejected
pub fn uint8_or_default(key: &str, component: &str, raw: &str, default: u8) -> u8 {
    parse_uint8(raw).unwrap_or_else(|| {
        log_fallback(key, raw, component, default);
        default
    })
}
