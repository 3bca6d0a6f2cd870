// Utility helpers for coercion, dates and number formatting.
//
// This module centralizes all the "dirty" value handling so the engine can
// assume clean, typed values: every measure read goes through
// `to_safe_number` and every group key read goes through `key_text`.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use serde_json::Value;

/// Placeholder used for group key fields a record does not carry.
pub const MISSING_KEY: &str = "N/A";

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues common in backend exports (commas, spaces, text).
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters other than an
///   exponent marker (this keeps `"NaN"` and `"inf"` out, `"1e3"` in).
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// The single numeric coercion rule of the engine.
///
/// JSON numbers are taken as-is, numeric strings are parsed with
/// [`parse_f64_safe`], and everything else (null, booleans, text, arrays,
/// objects, a missing field) becomes `0.0`. The result is always finite.
pub fn to_safe_number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_f64_safe(Some(s.as_str())).unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Render a field value as a group key component.
///
/// Missing, null and blank values collapse to [`MISSING_KEY`].
pub fn key_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_KEY.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => MISSING_KEY.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    // Dates are expected to start with `YYYY-MM-DD`; anything after the
    // tenth character (a time part, a zone) is ignored.
    let s = s?.trim();
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Normalise a date-ish string to `YYYY-MM-DD`, or return it unchanged when
/// it does not start with a calendar date.
pub fn normalize_date(s: &str) -> String {
    match parse_date_safe(Some(s)) {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => s.to_string(),
    }
}

/// `numerator / denominator * scale`, or `0.0` when the denominator is zero
/// or the result is not finite.
pub fn safe_ratio(numerator: f64, denominator: f64, scale: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let r = numerator / denominator * scale;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

/// Share of a field's area that has been assigned, in percent.
pub fn assigned_percentage(assigned: f64, area: f64) -> f64 {
    safe_ratio(assigned, area, 100.0)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let s = format!("{:.*}", decimals, n.abs());
    let neg = n.is_sign_negative() && s.chars().any(|c| c != '0' && c != '.');
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // Use `num-format` to insert commas into the integer portion. Past
    // `u128` the digits are kept as they are.
    let mut res = match int_part.parse::<u128>() {
        Ok(v) => v.to_formatted_string(&Locale::en),
        Err(_) => int_part.to_string(),
    };
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9,855 records flattened`).
    n.to_formatted_string(&Locale::en)
}
