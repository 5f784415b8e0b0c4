//! Line protocol
//!
//! Text encoding used by the `stdout` and `file` outputs and by parser inputs:
//!
//! ```text
//! measurement,tag1=v1,tag2=v2 field1=1.5,field2=3i,field3="text" 1700000000000000000
//! ```
//!
//! Measurement names escape commas and spaces; tag and field keys, and tag
//! values, additionally escape `=`. String field values are double-quoted
//! with `"` and `\` escaped. Integers carry an `i` suffix, unsigned integers
//! a `u` suffix. The timestamp is optional and in nanoseconds.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::{FieldValue, Metric, MetricError, Result};

/// Turns raw input into metrics
pub trait Parser: Send + Sync {
    /// Parse a whole input buffer
    fn parse(&self, input: &str) -> Result<Vec<Metric>>;

    /// Parse one line; `None` for blank lines and comments
    fn parse_line(&self, line: &str) -> Result<Option<Metric>>;

    /// Data format name
    fn name(&self) -> &'static str;
}

/// Create a parser for a `data_format` name
pub fn parser_for(data_format: &str) -> Result<Box<dyn Parser>> {
    match data_format {
        "influx" | "line_protocol" => Ok(Box::new(LineProtocolParser::new())),
        other => Err(MetricError::UnknownFormat(other.to_string())),
    }
}

/// Line protocol parser
///
/// Lines without a timestamp get the time of the `parse` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineProtocolParser;

impl LineProtocolParser {
    pub const fn new() -> Self {
        Self
    }

    fn parse_at(line_no: usize, line: &str, now: DateTime<Utc>) -> Result<Option<Metric>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let sections: Vec<&str> = split_unescaped(line, ' ', true)
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        let (series, fields, timestamp) = match sections.as_slice() {
            [series, fields] => (*series, *fields, None),
            [series, fields, ts] => (*series, *fields, Some(*ts)),
            _ => {
                return Err(MetricError::parse(
                    line_no,
                    "expected 'measurement[,tags] fields [timestamp]'",
                ));
            }
        };

        let mut parts = split_unescaped(series, ',', false).into_iter();
        let name = unescape(parts.next().unwrap_or_default());
        if name.is_empty() {
            return Err(MetricError::parse(line_no, "missing measurement name"));
        }

        let timestamp = match timestamp {
            Some(raw) => {
                let nanos: i64 = raw
                    .parse()
                    .map_err(|_| MetricError::parse(line_no, format!("invalid timestamp '{raw}'")))?;
                DateTime::from_timestamp_nanos(nanos)
            }
            None => now,
        };

        let mut metric = Metric::new(name, timestamp);

        for pair in parts {
            let (key, value) = split_pair(pair)
                .ok_or_else(|| MetricError::parse(line_no, format!("invalid tag '{pair}'")))?;
            metric.set_tag(unescape(key), unescape(value));
        }

        for pair in split_unescaped(fields, ',', true) {
            let (key, raw) = split_pair(pair)
                .ok_or_else(|| MetricError::parse(line_no, format!("invalid field '{pair}'")))?;
            let value = parse_field_value(raw)
                .ok_or_else(|| MetricError::parse(line_no, format!("invalid field value '{raw}'")))?;
            metric.set_field(unescape(key), value);
        }

        if !metric.has_fields() {
            return Err(MetricError::parse(line_no, "metric has no fields"));
        }

        Ok(Some(metric))
    }
}

impl Parser for LineProtocolParser {
    fn parse(&self, input: &str) -> Result<Vec<Metric>> {
        let now = Utc::now();
        let mut metrics = Vec::new();
        for (idx, line) in input.lines().enumerate() {
            if let Some(metric) = Self::parse_at(idx + 1, line, now)? {
                metrics.push(metric);
            }
        }
        Ok(metrics)
    }

    fn parse_line(&self, line: &str) -> Result<Option<Metric>> {
        Self::parse_at(1, line, Utc::now())
    }

    fn name(&self) -> &'static str {
        "influx"
    }
}

/// Serialize a metric as one line (no trailing newline)
pub fn serialize(metric: &Metric) -> String {
    let mut out = String::with_capacity(64);
    write_metric(&mut out, metric);
    out
}

/// Append a metric as one line to `out` (no trailing newline)
pub fn write_metric(out: &mut String, metric: &Metric) {
    escape_into(out, metric.name(), &[',', ' ']);
    for (key, value) in metric.tags() {
        out.push(',');
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        escape_into(out, value, &[',', '=', ' ']);
    }
    out.push(' ');
    for (i, (key, value)) in metric.fields().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        escape_into(out, key, &[',', '=', ' ']);
        out.push('=');
        match value {
            FieldValue::Float(v) => {
                let _ = write!(out, "{v}");
            }
            FieldValue::Int(v) => {
                let _ = write!(out, "{v}i");
            }
            FieldValue::UInt(v) => {
                let _ = write!(out, "{v}u");
            }
            FieldValue::Bool(v) => {
                let _ = write!(out, "{v}");
            }
            FieldValue::String(v) => {
                out.push('"');
                escape_into(out, v, &['"', '\\']);
                out.push('"');
            }
        }
    }
    if let Some(nanos) = metric.timestamp().timestamp_nanos_opt() {
        let _ = write!(out, " {nanos}");
    }
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Split on `sep` where it is not backslash-escaped (and, optionally, not
/// inside double quotes). Escapes are kept in the pieces.
fn split_unescaped(s: &str, sep: char, respect_quotes: bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut chars = s.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' if respect_quotes => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                pieces.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&s[start..]);
    pieces
}

/// Split `key=value` on the first unescaped `=`
fn split_pair(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '=' => {
                let key = &s[..idx];
                if key.is_empty() {
                    return None;
                }
                return Some((key, &s[idx + 1..]));
            }
            _ => {}
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_field_value(raw: &str) -> Option<FieldValue> {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Some(FieldValue::String(unescape(&raw[1..raw.len() - 1])));
    }
    match raw {
        "t" | "T" | "true" | "True" | "TRUE" => return Some(FieldValue::Bool(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Some(FieldValue::Bool(false)),
        _ => {}
    }
    if let Some(int) = raw.strip_suffix('i') {
        return int.parse().ok().map(FieldValue::Int);
    }
    if let Some(uint) = raw.strip_suffix('u') {
        return uint.parse().ok().map(FieldValue::UInt);
    }
    raw.parse::<f64>().ok().map(FieldValue::Float)
}

#[cfg(test)]
#[path = "line_protocol_test.rs"]
mod tests;
