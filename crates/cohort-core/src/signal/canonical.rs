//! Canonical serialization of signal bundles.
//!
//! The emitter produces a JSON-shaped string with sorted keys, integer-only
//! numbers, and minimal escaping. The output feeds the fingerprint hash, so
//! every byte matters: two semantically equal bundles must serialize to
//! identical strings on every platform.

use super::bundle::{SignalBundle, SignalValue};

/// Serializes a bundle into its canonical string form.
#[must_use]
pub fn canonicalize(bundle: &SignalBundle) -> String {
    let mut out = String::new();
    emit_map_entries(bundle.entries().iter().map(|(k, v)| (k.as_str(), v)), &mut out);
    out
}

fn emit_value(value: &SignalValue, out: &mut String) {
    match value {
        SignalValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        SignalValue::Integer(v) => out.push_str(&v.to_string()),
        SignalValue::String(v) => emit_string(v, out),
        SignalValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                emit_value(item, out);
            }
            out.push(']');
        },
        SignalValue::Map(entries) => {
            emit_map_entries(entries.iter().map(|(k, v)| (k.as_str(), v)), out);
        },
    }
}

fn emit_map_entries<'a>(
    entries: impl Iterator<Item = (&'a str, &'a SignalValue)>,
    out: &mut String,
) {
    out.push('{');
    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            out.push(',');
        }
        emit_string(key, out);
        out.push(':');
        emit_value(value, out);
    }
    out.push('}');
}

/// Emits a string literal with minimal escaping: only the quote, the
/// backslash, and control characters below U+0020 are escaped. Everything
/// else passes through as UTF-8.
fn emit_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            },
            c => out.push(c),
        }
    }
    out.push('"');
}
