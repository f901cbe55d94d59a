//! Canonical parameter hashing.
//!
//! A [`ParamValue`] tree is reduced to a canonical text in which sequences
//! become tuples, mappings become key-sorted tuples of pairs, and sets become
//! tuples sorted by the canonical text of their elements. The SHA-256 digest
//! of that text is the [`Fingerprint`].
//!
//! The grammar is:
//!
//! ```text
//! bool   b:true | b:false
//! int    i:<decimal>
//! string s:<byte length>:<utf-8 bytes>
//! tuple  (<item>,<item>,...)
//! ```
//!
//! Strings are length-prefixed so that no string content can be mistaken for
//! tuple punctuation.

use fontasset_common::Fingerprint;

/// A dynamically-typed parameter value.
///
/// Every variant has a total canonical ordering, so normalization never
/// depends on insertion order or platform hash ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A boolean scalar.
    Bool(bool),
    /// An integer scalar.
    Int(i64),
    /// A string scalar.
    Str(String),
    /// An ordered sequence.
    List(Vec<ParamValue>),
    /// An unordered collection; order and duplicates are ignored.
    Set(Vec<ParamValue>),
    /// A mapping; insertion order is ignored and a repeated key keeps its
    /// last value.
    Map(Vec<(String, ParamValue)>),
}

/// Computes the fingerprint of a parameter value.
pub fn fingerprint(value: &ParamValue) -> Fingerprint {
    Fingerprint::from_bytes(canonical_form(value).as_bytes())
}

/// Returns the canonical text of a parameter value.
pub fn canonical_form(value: &ParamValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &ParamValue, out: &mut String) {
    match value {
        ParamValue::Bool(b) => {
            out.push_str(if *b { "b:true" } else { "b:false" });
        }
        ParamValue::Int(i) => {
            out.push_str("i:");
            out.push_str(&i.to_string());
        }
        ParamValue::Str(s) => write_str(s, out),
        ParamValue::List(items) => {
            let parts: Vec<String> = items.iter().map(canonical_form).collect();
            write_tuple(&parts, out);
        }
        ParamValue::Set(items) => {
            let mut parts: Vec<String> = items.iter().map(canonical_form).collect();
            parts.sort();
            parts.dedup();
            write_tuple(&parts, out);
        }
        ParamValue::Map(entries) => {
            // Stable sort keeps insertion order among equal keys, so taking the
            // last of each run implements last-write-wins.
            let mut sorted: Vec<&(String, ParamValue)> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut parts: Vec<String> = Vec::with_capacity(sorted.len());
            for (i, (key, val)) in sorted.iter().enumerate() {
                if sorted.get(i + 1).is_some_and(|next| next.0 == *key) {
                    continue;
                }
                let mut pair = String::from("(");
                write_str(key, &mut pair);
                pair.push(',');
                write_canonical(val, &mut pair);
                pair.push(')');
                parts.push(pair);
            }
            write_tuple(&parts, out);
        }
    }
}

fn write_str(s: &str, out: &mut String) {
    out.push_str("s:");
    out.push_str(&s.len().to_string());
    out.push(':');
    out.push_str(s);
}

fn write_tuple(parts: &[String], out: &mut String) {
    out.push('(');
    out.push_str(&parts.join(","));
    out.push(')');
}
