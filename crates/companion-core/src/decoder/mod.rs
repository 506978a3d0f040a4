//! Embedded-metadata decoding.
//!
//! A blob is classified into one [`Dialect`] by explicit priority rules and
//! handed to that dialect's parser. Every parser returns the same
//! [`MetadataRecord`]; missing or mistyped fields leave the record field at
//! its default and never abort decoding.
//!
//! # Detection Order
//! 1. Blob parses as a JSON object:
//!    - contains `"Fooocus v"` -> [`Dialect::Fooocus`]
//!    - contains `"RuinedFooocus"` -> [`Dialect::RuinedFooocus`]
//!    - otherwise -> [`Dialect::NodeGraph`]
//! 2. Plain text (surrounding quotes stripped):
//!    - contains `--neg_prompt` -> [`Dialect::NativeBatch`]
//!    - otherwise -> [`Dialect::Caption`]

mod caption;
mod command;
mod json;
pub mod resources;

use crate::models::{Dialect, MetadataRecord};
use serde_json::{Map, Value};
use tracing::debug;

const FOOOCUS_MARKER: &str = "Fooocus v";
const RUINED_FOOOCUS_MARKER: &str = "RuinedFooocus";
const NATIVE_BATCH_MARKER: &str = "--neg_prompt";

/// A blob after classification, carrying whatever was parsed to classify it.
enum Payload {
    Document(Map<String, Value>),
    Text(String),
}

fn classify(blob: &str) -> Option<(Dialect, Payload)> {
    if blob.trim().is_empty() {
        return None;
    }

    if let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(blob) {
        let dialect = if blob.contains(FOOOCUS_MARKER) {
            Dialect::Fooocus
        } else if blob.contains(RUINED_FOOOCUS_MARKER) {
            Dialect::RuinedFooocus
        } else {
            Dialect::NodeGraph
        };
        return Some((dialect, Payload::Document(doc)));
    }

    let text = blob.trim_matches('"').to_string();
    let dialect = if text.contains(NATIVE_BATCH_MARKER) {
        Dialect::NativeBatch
    } else {
        Dialect::Caption
    };
    Some((dialect, Payload::Text(text)))
}

/// Detect the dialect of a blob without decoding it.
///
/// Returns `None` for an empty blob.
pub fn detect(blob: &str) -> Option<Dialect> {
    classify(blob).map(|(dialect, _)| dialect)
}

/// Decode one embedded-metadata blob into a canonical record.
///
/// Returns `None` when the blob is empty (the image carried no metadata).
pub fn decode(blob: &str) -> Option<MetadataRecord> {
    let Some((dialect, payload)) = classify(blob) else {
        debug!("No embedded metadata to decode");
        return None;
    };

    let record = match payload {
        Payload::Document(doc) => match dialect {
            Dialect::Fooocus => json::decode_fooocus(&doc, blob),
            Dialect::RuinedFooocus => json::decode_ruined_fooocus(&doc, blob),
            _ => json::decode_node_graph(&doc, blob),
        },
        Payload::Text(text) => match dialect {
            Dialect::NativeBatch => command::decode(&text, blob),
            _ => caption::decode(&text, blob),
        },
    };

    debug!(
        "Decoded {} metadata ({} resources)",
        dialect,
        record.resources.len()
    );
    Some(record)
}

/// Parse a non-negative integer written either as `30` or `30.0`.
pub(crate) fn parse_uint(text: &str) -> Option<u64> {
    let text = text.trim().trim_matches('"').trim();
    text.parse::<u64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

pub(crate) fn parse_u32(text: &str) -> Option<u32> {
    parse_uint(text).and_then(|v| u32::try_from(v).ok())
}

pub(crate) fn parse_float(text: &str) -> Option<f64> {
    text.trim()
        .trim_matches('"')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
}
