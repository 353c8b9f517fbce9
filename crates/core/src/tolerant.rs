//! Best-effort recovery of transcript segments embedded in free text.
//!
//! Retrieval chunks carry JSON that may be whole, cut in half by the chunker,
//! or wrapped in prose. Parsing goes through three tiers:
//!
//! 1. [`parse_structured`]: the whole text is one JSON object or array.
//! 2. [`parse_bracketed`]: every balanced `{...}` span is parsed on its own.
//! 3. [`scan_literal`]: text no span covered is scanned label by label.
//!
//! [`parse_transcript_fragments`] chains them. Nothing here returns an error;
//! fragments that survive no tier are logged at `debug` and dropped.

use serde_json::{Map, Value};
use tracing::debug;

use crate::{error::ShapeError, types::TimestampSegment};

pub const START_FIELD: &str = "start_timestamp_millis";
pub const END_FIELD: &str = "end_timestamp_millis";
pub const INDEX_FIELD: &str = "segment_index";
pub const TYPE_FIELD: &str = "type";
pub const TEXT_FIELD: &str = "text";
pub const AUDIO_SEGMENTS_FIELD: &str = "audio_segments";
pub const TRANSCRIPT_TYPE: &str = "TRANSCRIPT";

const SEGMENT_FIELDS: [&str; 5] = [START_FIELD, END_FIELD, INDEX_FIELD, TYPE_FIELD, TEXT_FIELD];

/// Index one past the bracket that closes the `[` or `{` at `open`.
///
/// Brackets inside JSON string literals do not count, so a `]` in a shot
/// description cannot end a `"shots"` array early. Returns `None` when `open`
/// is not an opening bracket or the text ends first.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let opener = *bytes.get(open)?;
    let closer = match opener {
        b'[' => b']',
        b'{' => b'}',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else if b == opener {
            depth += 1;
        } else if b == closer {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
    }
    None
}

/// The raw text from `from` up to (not including) the next unescaped `"`.
pub fn until_unescaped_quote(text: &str, from: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'"' => return text.get(from..i),
            _ => {}
        }
    }
    None
}

/// Strip one leading `,` (and the whitespace around it) left behind by the
/// chunker when a segment was split off a JSON array.
pub fn strip_leading_comma(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix(',') {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    }
}

/// Accept integers, non-negative floats (truncated) and numeric strings.
pub fn loose_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<u64> {
    let raw = raw.trim().trim_matches('"');
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

/// True when `obj` has every field of a transcript segment.
pub fn is_segment_object(obj: &Map<String, Value>) -> bool {
    SEGMENT_FIELDS.iter().all(|field| obj.contains_key(*field))
}

/// Convert one segment object. `Ok(None)` means a well-formed segment of a
/// type other than `TRANSCRIPT`.
pub fn transcript_segment(
    obj: &Map<String, Value>,
) -> Result<Option<TimestampSegment>, ShapeError> {
    let kind = obj
        .get(TYPE_FIELD)
        .ok_or(ShapeError::MissingField(TYPE_FIELD))?
        .as_str()
        .ok_or(ShapeError::WrongType {
            field: TYPE_FIELD,
            expected: "a string",
        })?;
    if kind != TRANSCRIPT_TYPE {
        return Ok(None);
    }

    let number = |field: &'static str| -> Result<u64, ShapeError> {
        let value = obj.get(field).ok_or(ShapeError::MissingField(field))?;
        loose_u64(value).ok_or(ShapeError::WrongType {
            field,
            expected: "a non-negative integer",
        })
    };

    let text = obj
        .get(TEXT_FIELD)
        .ok_or(ShapeError::MissingField(TEXT_FIELD))?
        .as_str()
        .ok_or(ShapeError::WrongType {
            field: TEXT_FIELD,
            expected: "a string",
        })?;

    Ok(Some(TimestampSegment::new(
        number(START_FIELD)?,
        number(END_FIELD)?,
        number(INDEX_FIELD)?,
        text,
    )))
}

fn push_segment(obj: &Map<String, Value>, out: &mut Vec<TimestampSegment>) {
    match transcript_segment(obj) {
        Ok(Some(segment)) => out.push(segment),
        Ok(None) => {}
        Err(err) => debug!(error = %err, "skipping transcript segment"),
    }
}

/// Collect segments from an already parsed value: a single segment, an
/// object holding `audio_segments`, or an array of either.
pub fn collect_segments(value: &Value, out: &mut Vec<TimestampSegment>) {
    match value {
        Value::Object(obj) if is_segment_object(obj) => push_segment(obj, out),
        Value::Object(obj) => {
            let Some(segments) = obj.get(AUDIO_SEGMENTS_FIELD) else {
                return;
            };
            let Some(items) = segments.as_array() else {
                let err = ShapeError::WrongType {
                    field: AUDIO_SEGMENTS_FIELD,
                    expected: "an array",
                };
                debug!(error = %err, "skipping audio segments");
                return;
            };
            for item in items {
                match item.as_object() {
                    Some(segment) => push_segment(segment, out),
                    None => debug!("skipping non-object audio segment"),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_segments(item, out);
            }
        }
        _ => {}
    }
}

/// Tier 1. `None` when the text as a whole is not a JSON object or array.
pub fn parse_structured(text: &str) -> Option<Vec<TimestampSegment>> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    if !(value.is_object() || value.is_array()) {
        return None;
    }
    let mut segments = Vec::new();
    collect_segments(&value, &mut segments);
    Some(segments)
}

/// Result of [`parse_bracketed`]: segments from spans that parsed, and the
/// slices of text no parsed span covered.
#[derive(Debug, Default)]
pub struct BracketScan<'a> {
    pub segments: Vec<TimestampSegment>,
    pub uncovered: Vec<&'a str>,
}

/// Tier 2. Parse every balanced `{...}` span independently.
///
/// A span that fails to parse is not consumed, so objects nested inside a
/// broken wrapper are still found. An unbalanced `{` ends the scan and the
/// rest of the text is left uncovered.
pub fn parse_bracketed(text: &str) -> BracketScan<'_> {
    let mut scan = BracketScan::default();
    let mut region_start = 0;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('{') {
        let open = cursor + offset;
        let Some(close) = matching_close(text, open) else {
            debug!(error = %ShapeError::Unbalanced('{'), at = open, "stopping bracket scan");
            break;
        };

        match serde_json::from_str::<Value>(&text[open..close]) {
            Ok(value) => {
                if open > region_start {
                    scan.uncovered.push(&text[region_start..open]);
                }
                collect_segments(&value, &mut scan.segments);
                region_start = close;
                cursor = close;
            }
            Err(err) => {
                debug!(error = %err, at = open, "span is not valid JSON");
                cursor = open + 1;
            }
        }
    }

    if region_start < text.len() {
        scan.uncovered.push(&text[region_start..]);
    }
    scan
}

/// Position of the value following `"label":` at or after `from`, stopping
/// at `limit`.
fn label_value(text: &str, from: usize, limit: usize, label: &str) -> Option<usize> {
    let needle = format!("\"{label}\"");
    let mut cursor = from;
    while cursor < limit {
        let found = cursor + text[cursor..limit].find(&needle)?;
        let after = found + needle.len();
        let rest = text[after..limit].trim_start();
        if let Some(value) = rest.strip_prefix(':') {
            return Some(limit - value.trim_start().len());
        }
        cursor = after;
    }
    None
}

fn expect_label(
    text: &str,
    from: usize,
    limit: usize,
    label: &'static str,
) -> Result<usize, ShapeError> {
    label_value(text, from, limit, label).ok_or(ShapeError::MissingField(label))
}

fn read_number(text: &str, at: usize) -> Result<(u64, usize), ShapeError> {
    let rest = &text[at..];
    let end = rest
        .find(|c: char| c == ',' || c == '}' || c == '\n')
        .unwrap_or(rest.len());
    let raw = &rest[..end];
    parse_number(raw)
        .map(|n| (n, at + end))
        .ok_or_else(|| ShapeError::Malformed(format!("expected a number, found {raw:?}")))
}

fn read_string(text: &str, at: usize) -> Result<(String, usize), ShapeError> {
    if !text[at..].starts_with('"') {
        return Err(ShapeError::Malformed(format!(
            "expected a string at offset {at}"
        )));
    }
    let raw = until_unescaped_quote(text, at + 1)
        .ok_or_else(|| ShapeError::Malformed("unterminated string".to_string()))?;
    let next = at + 1 + raw.len() + 1;
    let value = serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.to_string());
    Ok((value, next))
}

fn has_transcript_type(text: &str) -> bool {
    let mut cursor = 0;
    while let Some(at) = label_value(text, cursor, text.len(), TYPE_FIELD) {
        if text[at..].starts_with("\"TRANSCRIPT\"") {
            return true;
        }
        cursor = at;
    }
    false
}

/// Read one record whose start value begins at `at`. Every other label must
/// appear, in order, before `limit` (the next record's start label).
fn literal_record(
    text: &str,
    at: usize,
    limit: usize,
) -> Result<Option<TimestampSegment>, ShapeError> {
    let (start, cursor) = read_number(text, at)?;

    let at = expect_label(text, cursor, limit, END_FIELD)?;
    let (end, cursor) = read_number(text, at)?;

    let at = expect_label(text, cursor, limit, INDEX_FIELD)?;
    let (index, cursor) = read_number(text, at)?;

    let at = expect_label(text, cursor, limit, TYPE_FIELD)?;
    let (kind, cursor) = read_string(text, at)?;
    if kind != TRANSCRIPT_TYPE {
        return Ok(None);
    }

    let at = expect_label(text, cursor, limit, TEXT_FIELD)?;
    let (body, _) = read_string(text, at)?;

    Ok(Some(TimestampSegment::new(start, end, index, body)))
}

/// Tier 3. Read segments straight off the field labels.
///
/// Only runs when the text mentions `"start_timestamp_millis"` and has a
/// `"type"` of `"TRANSCRIPT"` somewhere.
pub fn scan_literal(text: &str) -> Vec<TimestampSegment> {
    let mut segments = Vec::new();
    let start_needle = format!("\"{START_FIELD}\"");
    if !text.contains(&start_needle) || !has_transcript_type(text) {
        return segments;
    }

    let mut cursor = 0;
    while let Some(at) = label_value(text, cursor, text.len(), START_FIELD) {
        let limit = text[at..]
            .find(&start_needle)
            .map(|offset| at + offset)
            .unwrap_or(text.len());

        match literal_record(text, at, limit) {
            Ok(Some(segment)) => segments.push(segment),
            Ok(None) => {}
            Err(err) => debug!(error = %err, at, "literal scan skipped a record"),
        }
        cursor = limit;
    }
    segments
}

/// Run all three tiers over one block of response text.
pub fn parse_transcript_fragments(text: &str) -> Vec<TimestampSegment> {
    if let Some(segments) = parse_structured(text) {
        return segments;
    }

    let scan = parse_bracketed(text);
    let mut segments = scan.segments;
    for region in scan.uncovered {
        segments.extend(scan_literal(region));
    }
    segments
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn matching_close_ignores_brackets_in_strings() {
        let text = r#"[{"a": "x]y"}, [1, 2]] tail"#;
        let close = matching_close(text, 0).unwrap();
        assert_eq!(&text[..close], r#"[{"a": "x]y"}, [1, 2]]"#);
    }

    #[test]
    fn matching_close_handles_escaped_quotes() {
        let text = r#"{"a": "say \"}\" twice"} rest"#;
        let close = matching_close(text, 0).unwrap();
        assert_eq!(&text[close..], " rest");
    }

    #[test]
    fn matching_close_unbalanced() {
        assert_eq!(matching_close("[1, [2]", 0), None);
        assert_eq!(matching_close("abc", 0), None);
    }

    #[test]
    fn until_unescaped_quote_skips_escapes() {
        let text = r#"[spk_0] he said \"hi\" then" after"#;
        assert_eq!(
            until_unescaped_quote(text, 0),
            Some(r#"[spk_0] he said \"hi\" then"#)
        );
        assert_eq!(until_unescaped_quote("no quote", 0), None);
    }

    #[test]
    fn strips_one_leading_comma() {
        assert_eq!(strip_leading_comma("  , {\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_leading_comma(",, x"), ", x");
        assert_eq!(strip_leading_comma("{}"), "{}");
    }

    #[test]
    fn loose_u64_accepts_loose_numbers() {
        assert_eq!(loose_u64(&json!(1500)), Some(1500));
        assert_eq!(loose_u64(&json!(1500.9)), Some(1500));
        assert_eq!(loose_u64(&json!("42")), Some(42));
        assert_eq!(loose_u64(&json!(-1)), None);
        assert_eq!(loose_u64(&json!(null)), None);
    }

    #[test]
    fn structured_single_segment() {
        let text = r#"{"start_timestamp_millis": 0, "end_timestamp_millis": 1200, "segment_index": 0, "type": "TRANSCRIPT", "text": "Welcome to the call."}"#;
        let segments = parse_structured(text).unwrap();
        assert_eq!(segments, vec![TimestampSegment::new(0, 1200, 0, "Welcome to the call.")]);
        assert_eq!(segments[0].speaker, "Speaker");
    }

    #[test]
    fn structured_audio_segments_skips_other_types() {
        let text = json!({
            "audio_segments": [
                {"start_timestamp_millis": 0, "end_timestamp_millis": 10, "segment_index": 0, "type": "TRANSCRIPT", "text": "a"},
                {"start_timestamp_millis": 10, "end_timestamp_millis": 20, "segment_index": 1, "type": "MUSIC", "text": "b"},
                {"start_timestamp_millis": 20, "segment_index": 2, "type": "TRANSCRIPT", "text": "no end"},
                {"start_timestamp_millis": 30, "end_timestamp_millis": 40, "segment_index": 3, "type": "TRANSCRIPT", "text": "d"}
            ]
        })
        .to_string();
        let segments = parse_structured(&text).unwrap();
        let indices: Vec<u64> = segments.iter().map(|s| s.segment_index).collect();
        assert_eq!(indices, vec![0, 3]);
    }

    #[test]
    fn structured_rejects_prose() {
        assert!(parse_structured("The speaker said hello").is_none());
        assert!(parse_structured("\"just a string\"").is_none());
    }

    #[test]
    fn bracketed_finds_segments_in_prose() {
        let text = r#"Chunk start {"start_timestamp_millis": 5, "end_timestamp_millis": 9, "segment_index": 4, "type": "TRANSCRIPT", "text": "{braces} in text"} and then {"start_timestamp_millis": 9, "end_timestamp_millis": 12, "segment_index": 5, "type": "TRANSCRIPT", "text": "second"} end"#;
        let scan = parse_bracketed(text);
        assert_eq!(scan.segments.len(), 2);
        assert_eq!(scan.segments[0].text, "{braces} in text");
        assert_eq!(scan.uncovered, vec!["Chunk start ", " and then ", " end"]);
    }

    #[test]
    fn bracketed_recovers_nested_object_inside_broken_wrapper() {
        let text = r#"{"broken": , "inner": {"start_timestamp_millis": 1, "end_timestamp_millis": 2, "segment_index": 7, "type": "TRANSCRIPT", "text": "kept"}}"#;
        let scan = parse_bracketed(text);
        assert_eq!(scan.segments.len(), 1);
        assert_eq!(scan.segments[0].segment_index, 7);
    }

    #[test]
    fn literal_scan_reads_truncated_object() {
        let text = r#"{"start_timestamp_millis": 500, "end_timestamp_millis": 1500, "segment_index": 3, "type": "TRANSCRIPT", "text": "Revenue grew \"strongly\" this quarter"#;
        assert!(parse_structured(text).is_none());
        let segments = scan_literal(text);
        assert!(segments.is_empty(), "text value is unterminated");

        let text = r#"{"start_timestamp_millis": 500, "end_timestamp_millis": 1500, "segment_index": 3, "type": "TRANSCRIPT", "text": "Revenue grew \"strongly\"", "#;
        let segments = scan_literal(text);
        assert_eq!(
            segments,
            vec![TimestampSegment::new(500, 1500, 3, "Revenue grew \"strongly\"")]
        );
    }

    #[test]
    fn literal_scan_does_not_borrow_fields_from_next_record() {
        let text = r#""start_timestamp_millis": 100, "segment_index": 1, "type": "TRANSCRIPT", "text": "missing end",
"start_timestamp_millis": 200, "end_timestamp_millis": 300, "segment_index": 2, "type": "TRANSCRIPT", "text": "complete""#;
        let segments = scan_literal(text);
        assert_eq!(segments, vec![TimestampSegment::new(200, 300, 2, "complete")]);
    }

    #[test]
    fn literal_scan_requires_transcript_type() {
        let text = r#""start_timestamp_millis": 100, "end_timestamp_millis": 200, "segment_index": 1, "type": "MUSIC", "text": "la la""#;
        assert!(scan_literal(text).is_empty());
    }

    #[test]
    fn fragments_fall_through_all_tiers() {
        let text = r#"Intro {"start_timestamp_millis": 0, "end_timestamp_millis": 800, "segment_index": 0, "type": "TRANSCRIPT", "text": "parsed"} then cut off {"start_timestamp_millis": 800, "end_timestamp_millis": 1600, "segment_index": 1, "type": "TRANSCRIPT", "text": "scanned","#;
        let segments = parse_transcript_fragments(text);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["parsed", "scanned"]);
    }
}
