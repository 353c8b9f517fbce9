use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    error::ShapeError,
    tolerant::{loose_u64, matching_close, until_unescaped_quote},
    types::{ShotSegment, VideoInfo},
};

use super::{
    CONTENT_FIELD, METADATA_FIELD, TEXT_FIELD, keep_first, retrieved_references, source_location,
};

pub const SHOT_INDEX_FIELD: &str = "shot_index";
pub const SHOT_START_FIELD: &str = "start_timestamp_millis";
pub const SHOT_END_FIELD: &str = "end_timestamp_millis";
pub const SHOT_START_TIMECODE_FIELD: &str = "start_timecode_smpte";
pub const SHOT_END_TIMECODE_FIELD: &str = "end_timecode_smpte";
pub const SHOT_DURATION_FIELD: &str = "duration_millis";
pub const TRANSCRIPT_MARKER: &str = "[spk_0]";

static SHOTS_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""shots"\s*:\s*\["#).expect("shots pattern is valid"));
static SUMMARY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""summary"\s*:\s*""#).expect("summary pattern is valid"));

/// Collect the video sidecar, shots, summary and transcript from a retrieval
/// response.
///
/// `s3_uri`, `summary` and `transcript` keep their first match. Shots are
/// merged across references, deduplicated by `shot_index` (first one wins),
/// dropped when they lack a start time and sorted by start time.
pub fn locate_video(response: &Value) -> VideoInfo {
    let mut info = VideoInfo::default();
    let mut shots = Vec::new();

    for (position, reference) in retrieved_references(response).into_iter().enumerate() {
        if let Err(err) = scan_reference(reference, &mut info, &mut shots) {
            warn!(reference = position, error = %err, "skipping reference");
        }
    }

    info.timestamps = merge_shots(shots);
    info
}

fn scan_reference(
    reference: &Value,
    info: &mut VideoInfo,
    shots: &mut Vec<ShotSegment>,
) -> Result<(), ShapeError> {
    keep_first(&mut info.s3_uri, || {
        reference.get(METADATA_FIELD).and_then(source_location)
    });

    let Some(content) = reference.get(CONTENT_FIELD) else {
        return Ok(());
    };
    let text = match content.get(TEXT_FIELD) {
        None => return Ok(()),
        Some(Value::String(text)) => text.as_str(),
        Some(_) => {
            return Err(ShapeError::WrongType {
                field: TEXT_FIELD,
                expected: "a string",
            });
        }
    };

    shots.extend(shots_array(text));
    shots.extend(inline_shot(text));
    keep_first(&mut info.summary, || summary(text));
    keep_first(&mut info.transcript, || transcript(text));
    Ok(())
}

/// Build a shot from a JSON object carrying `shot_index`.
pub fn shot_from_object(obj: &Map<String, Value>) -> Option<ShotSegment> {
    let shot_index = loose_u64(obj.get(SHOT_INDEX_FIELD)?)?;
    let number = |field: &str| obj.get(field).and_then(loose_u64);
    let string = |field: &str| obj.get(field).and_then(Value::as_str).map(str::to_string);

    Some(ShotSegment {
        shot_index,
        start_time: number(SHOT_START_FIELD),
        end_time: number(SHOT_END_FIELD),
        start_timecode: string(SHOT_START_TIMECODE_FIELD),
        end_timecode: string(SHOT_END_TIMECODE_FIELD),
        duration: number(SHOT_DURATION_FIELD),
    })
}

/// Shots from the first `"shots": [...]` array in `text`.
pub fn shots_array(text: &str) -> Vec<ShotSegment> {
    let Some(marker) = SHOTS_ARRAY.find(text) else {
        return Vec::new();
    };
    let open = marker.end() - 1;
    let Some(close) = matching_close(text, open) else {
        debug!(error = %ShapeError::Unbalanced('['), "shots array never closes");
        return Vec::new();
    };

    let raw = &text[open..close];
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(shot_from_object)
            .collect(),
        Err(err) => {
            debug!(error = %err, shots = preview(raw), "failed to parse shots array");
            Vec::new()
        }
    }
}

/// A lone shot object: the first `{` in `text` and its matching `}`.
pub fn inline_shot(text: &str) -> Option<ShotSegment> {
    if !(text.contains(SHOT_INDEX_FIELD) && text.contains(SHOT_START_FIELD)) {
        return None;
    }
    let open = text.find('{')?;
    let close = matching_close(text, open)?;
    let value: Value = serde_json::from_str(&text[open..close]).ok()?;
    let obj = value.as_object()?;
    if !(obj.contains_key(SHOT_INDEX_FIELD) && obj.contains_key(SHOT_START_FIELD)) {
        return None;
    }
    shot_from_object(obj)
}

/// Raw text of the first `"summary": "..."` value. An empty value counts
/// as no summary.
pub fn summary(text: &str) -> Option<String> {
    let marker = SUMMARY_VALUE.find(text)?;
    until_unescaped_quote(text, marker.end())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// From the first `[spk_0]` marker up to the next unescaped quote.
pub fn transcript(text: &str) -> Option<String> {
    let start = text.find(TRANSCRIPT_MARKER)?;
    until_unescaped_quote(text, start).map(str::to_string)
}

/// Drop shots without a start time, keep the first shot per index, and sort
/// by start time.
pub fn merge_shots(shots: Vec<ShotSegment>) -> Vec<ShotSegment> {
    let mut seen = HashSet::new();
    let mut merged: Vec<ShotSegment> = shots
        .into_iter()
        .filter(|shot| shot.start_time.is_some())
        .filter(|shot| seen.insert(shot.shot_index))
        .collect();
    merged.sort_by_key(|shot| shot.start_time);
    merged
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(200) {
        Some((cut, _)) => &raw[..cut],
        None => raw,
    }
}
