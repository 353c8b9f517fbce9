//! Locate media and timestamps in retrieval and agent responses.
//!
//! Every function here takes a raw `serde_json::Value` and never fails: a
//! missing key or a malformed fragment is logged and skipped, and the caller
//! gets whatever could be recovered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::ShapeError,
    types::{StorageLocation, TimestampSegment},
};

pub mod agent;
pub mod audio;
pub mod link;
pub mod video;

pub use agent::{DEFAULT_EXPERT, locate_audio_from_agent_response, locate_audio_from_expert};
pub use audio::locate_audio;
pub use link::{find_s3_link, find_s3_links};
pub use video::locate_video;

pub const SOURCE_URI_FIELD: &str = "x-amz-bedrock-kb-source-uri";
pub const CITATIONS_FIELD: &str = "citations";
pub const REFERENCES_FIELD: &str = "retrievedReferences";
pub const METADATA_FIELD: &str = "metadata";
pub const CONTENT_FIELD: &str = "content";
pub const TEXT_FIELD: &str = "text";

/// Sidecar pointer plus the transcript lines found next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedAudio {
    pub source: Option<StorageLocation>,
    pub segments: Vec<TimestampSegment>,
}

impl LocatedAudio {
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.segments.is_empty()
    }

    pub fn into_parts(self) -> (Option<StorageLocation>, Vec<TimestampSegment>) {
        (self.source, self.segments)
    }
}

/// Every retrieved reference of every citation, in response order.
pub(crate) fn retrieved_references(response: &Value) -> Vec<&Value> {
    let mut references = Vec::new();

    let Some(citations) = response.get(CITATIONS_FIELD) else {
        debug!(error = %ShapeError::MissingField(CITATIONS_FIELD), "no citations in response");
        return references;
    };
    let Some(citations) = citations.as_array() else {
        debug!("`citations` is not an array");
        return references;
    };

    for citation in citations {
        match citation.get(REFERENCES_FIELD) {
            Some(Value::Array(items)) => references.extend(items),
            Some(_) => debug!("`retrievedReferences` is not an array"),
            None => {}
        }
    }
    references
}

/// `s3://` source URI under `x-amz-bedrock-kb-source-uri`, if it parses.
pub(crate) fn source_location(metadata: &Value) -> Option<StorageLocation> {
    let uri = metadata.get(SOURCE_URI_FIELD)?.as_str()?;
    let location = StorageLocation::parse_s3_uri(uri);
    if location.is_none() {
        debug!(uri, "ignoring source uri without bucket and key");
    }
    location
}

/// `content.text` of a retrieved reference.
pub(crate) fn reference_text(reference: &Value) -> Result<&str, ShapeError> {
    reference
        .get(CONTENT_FIELD)
        .ok_or(ShapeError::MissingField(CONTENT_FIELD))?
        .get(TEXT_FIELD)
        .ok_or(ShapeError::MissingField(TEXT_FIELD))?
        .as_str()
        .ok_or(ShapeError::WrongType {
            field: TEXT_FIELD,
            expected: "a string",
        })
}

/// Keep `candidate` only while nothing has been recorded yet.
pub(crate) fn keep_first<T>(slot: &mut Option<T>, candidate: impl FnOnce() -> Option<T>) {
    if slot.is_none() {
        *slot = candidate();
    }
}

/// Deduplicate by `segment_index`, later segments replacing earlier ones, and
/// order ascending by index.
pub(crate) fn order_segments(segments: Vec<TimestampSegment>) -> Vec<TimestampSegment> {
    let mut by_index = BTreeMap::new();
    for segment in segments {
        by_index.insert(segment.segment_index, segment);
    }
    by_index.into_values().collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn order_segments_last_wins_and_sorts() {
        let ordered = order_segments(vec![
            TimestampSegment::new(2000, 3000, 2, "two"),
            TimestampSegment::new(0, 1000, 1, "first one"),
            TimestampSegment::new(0, 1000, 1, "second one"),
        ]);
        let texts: Vec<&str> = ordered.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["second one", "two"]);
    }

    #[test]
    fn keep_first_does_not_override() {
        let mut slot = None;
        keep_first(&mut slot, || Some(1));
        keep_first(&mut slot, || Some(2));
        assert_eq!(slot, Some(1));
    }

    #[test]
    fn retrieved_references_tolerates_bad_shapes() {
        let response = json!({
            "citations": [
                {"retrievedReferences": [{"a": 1}, {"b": 2}]},
                {"retrievedReferences": "oops"},
                {"generatedResponsePart": {}},
                {"retrievedReferences": [{"c": 3}]}
            ]
        });
        assert_eq!(retrieved_references(&response).len(), 3);
        assert!(retrieved_references(&json!({"citations": 5})).is_empty());
        assert!(retrieved_references(&json!([])).is_empty());
    }

    #[test]
    fn reference_text_reports_what_is_missing() {
        assert_eq!(
            reference_text(&json!({})),
            Err(ShapeError::MissingField(CONTENT_FIELD))
        );
        assert_eq!(
            reference_text(&json!({"content": {"text": 3}})),
            Err(ShapeError::WrongType {
                field: TEXT_FIELD,
                expected: "a string"
            })
        );
        assert_eq!(reference_text(&json!({"content": {"text": "x"}})), Ok("x"));
    }
}
