use serde_json::Value;
use tracing::debug;

use crate::{
    error::ShapeError,
    tolerant::{parse_transcript_fragments, strip_leading_comma},
};

use super::{LocatedAudio, METADATA_FIELD, order_segments, source_location};

pub const RAW_RESPONSE_FIELD: &str = "raw_response";
pub const SOURCE_DOCUMENTS_FIELD: &str = "source_documents";
pub const SOURCE_METADATA_FIELD: &str = "source_metadata";
pub const PAGE_CONTENT_FIELD: &str = "page_content";

/// Expert name used by the earnings-call demo agent.
pub const DEFAULT_EXPERT: &str = "audioearningcall_expert";

/// Same as [`super::locate_audio`], for an agent response: a list of items
/// keyed by expert name, each holding `raw_response.source_documents`.
///
/// Every expert that returned source documents is read.
pub fn locate_audio_from_agent_response(response: &Value) -> LocatedAudio {
    walk(response, None)
}

/// Like [`locate_audio_from_agent_response`] but only reads `expert`.
pub fn locate_audio_from_expert(response: &Value, expert: &str) -> LocatedAudio {
    walk(response, Some(expert))
}

fn walk(response: &Value, expert: Option<&str>) -> LocatedAudio {
    let mut source = None;
    let mut segments = Vec::new();

    for document in source_documents(response, expert) {
        if source.is_none() {
            let Some(source_metadata) = document
                .get(METADATA_FIELD)
                .and_then(|metadata| metadata.get(SOURCE_METADATA_FIELD))
            else {
                debug!(
                    error = %ShapeError::MissingField(SOURCE_METADATA_FIELD),
                    "skipping document before a source is known"
                );
                continue;
            };
            source = source_location(source_metadata);
        }

        match page_content(document) {
            Ok(content) => {
                segments.extend(parse_transcript_fragments(strip_leading_comma(content)))
            }
            Err(err) => debug!(error = %err, "source document has no page content"),
        }
    }

    LocatedAudio {
        source,
        segments: order_segments(segments),
    }
}

/// A bare object is read as a one-item response.
fn items(response: &Value) -> &[Value] {
    match response {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => std::slice::from_ref(response),
        _ => &[],
    }
}

fn source_documents<'a>(response: &'a Value, expert: Option<&str>) -> Vec<&'a Value> {
    let mut documents = Vec::new();

    for item in items(response) {
        let Some(entries) = item.as_object() else {
            continue;
        };
        for (name, output) in entries {
            if expert.is_some_and(|wanted| wanted != name.as_str()) {
                continue;
            }
            match expert_documents(output) {
                Ok(found) => documents.extend(found),
                Err(err) => debug!(expert = %name, error = %err, "entry has no source documents"),
            }
        }
    }
    documents
}

fn expert_documents(output: &Value) -> Result<&Vec<Value>, ShapeError> {
    output
        .get(RAW_RESPONSE_FIELD)
        .ok_or(ShapeError::MissingField(RAW_RESPONSE_FIELD))?
        .get(SOURCE_DOCUMENTS_FIELD)
        .ok_or(ShapeError::MissingField(SOURCE_DOCUMENTS_FIELD))?
        .as_array()
        .ok_or(ShapeError::WrongType {
            field: SOURCE_DOCUMENTS_FIELD,
            expected: "an array",
        })
}

fn page_content(document: &Value) -> Result<&str, ShapeError> {
    document
        .get(PAGE_CONTENT_FIELD)
        .ok_or(ShapeError::MissingField(PAGE_CONTENT_FIELD))?
        .as_str()
        .ok_or(ShapeError::WrongType {
            field: PAGE_CONTENT_FIELD,
            expected: "a string",
        })
}
