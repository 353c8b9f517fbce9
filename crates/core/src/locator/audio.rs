use serde_json::Value;
use tracing::debug;

use crate::tolerant::parse_transcript_fragments;

use super::{
    LocatedAudio, METADATA_FIELD, keep_first, order_segments, reference_text,
    retrieved_references, source_location,
};

/// Find the audio sidecar and transcript segments in a retrieval response.
///
/// The first reference whose source URI parses sets `source`; later ones are
/// ignored. Segments come from every reference's `content.text`, deduplicated
/// by `segment_index` (last one wins) and sorted by it.
pub fn locate_audio(response: &Value) -> LocatedAudio {
    let mut source = None;
    let mut segments = Vec::new();

    for (position, reference) in retrieved_references(response).into_iter().enumerate() {
        keep_first(&mut source, || {
            reference.get(METADATA_FIELD).and_then(source_location)
        });

        match reference_text(reference) {
            Ok(text) => segments.extend(parse_transcript_fragments(text)),
            Err(err) => debug!(reference = position, error = %err, "reference has no text"),
        }
    }

    LocatedAudio {
        source,
        segments: order_segments(segments),
    }
}
