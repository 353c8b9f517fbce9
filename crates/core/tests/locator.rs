use kbmedia_core::{
    StorageLocation, locate_audio, locate_audio_from_agent_response, locate_audio_from_expert,
    locate_video, locator::DEFAULT_EXPERT,
};
use serde_json::{Value, json};

fn transcript_json(start: u64, end: u64, index: u64, text: &str) -> String {
    json!({
        "start_timestamp_millis": start,
        "end_timestamp_millis": end,
        "segment_index": index,
        "type": "TRANSCRIPT",
        "text": text,
    })
    .to_string()
}

fn retrieval(references: Vec<Value>) -> Value {
    json!({
        "output": {"text": "The CFO said revenue grew."},
        "citations": [{
            "generatedResponsePart": {"textResponsePart": {"text": "revenue grew"}},
            "retrievedReferences": references,
        }]
    })
}

fn reference(uri: &str, text: &str) -> Value {
    json!({
        "content": {"text": text},
        "location": {"type": "S3"},
        "metadata": {"x-amz-bedrock-kb-source-uri": uri},
    })
}

#[test]
fn out_of_order_segments_are_sorted() {
    let response = retrieval(vec![
        reference("s3://kb/call.json", &transcript_json(5000, 9000, 2, "Second.")),
        reference("s3://kb/call.json", &transcript_json(0, 5000, 1, "First.")),
    ]);
    let located = locate_audio(&response);
    let indices: Vec<u64> = located.segments.iter().map(|s| s.segment_index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[test]
fn duplicate_index_keeps_last_reference() {
    let response = retrieval(vec![
        reference("s3://kb/call.json", &transcript_json(0, 5000, 1, "early copy")),
        reference("s3://kb/call.json", &transcript_json(0, 5000, 1, "late copy")),
    ]);
    let located = locate_audio(&response);
    assert_eq!(located.segments.len(), 1);
    assert_eq!(located.segments[0].text, "late copy");
}

#[test]
fn no_source_uri_yields_nothing() {
    let response = json!({
        "citations": [{
            "retrievedReferences": [{"content": {"text": "plain prose, no fragments"}}]
        }]
    });
    let (source, segments) = locate_audio(&response).into_parts();
    assert_eq!(source, None);
    assert!(segments.is_empty());
}

#[test]
fn first_source_uri_wins() {
    let response = retrieval(vec![
        reference("s3://kb/first.json", "no segments"),
        reference("s3://kb/second.json", "no segments"),
    ]);
    assert_eq!(
        locate_audio(&response).source,
        Some(StorageLocation::new("kb", "first.json"))
    );
    assert_eq!(
        locate_video(&response).s3_uri,
        Some(StorageLocation::new("kb", "first.json"))
    );
}

#[test]
fn segments_embedded_in_prose_and_truncated_chunks() {
    let chunk = format!(
        "Earnings call transcript: {} and the chunk ends mid-object {{\"start_timestamp_millis\": 7000, \"end_timestamp_millis\": 9500, \"segment_index\": 4, \"type\": \"TRANSCRIPT\", \"text\": \"Guidance is unchanged.\",",
        transcript_json(3000, 7000, 3, "Margins expanded.")
    );
    let located = locate_audio(&retrieval(vec![reference("s3://kb/call.json", &chunk)]));
    let texts: Vec<&str> = located.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Margins expanded.", "Guidance is unchanged."]);
}

#[test]
fn shots_array_survives_decoy_bracket() {
    let text = r#"{"summary": "Product launch", "shots": [{"shot_index": 1, "start_timestamp_millis": 5000, "end_timestamp_millis": 9000, "description": "slide reads \"step ]2[\""}, {"shot_index": 0, "start_timestamp_millis": 0, "end_timestamp_millis": 5000, "description": "logo ] fade"}, {"shot_index": 2, "start_timestamp_millis": 9000, "end_timestamp_millis": 12000}], "transcript": "[spk_0] Welcome to the launch."}"#;
    let info = locate_video(&retrieval(vec![reference("s3://kb/launch.json", text)]));

    let indices: Vec<u64> = info.timestamps.iter().map(|s| s.shot_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(info.summary.as_deref(), Some("Product launch"));
    assert_eq!(info.transcript.as_deref(), Some("[spk_0] Welcome to the launch."));
}

#[test]
fn video_merges_array_and_inline_shots_across_references() {
    let first = r#"{"shots": [{"shot_index": 0, "start_timestamp_millis": 0}, {"shot_index": 1, "start_timestamp_millis": 4000}]}"#;
    let second = r#"{"shot_index": 1, "start_timestamp_millis": 9999, "duration_millis": 10} and {"shot_index": 5}"#;
    let third = r#"{"shot_index": 2, "start_timestamp_millis": 2000, "start_timecode_smpte": "00:00:02:00"}"#;
    let info = locate_video(&retrieval(vec![
        reference("s3://kb/v.json", first),
        reference("s3://kb/v.json", second),
        reference("s3://kb/v.json", third),
    ]));

    let pairs: Vec<(u64, Option<u64>)> = info
        .timestamps
        .iter()
        .map(|s| (s.shot_index, s.start_time))
        .collect();
    assert_eq!(pairs, vec![(0, Some(0)), (2, Some(2000)), (1, Some(4000))]);
}

#[test]
fn video_summary_and_transcript_keep_first_match() {
    let info = locate_video(&retrieval(vec![
        reference("s3://kb/v.json", r#""summary": "first summary""#),
        reference("s3://kb/v.json", r#""summary": "second summary", "[spk_0] only transcript""#),
    ]));
    assert_eq!(info.summary.as_deref(), Some("first summary"));
    assert_eq!(info.transcript.as_deref(), Some("[spk_0] only transcript"));
}

#[test]
fn empty_summary_does_not_block_later_reference() {
    let info = locate_video(&retrieval(vec![
        reference("s3://kb/v.json", r#"{"summary": ""}"#),
        reference("s3://kb/v.json", r#"{"summary": "Real summary"}"#),
    ]));
    assert_eq!(info.summary.as_deref(), Some("Real summary"));
}

#[test]
fn agent_literal_scan_fallback() {
    let page_content = r#", {"start_timestamp_millis": 500, "end_timestamp_millis": 2500, "segment_index": 0, "type": "TRANSCRIPT", "text": "Thanks for joining", "confidence": 0.9"#;
    let response = json!([{
        DEFAULT_EXPERT: {
            "raw_response": {
                "source_documents": [{
                    "metadata": {"source_metadata": {"x-amz-bedrock-kb-source-uri": "s3://kb/call.json"}},
                    "page_content": page_content,
                }]
            }
        }
    }]);

    let located = locate_audio_from_agent_response(&response);
    assert_eq!(located.source, Some(StorageLocation::new("kb", "call.json")));
    assert_eq!(located.segments.len(), 1);
    assert_eq!(located.segments[0].start, 500);
    assert_eq!(located.segments[0].text, "Thanks for joining");

    assert_eq!(locate_audio_from_expert(&response, DEFAULT_EXPERT), located);
}

#[test]
fn agent_dedup_matches_retrieval_rules() {
    let documents: Vec<Value> = [(2, "two"), (1, "one (old)"), (1, "one (new)")]
        .iter()
        .map(|(index, text)| {
            json!({
                "metadata": {"source_metadata": {}},
                "page_content": transcript_json(index * 1000, index * 1000 + 900, *index, text),
            })
        })
        .collect();
    let response = json!([{ "audio_expert": { "raw_response": { "source_documents": documents } } }]);

    let located = locate_audio_from_agent_response(&response);
    let texts: Vec<&str> = located.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["one (new)", "two"]);
}

#[test]
fn locators_are_idempotent_and_leave_input_untouched() {
    let response = retrieval(vec![
        reference("s3://kb/call.json", &transcript_json(5000, 9000, 2, "Second.")),
        reference("s3://kb/call.json", r#""shots": [{"shot_index": 0, "start_timestamp_millis": 0}]"#),
    ]);
    let snapshot = response.clone();

    assert_eq!(locate_audio(&response), locate_audio(&response));
    assert_eq!(locate_video(&response), locate_video(&response));
    assert_eq!(response, snapshot);
}

#[test]
fn garbage_inputs_degrade_to_empty() {
    for response in [
        json!(null),
        json!("text"),
        json!({"citations": "nope"}),
        json!({"citations": [{"retrievedReferences": [null, 3, {"content": null}]}]}),
    ] {
        assert!(locate_audio(&response).is_empty());
        assert!(locate_video(&response).is_empty());
        assert!(locate_audio_from_agent_response(&response).is_empty());
    }
}
