use crate::{
    locator::LocatedAudio,
    media::SegmentClip,
    types::{ShotSegment, TimestampSegment, VideoInfo},
};

pub fn seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Format milliseconds as MM:SS timestamp
pub fn format_timestamp(millis: u64) -> String {
    let total = millis / 1000;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format transcript segments with timestamps
pub fn format_segments(segments: &[TimestampSegment]) -> String {
    segments
        .iter()
        .map(|seg| {
            format!(
                "[{}–{}] #{} {}",
                format_timestamp(seg.start),
                format_timestamp(seg.end),
                seg.segment_index,
                seg.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_shot(shot: &ShotSegment) -> String {
    let start = shot.start_time.map(format_timestamp).unwrap_or_default();
    let end = shot
        .end_time
        .map(format_timestamp)
        .unwrap_or_else(|| "?".to_string());
    let mut line = format!("Shot {} [{}–{}]", shot.shot_index, start, end);
    if let (Some(from), Some(to)) = (&shot.start_timecode, &shot.end_timecode) {
        line.push_str(&format!(" {from} → {to}"));
    }
    if let Some(duration) = shot.duration {
        line.push_str(&format!(" ({:.1}s)", seconds(duration)));
    }
    line
}

pub fn format_audio_readable(located: &LocatedAudio) -> String {
    let mut output = String::new();
    output.push_str("# Audio\n\n");
    match &located.source {
        Some(source) => output.push_str(&format!("**Sidecar:** {}\n\n", source)),
        None => output.push_str("**Sidecar:** not found\n\n"),
    }

    output.push_str(&format!("## Transcript ({} segments)\n\n", located.segments.len()));
    if !located.segments.is_empty() {
        output.push_str(&format_segments(&located.segments));
        output.push('\n');
    }

    output
}

pub fn format_video_readable(info: &VideoInfo) -> String {
    let mut output = String::new();
    output.push_str("# Video\n\n");
    match &info.s3_uri {
        Some(source) => output.push_str(&format!("**Sidecar:** {}\n\n", source)),
        None => output.push_str("**Sidecar:** not found\n\n"),
    }

    if let Some(summary) = &info.summary {
        output.push_str("## Summary\n\n");
        output.push_str(summary);
        output.push_str("\n\n");
    }

    output.push_str(&format!("## Shots ({})\n\n", info.timestamps.len()));
    for shot in &info.timestamps {
        output.push_str(&format!("• {}\n", format_shot(shot)));
    }
    output.push('\n');

    if let Some(transcript) = &info.transcript {
        output.push_str("## Transcript\n\n");
        output.push_str(transcript);
        output.push('\n');
    }

    output
}

pub fn format_clip(position: usize, clip: &SegmentClip) -> String {
    format!(
        "Segment {}:\nText: {}\nTime Range: {:.2}s - {:.2}s ({:.2}s)\n{}",
        position,
        clip.text,
        clip.start_seconds,
        clip.end_seconds,
        clip.duration_seconds(),
        clip.url
    )
}
