use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const SPEAKER_PLACEHOLDER: &str = "Speaker";

/// A bucket/key pair in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub key: String,
}

impl StorageLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `s3://<bucket>/<key...>`. The key keeps any further slashes and
    /// must not be empty.
    pub fn parse_s3_uri(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("s3://")?;
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(bucket, key))
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// One transcript line recovered from response text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSegment {
    pub start: u64,
    pub end: u64,
    pub segment_index: u64,
    pub text: String,
    pub speaker: String,
}

impl TimestampSegment {
    pub fn new(start: u64, end: u64, segment_index: u64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            segment_index,
            text: text.into(),
            speaker: SPEAKER_PLACEHOLDER.to_string(),
        }
    }

    pub fn duration_millis(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// A detected visual shot. Only `shot_index` is guaranteed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotSegment {
    pub shot_index: u64,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub start_timecode: Option<String>,
    pub end_timecode: Option<String>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub s3_uri: Option<StorageLocation>,
    pub timestamps: Vec<ShotSegment>,
    pub summary: Option<String>,
    pub transcript: Option<String>,
}

impl VideoInfo {
    pub fn is_empty(&self) -> bool {
        self.s3_uri.is_none()
            && self.timestamps.is_empty()
            && self.summary.is_none()
            && self.transcript.is_none()
    }
}

/// JSON document stored next to the media it describes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSidecar {
    #[serde(default)]
    pub metadata: SidecarMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarMetadata {
    pub s3_bucket: Option<String>,
    pub s3_key: Option<String>,
    pub sample_rate: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaSidecar {
    /// Where the media lives, if the sidecar names both bucket and key.
    pub fn media_location(&self) -> Option<StorageLocation> {
        let bucket = self.metadata.s3_bucket.as_deref().filter(|b| !b.is_empty())?;
        let key = self.metadata.s3_key.as_deref().filter(|k| !k.is_empty())?;
        Some(StorageLocation::new(bucket, key))
    }

    pub fn sample_rate(&self) -> u32 {
        self.metadata.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}
