//! kbmedia core library
//!
//! Locates media sidecars and timestamped segments inside knowledge-base
//! retrieval and agent responses, and resolves sidecars to playable media.

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod locator;
pub mod media;
pub mod store;
pub mod tolerant;
pub mod types;

// Re-export commonly used items at crate root
pub use cache::MediaCache;
pub use config::{ConfigError, Settings};
pub use document::{DocumentConfig, IngestRequest};
pub use error::{Error, Result, ShapeError};
pub use format::{format_audio_readable, format_segments, format_timestamp, format_video_readable};
pub use locator::{
    LocatedAudio, find_s3_link, locate_audio, locate_audio_from_agent_response,
    locate_audio_from_expert, locate_video,
};
pub use media::{MediaLibrary, MediaSource, ResolvedMedia, SegmentClip};
pub use store::{MediaStore, MemoryStore, S3MediaStore};
pub use types::{MediaSidecar, ShotSegment, StorageLocation, TimestampSegment, VideoInfo};
