use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    cache::MediaCache,
    config::{DEFAULT_PRESIGN_TTL, Settings},
    error::{Error, Result},
    format::seconds,
    store::MediaStore,
    types::{MediaSidecar, StorageLocation, TimestampSegment},
};

pub const AUDIO_MIME: &str = "audio/wav";
pub const VIDEO_MIME: &str = "video/mp4";
pub const SHOT_VIDEO_MIME: &str = "video/x-m4v";

/// The media a sidecar points at, ready to hand to a player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMedia {
    pub sidecar: StorageLocation,
    pub media: StorageLocation,
    pub sample_rate: u32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSource {
    pub url: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub media: StorageLocation,
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
}

/// One playable transcript segment: a media-fragment URL over the whole file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentClip {
    pub segment_index: u64,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub url: String,
    pub mime_type: String,
}

impl SegmentClip {
    pub fn duration_seconds(&self) -> f64 {
        (self.end_seconds - self.start_seconds).max(0.0)
    }
}

/// Resolves sidecars to playable media through a [`MediaStore`].
pub struct MediaLibrary<S> {
    store: S,
    cache: Option<MediaCache>,
    presign_ttl: Duration,
}

impl<S: MediaStore> MediaLibrary<S> {
    pub fn new(store: S, settings: &Settings) -> Self {
        Self {
            store,
            cache: settings.cache_dir.clone().map(MediaCache::new),
            presign_ttl: settings.presign_ttl,
        }
    }

    pub fn without_cache(store: S) -> Self {
        Self {
            store,
            cache: None,
            presign_ttl: DEFAULT_PRESIGN_TTL,
        }
    }

    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn fetch_sidecar(&self, location: &StorageLocation) -> Result<MediaSidecar> {
        let bytes = self.store.get_object(location).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn media_location(
        &self,
        sidecar_location: &StorageLocation,
    ) -> Result<(MediaSidecar, StorageLocation)> {
        let sidecar = self.fetch_sidecar(sidecar_location).await?;
        let media = sidecar
            .media_location()
            .ok_or_else(|| Error::SidecarIncomplete {
                location: sidecar_location.clone(),
            })?;
        Ok((sidecar, media))
    }

    /// Follow a sidecar to its media and presign it.
    pub async fn resolve(&self, sidecar_location: &StorageLocation) -> Result<ResolvedMedia> {
        let (sidecar, media) = self.media_location(sidecar_location).await?;
        let url = self.store.presign_get(&media, self.presign_ttl).await?;
        debug!(sidecar = %sidecar_location, media = %media, "resolved sidecar");

        Ok(ResolvedMedia {
            sidecar: sidecar_location.clone(),
            media,
            sample_rate: sidecar.sample_rate(),
            url,
        })
    }

    /// Audio bytes named by a sidecar, read through the cache when one is
    /// configured.
    pub async fn fetch_audio(&self, sidecar_location: &StorageLocation) -> Result<AudioPayload> {
        let (sidecar, media) = self.media_location(sidecar_location).await?;

        if let Some(cache) = &self.cache {
            match cache.get(&media).await {
                Ok(Some(bytes)) => {
                    debug!(media = %media, "audio served from cache");
                    return Ok(AudioPayload {
                        media,
                        bytes,
                        sample_rate: sidecar.sample_rate(),
                    });
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "media cache read failed"),
            }
        }

        let bytes = self.store.get_object(&media).await?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(&media, &bytes).await {
                warn!(error = %err, "media cache write failed");
            }
        }

        Ok(AudioPayload {
            media,
            bytes,
            sample_rate: sidecar.sample_rate(),
        })
    }

    /// One presigned URL, one clip per segment.
    pub async fn segment_clips(
        &self,
        sidecar_location: &StorageLocation,
        segments: &[TimestampSegment],
    ) -> Result<Vec<SegmentClip>> {
        let resolved = self.resolve(sidecar_location).await?;
        Ok(clips_for(&resolved.url, segments))
    }

    pub async fn video_source(
        &self,
        sidecar_location: &StorageLocation,
        mime_type: &str,
    ) -> Result<MediaSource> {
        let resolved = self.resolve(sidecar_location).await?;
        Ok(MediaSource {
            url: resolved.url,
            mime_type: mime_type.to_string(),
        })
    }
}

/// Clips addressing `start..end` of the file at `url` with a `#t=` fragment.
pub fn clips_for(url: &str, segments: &[TimestampSegment]) -> Vec<SegmentClip> {
    segments
        .iter()
        .map(|segment| {
            let start_seconds = seconds(segment.start);
            let end_seconds = seconds(segment.end);
            SegmentClip {
                segment_index: segment.segment_index,
                text: segment.text.clone(),
                start_seconds,
                end_seconds,
                url: format!("{url}#t={start_seconds},{end_seconds}"),
                mime_type: AUDIO_MIME.to_string(),
            }
        })
        .collect()
}
