use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use aws_sdk_s3::{
    Client, error::DisplayErrorContext, operation::get_object::GetObjectError,
    presigning::PresigningConfig,
};

use crate::{
    config::Settings,
    error::{Error, Result},
    types::StorageLocation,
};

/// Read access to the blob store holding sidecars and media.
pub trait MediaStore: Send + Sync {
    /// Read a whole object.
    fn get_object(
        &self,
        location: &StorageLocation,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// A URL that fetches `location` without credentials until it expires.
    fn presign_get(
        &self,
        location: &StorageLocation,
        expires_in: Duration,
    ) -> impl Future<Output = Result<String>> + Send;
}

pub struct S3MediaStore {
    client: Client,
}

impl S3MediaStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS credential and region chain.
    /// `settings.s3_endpoint` switches to a custom endpoint with path-style
    /// addressing (MinIO, LocalStack).
    pub async fn from_settings(settings: &Settings) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.s3_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

impl MediaStore for S3MediaStore {
    async fn get_object(&self, location: &StorageLocation) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    Error::NotFound {
                        location: location.clone(),
                    }
                } else {
                    Error::FetchFailed {
                        location: location.clone(),
                        reason: DisplayErrorContext(&err).to_string(),
                    }
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|err| Error::FetchFailed {
                location: location.clone(),
                reason: err.to_string(),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn presign_get(&self, location: &StorageLocation, expires_in: Duration) -> Result<String> {
        let presign_failed = |reason: String| Error::PresignFailed {
            location: location.clone(),
            reason,
        };

        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|err| presign_failed(err.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .presigned(config)
            .await
            .map_err(|err| presign_failed(DisplayErrorContext(&err).to_string()))?;

        Ok(request.uri().to_string())
    }
}

/// In-memory store for tests and offline runs. Presigned URLs are fake but
/// carry the location and expiry.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<StorageLocation, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: StorageLocation, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .expect("MemoryStore poisoned")
            .insert(location, bytes.into());
    }

    /// How many `get_object` calls were made.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl MediaStore for MemoryStore {
    async fn get_object(&self, location: &StorageLocation) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.objects
            .lock()
            .expect("MemoryStore poisoned")
            .get(location)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                location: location.clone(),
            })
    }

    async fn presign_get(&self, location: &StorageLocation, expires_in: Duration) -> Result<String> {
        Ok(format!(
            "https://{}.s3.memory/{}?X-Amz-Expires={}",
            location.bucket,
            location.key,
            expires_in.as_secs()
        ))
    }
}
