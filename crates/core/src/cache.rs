use std::{
    hash::{DefaultHasher, Hash, Hasher},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::fs;

use crate::{
    error::{Error, Result},
    types::StorageLocation,
};

/// On-disk cache of fetched media, keyed by the media's own location.
///
/// Each location gets its own directory, so bytes fetched for one source are
/// never served for another.
#[derive(Debug, Clone)]
pub struct MediaCache {
    root: PathBuf,
}

impl MediaCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the cache directory for a given location
    pub fn entry_dir(&self, location: &StorageLocation) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        location.hash(&mut hasher);
        self.root.join(hasher.finish().to_string())
    }

    /// Get the path for a cached media file
    pub fn media_path(&self, location: &StorageLocation) -> PathBuf {
        let file_name = location
            .key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("media.bin");
        self.entry_dir(location).join(file_name)
    }

    /// Cached bytes, or `None` on a miss.
    pub async fn get(&self, location: &StorageLocation) -> Result<Option<Vec<u8>>> {
        let path = self.media_path(location);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Cache { path, source }),
        }
    }

    pub async fn put(&self, location: &StorageLocation, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.media_path(location);
        let cache_err = |source| Error::Cache {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(self.entry_dir(location))
            .await
            .map_err(cache_err)?;
        fs::write(&path, bytes).await.map_err(cache_err)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_keyed_by_location() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(dir.path());
        let first = StorageLocation::new("raw", "calls/q3.mp3");
        let second = StorageLocation::new("raw", "calls/q4.mp3");

        assert_eq!(cache.get(&first).await.unwrap(), None);
        let path = cache.put(&first, b"q3 audio").await.unwrap();
        assert!(path.ends_with("q3.mp3"));

        assert_eq!(cache.get(&first).await.unwrap(), Some(b"q3 audio".to_vec()));
        assert_eq!(cache.get(&second).await.unwrap(), None);
    }

    #[test]
    fn same_file_name_in_different_buckets_does_not_collide() {
        let cache = MediaCache::new("/tmp/kbmedia-test");
        let a = cache.media_path(&StorageLocation::new("a", "audio.mp3"));
        let b = cache.media_path(&StorageLocation::new("b", "audio.mp3"));
        assert_ne!(a, b);
    }
}
