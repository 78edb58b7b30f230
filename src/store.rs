use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::StoreError;
use crate::model::{Podcast, url_hash};

/// Directory of podcast documents, one `<url hash>.json` per podcast
#[derive(Debug, Clone)]
pub struct PodcastStore {
    feed_dir: PathBuf,
}

impl PodcastStore {
    /// Open the store, creating the directory if it does not exist yet
    pub fn open(feed_dir: &Path) -> Result<Self, StoreError> {
        if !feed_dir.exists() {
            std::fs::create_dir_all(feed_dir).map_err(|e| StoreError::CreateDirectoryFailed {
                path: feed_dir.to_path_buf(),
                source: e,
            })?;
        }

        Ok(Self {
            feed_dir: feed_dir.to_path_buf(),
        })
    }

    /// Document path for a feed URL
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.feed_dir.join(format!("{}.json", url_hash(url)))
    }

    /// Load every document in the store
    ///
    /// Documents that cannot be read are logged and left out.
    pub fn load_all(&self) -> Result<Vec<Podcast>, StoreError> {
        let read_dir_failed = |e| StoreError::ReadDirectoryFailed {
            path: self.feed_dir.clone(),
            source: e,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.feed_dir).map_err(read_dir_failed)? {
            let path = entry.map_err(read_dir_failed)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut podcasts = Vec::with_capacity(paths.len());
        for path in paths {
            match self.load(&path) {
                Ok(podcast) => podcasts.push(podcast),
                Err(e) => warn!("skipping unreadable podcast document: {}", e),
            }
        }

        debug!(
            "loaded {} podcasts from {}",
            podcasts.len(),
            self.feed_dir.display()
        );
        Ok(podcasts)
    }

    pub fn load(&self, path: &Path) -> Result<Podcast, StoreError> {
        Podcast::from_file(path)
    }

    /// Persist a podcast to its backing document, or to its content-addressed
    /// path if it has none yet
    pub fn save(&self, podcast: &mut Podcast) -> Result<PathBuf, StoreError> {
        let path = podcast
            .path
            .clone()
            .unwrap_or_else(|| self.path_for(&podcast.url));
        podcast.save_to_file(&path)?;
        debug!("saved {} to {}", podcast.title, path.display());
        Ok(path)
    }

    /// Remove a podcast's document; a document that is already gone is fine
    pub fn delete(&self, podcast: &Podcast) -> Result<(), StoreError> {
        let path = podcast
            .path
            .clone()
            .unwrap_or_else(|| self.path_for(&podcast.url));

        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::DeleteFailed { path, source: e }),
        }
    }

    /// Document path for `url`, provided nothing is stored there yet
    ///
    /// An existing document for the same URL is `AlreadyExists`; one holding
    /// a different feed is a `HashCollision`.
    pub fn ensure_vacant(&self, url: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(url);
        if !path.exists() {
            return Ok(path);
        }

        match self.load(&path) {
            Ok(existing) if !existing.url.eq_ignore_ascii_case(url) => {
                Err(StoreError::HashCollision {
                    url: url.to_string(),
                    existing_url: existing.url,
                    path,
                })
            }
            _ => Err(StoreError::AlreadyExists {
                url: url.to_string(),
                path,
            }),
        }
    }
}
