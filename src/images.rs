//! Local persistence of media thumbnails.
//!
//! Thumbnails land under a deterministic hash-derived filename, so a repeat
//! poll finds the file already on disk and skips the download entirely. The
//! returned reference is the public path the presentation layer serves the
//! directory under, never the filesystem path.

use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::transport::Transport;

pub struct ImageStore {
    dir: PathBuf,
    public_prefix: String,
}

impl ImageStore {
    /// Create the store, making sure the target directory exists.
    pub fn new(dir: impl Into<PathBuf>, public_prefix: &str) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Deterministic filename for a (person, media) pair.
    pub fn filename(person_handle: &str, media_handle: &str) -> String {
        let digest = Sha256::digest(format!("{person_handle}_{media_handle}").as_bytes());
        format!("{}.jpg", hex::encode(digest))
    }

    /// Fetch the thumbnail at `path` and return its public reference.
    ///
    /// Skips the download when the file already exists. A failed download or
    /// write degrades to the absolute remote URL so the caller still gets a
    /// usable reference.
    pub fn fetch(
        &self,
        transport: &dyn Transport,
        path: &str,
        person_handle: &str,
        media_handle: &str,
    ) -> String {
        let filename = Self::filename(person_handle, media_handle);
        let filepath = self.dir.join(&filename);
        let public = format!("{}/{}", self.public_prefix, filename);

        if filepath.exists() {
            debug!(path = %filepath.display(), "Thumbnail already cached");
            return public;
        }

        let bytes = match transport.get_bytes(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to download thumbnail {}: {}", path, e);
                return transport.url_for(path);
            }
        };

        match fs::write(&filepath, &bytes) {
            Ok(()) => {
                info!(path = %filepath.display(), bytes = bytes.len(), "Downloaded thumbnail");
                public
            }
            Err(e) => {
                warn!("Failed to write thumbnail {}: {}", filepath.display(), e);
                transport.url_for(path)
            }
        }
    }
}
