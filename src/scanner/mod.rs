pub mod discovery;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::ScannerConfig;
use crate::db::Database;

pub use discovery::discover_images;

pub struct Scanner {
    extensions: Vec<String>,
}

impl Scanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            extensions: config.image_extensions.clone(),
        }
    }

    /// Walk `topdir` and return the images that still need tagging:
    /// known extensions, decodable headers, and not yet in the database.
    /// `limit` caps the number of candidates returned.
    pub fn find_untagged(
        &self,
        topdir: &Path,
        db: &Database,
        limit: Option<usize>,
    ) -> Result<Vec<PathBuf>> {
        let candidates = discover_images(topdir, &self.extensions)?;
        let mut untagged = Vec::new();

        for path in candidates {
            if let Some(limit) = limit {
                if untagged.len() >= limit {
                    break;
                }
            }

            if db.photo_exists(&path)? {
                tracing::info!(path = %path.display(), "skipping (already in database)");
                continue;
            }

            if let Err(e) = probe_image(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to open");
                continue;
            }

            untagged.push(path);
        }

        Ok(untagged)
    }
}

/// Cheap decodability check: read the header without decoding pixel data,
/// so corrupt or misnamed files are dropped before hitting the API.
fn probe_image(path: &Path) -> Result<()> {
    image::image_dimensions(path)?;
    Ok(())
}
