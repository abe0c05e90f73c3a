pub mod client;

use anyhow::Result;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::db::{Database, ScoredTag};

pub use client::ImaggaClient;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("tagging request failed: {0}")]
    Request(String),

    #[error("malformed tagging response: {0}")]
    Response(String),

    #[error("tagging api error: {0}")]
    Api(String),
}

/// Trait for services that turn an image into scored tags.
pub trait TagProvider: Send + Sync {
    /// Tag the image at the given path. An empty result means the service
    /// answered but found nothing to say about the image.
    fn tag_image(&self, image_path: &Path) -> Result<Vec<ScoredTag>>;

    /// Provider name for display
    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagRunSummary {
    pub tagged: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct TagQueue {
    tasks: VecDeque<PathBuf>,
    provider: Box<dyn TagProvider>,
    interval: Duration,
}

impl TagQueue {
    pub fn new(provider: Box<dyn TagProvider>, interval: Duration) -> Self {
        Self {
            tasks: VecDeque::new(),
            provider,
            interval,
        }
    }

    pub fn add_tasks(&mut self, paths: Vec<PathBuf>) {
        for path in paths {
            self.tasks.push_back(path);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Process every queued image: fetch tags, store the photo with its
    /// associations, and keep going past per-image failures. Requests are
    /// spaced out by the configured interval.
    pub fn process_all(&mut self, db: &Database) -> TagRunSummary {
        let mut summary = TagRunSummary::default();
        let mut first = true;

        while let Some(path) = self.tasks.pop_front() {
            if !first && !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
            first = false;

            tracing::info!(path = %path.display(), "fetching tags");

            match self.process_task(&path, db) {
                Ok(true) => summary.tagged += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    // Continue processing other images despite errors
                    tracing::error!(path = %path.display(), error = %e, "tagging error");
                }
            }
        }

        summary
    }

    /// Returns Ok(false) when the service had no tags for the image, in
    /// which case the photo is not inserted and a later run retries it.
    fn process_task(&self, path: &Path, db: &Database) -> Result<bool> {
        let tags = self.provider.tag_image(path)?;

        if tags.is_empty() {
            tracing::warn!(path = %path.display(), "no tags for image");
            return Ok(false);
        }

        tracing::info!(path = %path.display(), tags = tags.len(), "storing tags");
        db.insert_tagged_photo(&path.to_string_lossy(), &tags)?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use tempfile::tempdir;

    /// Canned provider keyed on the image file name.
    struct CannedProvider;

    impl TagProvider for CannedProvider {
        fn tag_image(&self, image_path: &Path) -> Result<Vec<ScoredTag>> {
            match image_path.file_stem().and_then(|s| s.to_str()) {
                Some("untaggable") => Ok(Vec::new()),
                Some("broken") => Err(anyhow!("connection reset")),
                _ => Ok(vec![
                    ScoredTag {
                        name: "cat".to_string(),
                        confidence: 91.2,
                    },
                    ScoredTag {
                        name: "box".to_string(),
                        confidence: 44.0,
                    },
                ]),
            }
        }

        fn provider_name(&self) -> &'static str {
            "canned"
        }
    }

    #[test]
    fn test_process_all_stores_tags_and_counts_outcomes() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        db.initialize().unwrap();

        let mut queue = TagQueue::new(Box::new(CannedProvider), Duration::ZERO);
        queue.add_tasks(vec![
            PathBuf::from("/pics/good.jpg"),
            PathBuf::from("/pics/untaggable.jpg"),
            PathBuf::from("/pics/broken.jpg"),
        ]);
        assert_eq!(queue.len(), 3);

        let summary = queue.process_all(&db);
        assert!(queue.is_empty());
        assert_eq!(
            summary,
            TagRunSummary {
                tagged: 1,
                skipped: 1,
                failed: 1,
            }
        );

        // Only the successfully tagged photo was inserted
        assert_eq!(db.photo_count().unwrap(), 1);
        assert!(db.photo_exists(Path::new("/pics/good.jpg")).unwrap());
        let tags = db.tags_for_photo(Path::new("/pics/good.jpg")).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "cat");
    }

    #[test]
    fn test_untagged_photo_not_inserted() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        db.initialize().unwrap();

        let mut queue = TagQueue::new(Box::new(CannedProvider), Duration::ZERO);
        queue.add_tasks(vec![PathBuf::from("/pics/untaggable.jpg")]);
        queue.process_all(&db);

        // Stays out of the database so a later run can retry it
        assert!(!db
            .photo_exists(Path::new("/pics/untaggable.jpg"))
            .unwrap());
    }
}
