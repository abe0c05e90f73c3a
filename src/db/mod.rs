//! SQLite storage for photos, tags, and their scored associations.

mod schema;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

pub use schema::SCHEMA;

/// A tag name with the classifier confidence attached to one photo.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTag {
    pub name: String,
    pub confidence: f64,
}

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        // Referential integrity is per-connection in SQLite
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ========================================================================
    // Photo operations
    // ========================================================================

    pub fn photo_exists(&self, path: &Path) -> Result<bool> {
        let path_str = path.to_string_lossy();
        let result = self.conn.query_row(
            "SELECT 1 FROM photos WHERE path = ?",
            [path_str.as_ref()],
            |_| Ok(()),
        );
        match result {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a photo and its scored tags in one transaction.
    ///
    /// Tag names are added to the vocabulary on first use; repeated names
    /// reuse the existing row. Returns the new photo id.
    pub fn insert_tagged_photo(&self, path: &str, tags: &[ScoredTag]) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("INSERT INTO photos (path) VALUES (?)", [path])?;
        let photo_id = tx.last_insert_rowid();

        for tag in tags {
            tx.execute(
                "INSERT OR IGNORE INTO tags (tag_name) VALUES (?)",
                [&tag.name],
            )?;
            let tag_id: i64 = tx.query_row(
                "SELECT id FROM tags WHERE tag_name = ?",
                [&tag.name],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO photo_tag (photo_id, tag_id, confidence) VALUES (?, ?, ?)",
                rusqlite::params![photo_id, tag_id, tag.confidence],
            )?;
        }

        tx.commit()?;
        Ok(photo_id)
    }

    pub fn photo_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All photos ordered by path, for the denormalized export.
    pub fn photos_for_export(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, path FROM photos ORDER BY path")?;
        let photos = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, String>(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(photos)
    }

    // ========================================================================
    // Tag queries
    // ========================================================================

    /// Number of distinct photos carrying the given tag.
    ///
    /// DISTINCT because duplicate associations for the same pair are
    /// structurally possible.
    pub fn count_photos_with_tag(&self, tag_name: &str) -> Result<i64> {
        let count = self.conn.query_row(
            r#"
            SELECT COUNT(DISTINCT pt.photo_id)
            FROM photo_tag pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE t.tag_name = ?
            "#,
            [tag_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Raw association row count for the given tag, duplicates included.
    pub fn association_count(&self, tag_name: &str) -> Result<i64> {
        let count = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM photo_tag pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE t.tag_name = ?
            "#,
            [tag_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Tags for one photo as stored, highest confidence first.
    pub fn tags_for_photo(&self, path: &Path) -> Result<Vec<ScoredTag>> {
        let path_str = path.to_string_lossy();
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.tag_name, pt.confidence
            FROM tags t
            JOIN photo_tag pt ON t.id = pt.tag_id
            JOIN photos p ON p.id = pt.photo_id
            WHERE p.path = ?
            ORDER BY pt.confidence DESC, t.tag_name
            "#,
        )?;
        let tags = stmt
            .query_map([path_str.as_ref()], |row| {
                Ok(ScoredTag {
                    name: row.get(0)?,
                    confidence: row.get(1)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tags)
    }

    /// Tags for one photo by id, in association insertion order.
    ///
    /// Used by the export so that a duplicated pair collapses to the last
    /// stored value when folded into a map.
    pub fn tags_for_photo_id(&self, photo_id: i64) -> Result<Vec<ScoredTag>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tag_name, confidence
            FROM tags
            JOIN photo_tag ON tags.id = photo_tag.tag_id
            WHERE photo_tag.photo_id = ?
            ORDER BY photo_tag.rowid
            "#,
        )?;
        let tags = stmt
            .query_map([photo_id], |row| {
                Ok(ScoredTag {
                    name: row.get(0)?,
                    confidence: row.get(1)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tags)
    }

    /// Paths of photos where the tag applies with confidence strictly
    /// greater than the threshold. A confidence exactly at the threshold
    /// is excluded.
    pub fn photos_with_tag_above(&self, tag_name: &str, threshold: f64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT p.path
            FROM photos p
            JOIN photo_tag pt ON pt.photo_id = p.id
            JOIN tags t ON t.id = pt.tag_id
            WHERE t.tag_name = ? AND pt.confidence > ?
            ORDER BY p.path
            "#,
        )?;
        let paths = stmt
            .query_map(rusqlite::params![tag_name, threshold], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(paths)
    }

    /// Vocabulary usage summary: (tag_name, distinct photo count),
    /// most used first.
    pub fn tag_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.tag_name, COUNT(DISTINCT pt.photo_id) AS n
            FROM tags t
            LEFT JOIN photo_tag pt ON pt.tag_id = t.id
            GROUP BY t.id
            ORDER BY n DESC, t.tag_name
            "#,
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(counts)
    }
}
