//! Denormalized export: one JSON document per photo.
//!
//! The three-table layout is the source of truth; this module derives a
//! second database where each photo row carries a single `data` column of
//! the shape `{"path": "...", "tags": {"cat": 91.2, ...}}`, queried with
//! SQLite's built-in JSON functions.

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::db::Database;

pub const DENORMALIZED_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    data TEXT
);
"#;

#[derive(Debug, Serialize)]
struct PhotoDoc {
    path: String,
    // Map semantics collapse duplicate associations (last value wins);
    // keys serialize sorted, not in classifier order
    tags: BTreeMap<String, f64>,
}

pub struct DenormalizedDb {
    conn: Connection,
}

impl DenormalizedDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(DENORMALIZED_SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn photo_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Confidence stored for one tag on one photo, or None if the photo
    /// is missing or does not carry the tag.
    ///
    /// Matches the key through json_each rather than a json_extract path
    /// expression, so tag names containing quotes or dots resolve too.
    pub fn confidence_for_tag(&self, path: &str, tag_name: &str) -> Result<Option<f64>> {
        let result = self.conn.query_row(
            r#"
            SELECT j.value
            FROM photos p, json_each(p.data, '$.tags') j
            WHERE p.path = ? AND j.key = ?
            "#,
            [path, tag_name],
            |row| row.get::<_, f64>(0),
        );
        match result {
            Ok(confidence) => Ok(Some(confidence)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Paths whose stored confidence for the tag is strictly greater than
    /// the threshold. A value exactly at the threshold is excluded, and so
    /// are photos without the tag (no matching key in their document).
    pub fn photos_with_tag_above(&self, tag_name: &str, threshold: f64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.path
            FROM photos p, json_each(p.data, '$.tags') j
            WHERE j.key = ? AND j.value > ?
            ORDER BY p.path
            "#,
        )?;
        let paths = stmt
            .query_map(rusqlite::params![tag_name, threshold], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(paths)
    }

    /// All (tag, confidence) pairs above the threshold for one photo,
    /// unpacked from the JSON document with json_each.
    pub fn tags_above(&self, path: &str, threshold: f64) -> Result<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT j.key, j.value
            FROM photos p, json_each(p.data, '$.tags') j
            WHERE p.path = ? AND j.value > ?
            ORDER BY j.value DESC, j.key
            "#,
        )?;
        let tags = stmt
            .query_map(rusqlite::params![path, threshold], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tags)
    }
}

/// Write every photo from the normalized database into `dest_path` as a
/// JSON document row. Duplicate (photo, tag) associations collapse to one
/// key with the last stored value winning. Returns rows written.
pub fn export_denormalized(db: &Database, dest_path: &Path) -> Result<usize> {
    let dest = DenormalizedDb::open(dest_path)?;
    let photos = db.photos_for_export()?;
    let mut written = 0;

    for (photo_id, path) in photos {
        tracing::info!(path = %path, "exporting");

        let mut tags = BTreeMap::new();
        for tag in db.tags_for_photo_id(photo_id)? {
            tags.insert(tag.name, tag.confidence);
        }

        let doc = PhotoDoc {
            path: path.clone(),
            tags,
        };
        let data = serde_json::to_string(&doc)?;

        written += dest.conn.execute(
            "INSERT OR IGNORE INTO photos (path, data) VALUES (?, ?)",
            [path.as_str(), data.as_str()],
        )?;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ScoredTag;
    use tempfile::tempdir;

    fn scored(name: &str, confidence: f64) -> ScoredTag {
        ScoredTag {
            name: name.to_string(),
            confidence,
        }
    }

    fn populated_db(dir: &tempfile::TempDir) -> Database {
        let db = Database::open(&dir.path().join("src.db")).unwrap();
        db.initialize().unwrap();

        db.insert_tagged_photo(
            "/pics/cat.jpg",
            &[scored("cat", 91.2), scored("pet", 80.0), scored("box", 44.0)],
        )
        .unwrap();
        db.insert_tagged_photo("/pics/dog.jpg", &[scored("dog", 85.5), scored("pet", 80.1)])
            .unwrap();
        db.insert_tagged_photo("/pics/empty.jpg", &[]).unwrap();

        db
    }

    #[test]
    fn test_export_writes_every_photo() {
        let dir = tempdir().unwrap();
        let db = populated_db(&dir);
        let dest_path = dir.path().join("dest.db");

        let written = export_denormalized(&db, &dest_path).unwrap();
        assert_eq!(written, 3);

        let dest = DenormalizedDb::open(&dest_path).unwrap();
        assert_eq!(dest.photo_count().unwrap(), 3);
        assert_eq!(
            dest.confidence_for_tag("/pics/cat.jpg", "cat").unwrap(),
            Some(91.2)
        );
        assert_eq!(dest.confidence_for_tag("/pics/cat.jpg", "dog").unwrap(), None);
        assert_eq!(dest.confidence_for_tag("/pics/missing.jpg", "cat").unwrap(), None);
    }

    #[test]
    fn test_export_is_idempotent() {
        let dir = tempdir().unwrap();
        let db = populated_db(&dir);
        let dest_path = dir.path().join("dest.db");

        export_denormalized(&db, &dest_path).unwrap();
        // Second run inserts nothing, rows already present
        let written = export_denormalized(&db, &dest_path).unwrap();
        assert_eq!(written, 0);

        let dest = DenormalizedDb::open(&dest_path).unwrap();
        assert_eq!(dest.photo_count().unwrap(), 3);
    }

    #[test]
    fn test_json_threshold_filter_is_strict() {
        let dir = tempdir().unwrap();
        let db = populated_db(&dir);
        let dest_path = dir.path().join("dest.db");
        export_denormalized(&db, &dest_path).unwrap();

        let dest = DenormalizedDb::open(&dest_path).unwrap();

        // /pics/cat.jpg has pet=80.0 (at threshold, excluded),
        // /pics/dog.jpg has pet=80.1 (just above, included)
        let paths = dest.photos_with_tag_above("pet", 80.0).unwrap();
        assert_eq!(paths, vec!["/pics/dog.jpg".to_string()]);

        let paths = dest.photos_with_tag_above("pet", 79.9).unwrap();
        assert_eq!(
            paths,
            vec!["/pics/cat.jpg".to_string(), "/pics/dog.jpg".to_string()]
        );
    }

    #[test]
    fn test_tags_above_unpacks_json() {
        let dir = tempdir().unwrap();
        let db = populated_db(&dir);
        let dest_path = dir.path().join("dest.db");
        export_denormalized(&db, &dest_path).unwrap();

        let dest = DenormalizedDb::open(&dest_path).unwrap();
        let tags = dest.tags_above("/pics/cat.jpg", 50.0).unwrap();
        assert_eq!(
            tags,
            vec![("cat".to_string(), 91.2), ("pet".to_string(), 80.0)]
        );
    }

    #[test]
    fn test_tag_names_with_quotes_stay_queryable() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("src.db")).unwrap();
        db.initialize().unwrap();
        db.insert_tagged_photo(
            "/pics/q.jpg",
            &[scored(r#"say "cheese""#, 90.0), scored("dot.matrix", 65.0)],
        )
        .unwrap();

        let dest_path = dir.path().join("dest.db");
        export_denormalized(&db, &dest_path).unwrap();

        let dest = DenormalizedDb::open(&dest_path).unwrap();
        assert_eq!(
            dest.confidence_for_tag("/pics/q.jpg", r#"say "cheese""#)
                .unwrap(),
            Some(90.0)
        );
        assert_eq!(
            dest.confidence_for_tag("/pics/q.jpg", "dot.matrix").unwrap(),
            Some(65.0)
        );
        assert_eq!(
            dest.photos_with_tag_above(r#"say "cheese""#, 80.0).unwrap(),
            vec!["/pics/q.jpg".to_string()]
        );
    }

    #[test]
    fn test_duplicate_association_collapses_to_last_value() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("src.db")).unwrap();
        db.initialize().unwrap();
        db.insert_tagged_photo("/pics/a.jpg", &[scored("cat", 91.0), scored("cat", 88.0)])
            .unwrap();

        let dest_path = dir.path().join("dest.db");
        export_denormalized(&db, &dest_path).unwrap();

        let dest = DenormalizedDb::open(&dest_path).unwrap();
        assert_eq!(
            dest.confidence_for_tag("/pics/a.jpg", "cat").unwrap(),
            Some(88.0)
        );
        // One JSON key, so exactly one row from json_each
        assert_eq!(dest.tags_above("/pics/a.jpg", 0.0).unwrap().len(), 1);
    }
}
