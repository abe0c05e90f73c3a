pub const SCHEMA: &str = r#"
-- Photos table: one row per physical image file
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE
);

-- Tag vocabulary: one row per distinct label
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_name VARCHAR(255) NOT NULL UNIQUE
);

-- Photo to tag association with classifier confidence.
-- The (photo_id, tag_id) pair is not unique: the classifier may report
-- the same label twice and consuming queries deduplicate.
CREATE TABLE IF NOT EXISTS photo_tag (
    photo_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    confidence REAL,
    FOREIGN KEY (photo_id) REFERENCES photos(id),
    FOREIGN KEY (tag_id) REFERENCES tags(id)
);

-- Indexes for common queries
CREATE INDEX IF NOT EXISTS idx_photo_tag_photo ON photo_tag(photo_id);
CREATE INDEX IF NOT EXISTS idx_photo_tag_tag ON photo_tag(tag_id);
"#;
