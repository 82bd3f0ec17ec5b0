pub const SCHEMA: &str = r#"
-- one row per APOD date; reruns update in place
CREATE TABLE IF NOT EXISTS apod_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    explanation TEXT,
    url TEXT,
    date TEXT NOT NULL UNIQUE,
    media_type TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
