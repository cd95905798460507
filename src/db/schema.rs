/// Schema of the taxonomy store.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
pub const INITIAL_SCHEMA: &str = r#"
-- Vocabularies: named term collections
CREATE TABLE IF NOT EXISTS vocabularies (
    id INTEGER PRIMARY KEY,
    machine_name TEXT NOT NULL UNIQUE
);

-- Terms: one row per primary external id
CREATE TABLE IF NOT EXISTS terms (
    tid INTEGER PRIMARY KEY,
    vocabulary_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    provider TEXT NOT NULL,
    ext_id TEXT NOT NULL UNIQUE,
    disambiguator TEXT NOT NULL DEFAULT '',
    data TEXT,
    FOREIGN KEY (vocabulary_id) REFERENCES vocabularies(id) ON DELETE CASCADE
);

-- Usage: which content items are tagged with a term, per field
CREATE TABLE IF NOT EXISTS term_usage (
    tid INTEGER NOT NULL,
    content_id INTEGER NOT NULL,
    field TEXT NOT NULL,
    delta INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (tid, content_id, field),
    FOREIGN KEY (tid) REFERENCES terms(tid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_terms_vocabulary ON terms(vocabulary_id);
CREATE INDEX IF NOT EXISTS idx_term_usage_content ON term_usage(content_id, field);
"#;
