//! Database schema and migrations for fshare.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: API key credentials
    r#"
CREATE TABLE credential (
    id                  TEXT PRIMARY KEY,
    hashed_secret       TEXT NOT NULL UNIQUE,    -- hex SHA-256 of the raw key
    comment             TEXT NOT NULL DEFAULT '',
    is_highly_trusted   BOOLEAN NOT NULL DEFAULT FALSE,
    created_at          INTEGER NOT NULL,        -- unix seconds
    created_by          TEXT REFERENCES credential(id)
);
"#,
    // v2: Resources (files and home directories)
    r#"
CREATE TABLE resource (
    id                   TEXT PRIMARY KEY,
    name                 TEXT NOT NULL,
    is_private           BOOLEAN NOT NULL DEFAULT TRUE,
    is_file              BOOLEAN NOT NULL DEFAULT TRUE,
    parent_id            TEXT REFERENCES resource(id),
    owner_credential_id  TEXT NOT NULL REFERENCES credential(id),
    expires_at           INTEGER,                -- unix seconds, NULL = keep forever
    created_at           INTEGER NOT NULL,
    deleted_at           INTEGER,                -- NULL while active
    is_broken            BOOLEAN NOT NULL DEFAULT FALSE
);

-- NULL parent ids compare as distinct in unique indexes, hence the COALESCE.
CREATE UNIQUE INDEX idx_resource_active_name
    ON resource(name, COALESCE(parent_id, ''), owner_credential_id)
    WHERE deleted_at IS NULL;

CREATE INDEX idx_resource_owner ON resource(owner_credential_id);
CREATE INDEX idx_resource_expires_at ON resource(expires_at) WHERE deleted_at IS NULL;
"#,
];
