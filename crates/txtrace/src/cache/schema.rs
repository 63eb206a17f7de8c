//! `SQLite` schema definitions for the lookup cache.

/// SQL statement to create the lookups table.
pub const CREATE_LOOKUPS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS lookups (
    txid TEXT PRIMARY KEY,
    block_height INTEGER NOT NULL,
    block_time INTEGER,
    block_hash TEXT,
    api_source TEXT NOT NULL,
    fetched_at TEXT NOT NULL
)
";

/// SQL statement to create an index on `fetched_at` for stats queries.
pub const CREATE_FETCHED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_lookups_fetched_at ON lookups(fetched_at)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_LOOKUPS_TABLE,
    CREATE_FETCHED_AT_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lookups_table_contains_required_columns() {
        assert!(CREATE_LOOKUPS_TABLE.contains("txid TEXT PRIMARY KEY"));
        assert!(CREATE_LOOKUPS_TABLE.contains("block_height INTEGER NOT NULL"));
        assert!(CREATE_LOOKUPS_TABLE.contains("api_source TEXT NOT NULL"));
        assert!(CREATE_LOOKUPS_TABLE.contains("fetched_at TEXT NOT NULL"));
    }
}
