//! Database facts kept in the `metadata` table: schema version, applied
//! migrations and the `docflow init` stamp.

use std::collections::BTreeMap;

use rusqlite::{Connection, params};

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

pub(crate) fn put_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

impl SqliteStore {
    pub fn set_metadata_impl(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        put_metadata(&conn, key, value)
    }

    pub fn get_metadata_impl(&self) -> Result<BTreeMap<String, String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM metadata")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut facts = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            facts.insert(key, value);
        }
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_lists_sorted() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_metadata_impl("initialized_by", "alice").unwrap();
        store.set_metadata_impl("initialized_by", "bob").unwrap();

        let facts = store.get_metadata_impl().unwrap();
        assert_eq!(facts.get("initialized_by").map(String::as_str), Some("bob"));
        assert!(facts.contains_key("schema_version"));
        assert!(!facts.contains_key("id_prefix"));
    }
}
