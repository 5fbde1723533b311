use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Collection names are part of the wire format and must match the
/// upstream document store exactly.
pub mod collections {
    pub const STUDENTS: &str = "Users_details";
    pub const COMPANIES: &str = "Company";
    pub const COMPANY_APPLICATIONS: &str = "Company_Applications";
    pub const TRACKING: &str = "Applications_Tracking";
    pub const TEST_PROBLEMS: &str = "Test_problems";
    pub const TESTS: &str = "Tests";
    pub const PROBLEMS: &str = "Problems";
    pub const ONBOARDING: &str = "isOnboarding";
    pub const CGPA_CONFIG: &str = "cgpaConfig";
    pub const QUESTIONS: &str = "CompanyQuestions";
}

/// One logical document store: collection name + document key -> JSON body,
/// persisted in a single SQLite table.
///
/// Every method issues one independent statement. There is deliberately no
/// multi-document transaction here; cross-record consistency for a business
/// event is the propagator's job, and it is best-effort only (see
/// `propagate`).
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::validation(format!("cannot create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, key)
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, collection: &str, key: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whole-document write: creates the document or replaces it entirely.
    pub fn set(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
        let body = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, key) DO UPDATE SET body = excluded.body",
            params![collection, key, body],
        )?;
        debug!(collection, key, "set");
        Ok(())
    }

    /// Partial write: deep-merges `patch` into the existing document.
    /// Objects merge recursively, any other value replaces. Creates the
    /// document when absent.
    pub fn merge(&self, collection: &str, key: &str, patch: &Value) -> Result<()> {
        let mut body = self.get(collection, key)?.unwrap_or(Value::Object(Map::new()));
        merge_values(&mut body, patch);
        self.set(collection, key, &body)
    }

    /// Inserts a new document under a generated id and returns the id.
    pub fn insert(&self, collection: &str, value: &Value) -> Result<String> {
        let key = new_doc_id();
        self.set(collection, &key, value)?;
        Ok(key)
    }

    /// Overwrites one top-level field wholesale. The document must already
    /// exist; replacing a map this way drops any keys a merge would have
    /// preserved, which is exactly what the bulk placement edit relies on.
    pub fn set_field(&self, collection: &str, key: &str, field: &str, value: Value) -> Result<()> {
        let mut body = self
            .get(collection, key)?
            .ok_or_else(|| Error::not_found(format!("{collection}/{key} not found")))?;
        if let Value::Object(map) = &mut body {
            map.insert(field.to_string(), value);
        }
        self.set(collection, key, &body)
    }

    /// Sets one entry of a top-level map field, merging with any existing
    /// entry. Creates the document when absent.
    pub fn set_map_entry(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        entry: &str,
        value: Value,
    ) -> Result<()> {
        let mut inner = Map::new();
        inner.insert(entry.to_string(), value);
        let mut patch = Map::new();
        patch.insert(field.to_string(), Value::Object(inner));
        self.merge(collection, key, &Value::Object(patch))
    }

    /// Removes one entry from a top-level map field. Missing entries are a
    /// no-op; a missing document is an error.
    pub fn delete_map_entry(&self, collection: &str, key: &str, field: &str, entry: &str) -> Result<()> {
        let mut body = self
            .get(collection, key)?
            .ok_or_else(|| Error::not_found(format!("{collection}/{key} not found")))?;
        if let Some(Value::Object(map)) = body.get_mut(field) {
            map.remove(entry);
        }
        self.set(collection, key, &body)
    }

    /// Appends `element` to a top-level array field iff it is not already
    /// present. This mirrors the upstream store's atomic array-union
    /// primitive, the one write in the system that dodges lost updates.
    pub fn array_union(&self, collection: &str, key: &str, field: &str, element: &str) -> Result<()> {
        let mut body = self.get(collection, key)?.unwrap_or(Value::Object(Map::new()));
        let map = match &mut body {
            Value::Object(map) => map,
            _ => return Err(Error::validation(format!("{collection}/{key} is not an object"))),
        };
        let arr = map
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = arr {
            if !items.iter().any(|v| v.as_str() == Some(element)) {
                items.push(Value::String(element.to_string()));
            }
        }
        self.set(collection, key, &body)
    }

    /// Removes a whole document. Deleting a missing document is a no-op.
    pub fn delete(&self, collection: &str, key: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
        )?;
        debug!(collection, key, "delete");
        Ok(())
    }

    /// Full-collection scan in key order.
    pub fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, body FROM documents WHERE collection = ?1 ORDER BY key")?;
        let rows = stmt.query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (key, body) = row?;
            out.push((key, serde_json::from_str(&body)?));
        }
        Ok(out)
    }

    /// First document whose top-level `field` equals `value`. This is the
    /// indexed-field lookup used for students, which live under generated
    /// ids but are addressed by register number.
    pub fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<(String, Value)>> {
        let path = format!("$.\"{field}\"");
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT key, body FROM documents
                 WHERE collection = ?1 AND json_extract(body, ?2) = ?3
                 ORDER BY key LIMIT 1",
                params![collection, path, value],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((key, body)) => Ok(Some((key, serde_json::from_str(&body)?))),
            None => Ok(None),
        }
    }
}

/// Generated document ids mirror the upstream store's shape: 20
/// alphanumeric characters.
pub fn new_doc_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

fn merge_values(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) if base_value.is_object() && patch_value.is_object() => {
                        merge_values(base_value, patch_value);
                    }
                    _ => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_overwrites_whole_document() {
        let store = Store::open_in_memory().unwrap();
        store.set("c", "k", &json!({"a": 1, "b": {"x": true}})).unwrap();
        store.set("c", "k", &json!({"a": 2})).unwrap();
        assert_eq!(store.get("c", "k").unwrap().unwrap(), json!({"a": 2}));
    }

    #[test]
    fn test_merge_preserves_sibling_keys() {
        let store = Store::open_in_memory().unwrap();
        store
            .set("c", "k", &json!({"placed": {"r1": {"ctc": "5"}}, "willing": ["r1"]}))
            .unwrap();
        store
            .merge("c", "k", &json!({"placed": {"r2": {"ctc": "7"}}}))
            .unwrap();
        let doc = store.get("c", "k").unwrap().unwrap();
        assert_eq!(doc["placed"]["r1"]["ctc"], "5");
        assert_eq!(doc["placed"]["r2"]["ctc"], "7");
        assert_eq!(doc["willing"], json!(["r1"]));
    }

    #[test]
    fn test_merge_creates_missing_document() {
        let store = Store::open_in_memory().unwrap();
        store.merge("c", "k", &json!({"a": 1})).unwrap();
        assert_eq!(store.get("c", "k").unwrap().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_set_field_replaces_map_wholesale() {
        let store = Store::open_in_memory().unwrap();
        store
            .set("c", "k", &json!({"placed": {"r1": {"ctc": "5"}, "r2": {"ctc": "6"}}}))
            .unwrap();
        store
            .set_field("c", "k", "placed", json!({"r1": {"ctc": "7"}}))
            .unwrap();
        let doc = store.get("c", "k").unwrap().unwrap();
        // r2 is gone: whole-field replace drops keys a merge would keep.
        assert!(doc["placed"].get("r2").is_none());
        assert_eq!(doc["placed"]["r1"]["ctc"], "7");
    }

    #[test]
    fn test_set_field_requires_document() {
        let store = Store::open_in_memory().unwrap();
        let err = store.set_field("c", "missing", "f", json!(1)).unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_array_union_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.array_union("c", "k", "willing", "r1").unwrap();
        store.array_union("c", "k", "willing", "r1").unwrap();
        store.array_union("c", "k", "willing", "r2").unwrap();
        let doc = store.get("c", "k").unwrap().unwrap();
        assert_eq!(doc["willing"], json!(["r1", "r2"]));
    }

    #[test]
    fn test_delete_map_entry() {
        let store = Store::open_in_memory().unwrap();
        store
            .set("c", "k", &json!({"placed": {"r1": {}, "r2": {}}}))
            .unwrap();
        store.delete_map_entry("c", "k", "placed", "r1").unwrap();
        let doc = store.get("c", "k").unwrap().unwrap();
        assert!(doc["placed"].get("r1").is_none());
        assert!(doc["placed"].get("r2").is_some());
        // deleting an absent entry is a no-op
        store.delete_map_entry("c", "k", "placed", "r9").unwrap();
    }

    #[test]
    fn test_delete_removes_document() {
        let store = Store::open_in_memory().unwrap();
        store.set("c", "k", &json!({"a": 1})).unwrap();
        store.delete("c", "k").unwrap();
        assert!(store.get("c", "k").unwrap().is_none());
        // deleting again is a no-op
        store.delete("c", "k").unwrap();
    }

    #[test]
    fn test_find_by_field_with_spaces_in_name() {
        let store = Store::open_in_memory().unwrap();
        store
            .set("Users_details", "abc", &json!({"Register Number": "711721CS001"}))
            .unwrap();
        let found = store
            .find_by_field("Users_details", "Register Number", "711721CS001")
            .unwrap();
        assert_eq!(found.unwrap().0, "abc");
        let missing = store
            .find_by_field("Users_details", "Register Number", "nope")
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_new_doc_id_shape() {
        let id = new_doc_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(new_doc_id(), new_doc_id());
    }
}
