use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::db::open_connection;
use crate::models::{MealLogEntry, NewMealLog};

const MEAL_LOGS: &str = "meal_logs";

/// Schemaless document collection on top of SQLite.
///
/// Each document is stored as a JSON body keyed by a generated string id. The
/// collection name partitions documents; nothing else about their shape is enforced.
pub struct MealLogStore {
    conn: Connection,
}

impl MealLogStore {
    pub fn open(location: &str) -> Result<Self> {
        let store = MealLogStore {
            conn: open_connection(location)?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = MealLogStore {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (
                    id TEXT PRIMARY KEY,
                    collection TEXT NOT NULL,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn insert_document<T: Serialize>(&self, collection: &str, doc: &T) -> Result<String> {
        let body = serde_json::to_string(doc).context("failed to serialize document")?;
        let id = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO documents (id, collection, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, collection, body, Utc::now().to_rfc3339()],
        )?;
        Ok(id)
    }

    fn find_document<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")?;
        let mut rows = stmt.query(params![collection, id])?;
        if let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            let doc = serde_json::from_str(&body)
                .with_context(|| format!("corrupt document body for {id}"))?;
            Ok(Some(doc))
        } else {
            Ok(None)
        }
    }

    /// Documents in `collection` whose top-level `field` equals `value`, oldest first.
    fn find_documents_by<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<(String, T)>> {
        let path = format!("$.{field}");
        let mut stmt = self.conn.prepare(
            "SELECT id, body FROM documents
             WHERE collection = ?1 AND json_extract(body, ?2) = ?3
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![collection, path, value], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body)| -> Result<(String, T)> {
                let doc = serde_json::from_str(&body)
                    .with_context(|| format!("corrupt document body for {id}"))?;
                Ok((id, doc))
            })
            .collect()
    }

    // --- Meal logs ---

    pub fn insert_meal_log(&self, log: &NewMealLog) -> Result<MealLogEntry> {
        let id = self.insert_document(MEAL_LOGS, log)?;
        Ok(MealLogEntry::from_document(id, log.clone()))
    }

    pub fn get_meal_log(&self, id: &str) -> Result<Option<MealLogEntry>> {
        let doc: Option<NewMealLog> = self.find_document(MEAL_LOGS, id)?;
        Ok(doc.map(|d| MealLogEntry::from_document(id.to_string(), d)))
    }

    pub fn meal_logs_for_user(&self, user_id: &str) -> Result<Vec<MealLogEntry>> {
        let docs: Vec<(String, NewMealLog)> =
            self.find_documents_by(MEAL_LOGS, "user_id", user_id)?;
        Ok(docs
            .into_iter()
            .map(|(id, d)| MealLogEntry::from_document(id, d))
            .collect())
    }
}
