use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, params};

use crate::models::{FoodItem, NewFoodItem};

/// Open a SQLite connection from a location string.
///
/// Accepts a plain path, a `sqlite://` URL, or `:memory:`.
pub(crate) fn open_connection(location: &str) -> Result<Connection> {
    let path = location.strip_prefix("sqlite://").unwrap_or(location);
    if path == ":memory:" {
        return Connection::open_in_memory().context("Failed to open in-memory database");
    }
    Connection::open(Path::new(path))
        .with_context(|| format!("Failed to open database: {path}"))
}

/// `unicode_lower(text)`: full Unicode lowercase. SQLite's own `lower` and `LIKE`
/// only fold ASCII.
fn register_unicode_lower(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
    .context("Failed to register unicode_lower")
}

/// Relational store of known food items.
pub struct FoodStore {
    conn: Connection,
}

impl FoodStore {
    pub fn open(location: &str) -> Result<Self> {
        Self::from_connection(open_connection(location)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_unicode_lower(&conn)?;
        let store = FoodStore { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS food_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    calories REAL NOT NULL DEFAULT 0,
                    protein REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_food_items_name ON food_items(name);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodItem> {
        Ok(FoodItem {
            id: row.get("id")?,
            name: row.get("name")?,
            calories: row.get("calories")?,
            protein: row.get("protein")?,
            carbs: row.get("carbs")?,
            fat: row.get("fat")?,
        })
    }

    pub fn insert_food(&self, food: &NewFoodItem) -> Result<FoodItem> {
        self.conn.execute(
            "INSERT INTO food_items (name, calories, protein, carbs, fat)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![food.name, food.calories, food.protein, food.carbs, food.fat],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food_by_id(id)
    }

    /// Insert a batch of foods in a single transaction.
    ///
    /// Either every row is written or none is. Rows come back in input order with
    /// their assigned ids. No check is made for existing rows with the same name.
    pub fn insert_foods(&self, foods: &[NewFoodItem]) -> Result<Vec<FoodItem>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(foods.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO food_items (name, calories, protein, carbs, fat)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for food in foods {
                stmt.execute(params![
                    food.name,
                    food.calories,
                    food.protein,
                    food.carbs,
                    food.fat
                ])?;
                inserted.push(FoodItem {
                    id: tx.last_insert_rowid(),
                    name: food.name.clone(),
                    calories: food.calories,
                    protein: food.protein,
                    carbs: food.carbs,
                    fat: food.fat,
                });
            }
        }
        tx.commit().context("Failed to commit food batch")?;
        Ok(inserted)
    }

    pub fn get_food_by_id(&self, id: i64) -> Result<FoodItem> {
        self.conn
            .query_row(
                "SELECT * FROM food_items WHERE id = ?1",
                params![id],
                Self::food_from_row,
            )
            .with_context(|| format!("Food item {id} not found"))
    }

    /// Case-insensitive substring match on `name`, in id order.
    ///
    /// Both sides are folded with Unicode lowercase, so non-ASCII names match too.
    pub fn search_by_name(&self, query: &str) -> Result<Vec<FoodItem>> {
        let escaped = query
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(
            "SELECT * FROM food_items WHERE unicode_lower(name) LIKE ?1 ESCAPE '\\' ORDER BY id",
        )?;
        let foods = stmt
            .query_map(params![pattern], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> Result<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM food_items", [], |row| row.get(0))?;
        Ok(n)
    }
}
