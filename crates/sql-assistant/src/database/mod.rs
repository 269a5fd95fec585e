//! Database module - read-only SQLite access, schema introspection and result caching
pub mod schema;
pub mod introspection;
pub mod result_cache;
pub use schema::*;
pub use result_cache::CachedExecutor;
use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info};

/// Source of the schema description the prompt is built from
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn fetch_schema(&self) -> anyhow::Result<SchemaMetadata>;
}

/// Runs an already validated SELECT and returns its rows
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute_select(&self, query: &str) -> anyhow::Result<Vec<Row>>;
}

/// Pooled, read-only connection to a SQLite database file.
///
/// Connections are opened read-only and with `query_only` set, so even a statement
/// that slipped past validation cannot modify the file.
pub struct SqliteDatabase {
    pool: Arc<Pool<SqliteConnectionManager>>,
    max_result_rows: usize,
}

impl SqliteDatabase {
    pub fn open(db_path: &Path, pool_size: u32, max_result_rows: usize) -> anyhow::Result<Self> {
        info!("Opening database at: {}", db_path.display());
        if !db_path.exists() {
            return Err(anyhow::anyhow!(
                "Database file not found at: {}. Please check CHATBOT_DB_PATH.",
                db_path.display()
            ));
        }
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| {
                conn.execute_batch(
                    "PRAGMA query_only = ON;
                     PRAGMA busy_timeout = 5000;",
                )
            });
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;
        info!("Database pool ready ({} connections, max {} rows per query)", pool_size.max(1), max_result_rows);
        Ok(Self {
            pool: Arc::new(pool),
            max_result_rows: max_result_rows.max(1),
        })
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    pub fn max_result_rows(&self) -> usize {
        self.max_result_rows
    }

    pub fn test_connection(&self) -> bool {
        match self.get_conn() {
            Ok(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map(|v| v == 1)
                .unwrap_or(false),
            Err(e) => {
                debug!("Connection test failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl SchemaProvider for SqliteDatabase {
    async fn fetch_schema(&self) -> anyhow::Result<SchemaMetadata> {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || -> anyhow::Result<SchemaMetadata> {
            let conn = pool
                .get()
                .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))?;
            let schema = introspection::read_schema(&conn)?;
            debug!(
                "Introspected {} table(s), {} relationship(s)",
                schema.tables.len(),
                schema.relationships.len()
            );
            Ok(schema)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Schema task failed: {}", e))?
    }
}

#[async_trait]
impl QueryExecutor for SqliteDatabase {
    async fn execute_select(&self, query: &str) -> anyhow::Result<Vec<Row>> {
        let pool = Arc::clone(&self.pool);
        let max_rows = self.max_result_rows;
        let query = query.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))?;
            run_select(&conn, &query, max_rows)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Query task failed: {}", e))?
    }
}

/// Execute `query` and collect at most `max_rows` rows
pub(crate) fn run_select(conn: &Connection, query: &str, max_rows: usize) -> anyhow::Result<Vec<Row>> {
    let mut stmt = conn.prepare(query)?;
    if !stmt.readonly() {
        return Err(anyhow::anyhow!("Statement would modify the database"));
    }
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([])?;
    let mut results = Vec::new();
    while results.len() < max_rows {
        let Some(row) = rows.next()? else {
            break;
        };
        let mut record = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            record.insert(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        results.push(record);
    }
    debug!("Query returned {} row(s)", results.len());
    Ok(results)
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(format!("<blob {} bytes>", blob.len())),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Seed a small shop database used across database and pipeline tests
    pub fn seed_shop_db(path: &Path) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 email TEXT,
                 created_at TEXT DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE orders (
                 id INTEGER PRIMARY KEY,
                 user_id INTEGER NOT NULL REFERENCES users(id),
                 total REAL,
                 receipt BLOB
             );
             INSERT INTO users (id, name, email) VALUES (1, 'Alice', 'alice@example.com');
             INSERT INTO users (id, name, email) VALUES (2, 'Bob', NULL);
             INSERT INTO users (id, name, email) VALUES (3, 'Carol', 'carol@example.com');
             INSERT INTO orders (id, user_id, total, receipt) VALUES (1, 1, 19.5, x'0102');",
        )
        .unwrap();
    }
}
