//! Reads table, column and foreign key metadata out of a SQLite catalog
use rusqlite::{params, Connection, Result};

use crate::database::schema::{ColumnInfo, Relationship, SchemaMetadata, TableInfo};

/// Read every user table (sorted by name), its columns in declaration order and all
/// foreign keys between them.
pub fn read_schema(conn: &Connection) -> Result<SchemaMetadata> {
    let table_names = list_tables(conn)?;

    let mut tables = Vec::with_capacity(table_names.len());
    let mut relationships = Vec::new();
    for name in table_names {
        tables.push(TableInfo {
            columns: read_columns(conn, &name)?,
            name: name.clone(),
        });
        relationships.extend(read_foreign_keys(conn, &name)?);
    }

    Ok(SchemaMetadata {
        tables,
        relationships,
    })
}

fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>>>()?;
    Ok(names)
}

fn read_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value
         FROM pragma_table_info(?1)
         ORDER BY cid",
    )?;
    let columns = stmt
        .query_map(params![table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
                nullable: row.get::<_, i64>(2)? == 0,
                default: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(columns)
}

fn read_foreign_keys(conn: &Connection, table: &str) -> Result<Vec<Relationship>> {
    let mut stmt = conn.prepare(
        "SELECT \"table\", \"from\", \"to\"
         FROM pragma_foreign_key_list(?1)
         ORDER BY id, seq",
    )?;
    let raw = stmt
        .query_map(params![table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>>>()?;

    let mut relationships = Vec::with_capacity(raw.len());
    for (to_table, from_column, to_column) in raw {
        // `REFERENCES t` without a column list points at t's primary key
        let to_column = match to_column {
            Some(col) => col,
            None => primary_key_column(conn, &to_table)?.unwrap_or_else(|| "rowid".to_string()),
        };
        relationships.push(Relationship {
            from_table: table.to_string(),
            from_column,
            to_table,
            to_column,
        });
    }
    Ok(relationships)
}

fn primary_key_column(conn: &Connection, table: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) WHERE pk = 1")?;
    let mut rows = stmt.query(params![table])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table<'a>(schema: &'a SchemaMetadata, name: &str) -> &'a TableInfo {
        schema.tables.iter().find(|t| t.name == name).unwrap()
    }

    fn shop() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                 id INTEGER PRIMARY KEY,
                 name VARCHAR(100) NOT NULL,
                 status TEXT DEFAULT 'active'
             );
             CREATE TABLE orders (
                 id INTEGER PRIMARY KEY,
                 user_id INTEGER REFERENCES users(id),
                 coupon_id INTEGER REFERENCES coupons
             );
             CREATE TABLE coupons (code TEXT PRIMARY KEY);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_tables_sorted_and_columns_in_declaration_order() {
        let schema = read_schema(&shop()).unwrap();
        let names: Vec<_> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["coupons", "orders", "users"]);

        let users = table(&schema, "users");
        let columns: Vec<_> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "name", "status"]);
    }

    #[test]
    fn test_column_attributes() {
        let schema = read_schema(&shop()).unwrap();
        let users = table(&schema, "users");

        assert_eq!(users.columns[1].data_type, "VARCHAR(100)");
        assert!(!users.columns[1].nullable);
        assert!(users.columns[2].nullable);
        assert_eq!(users.columns[2].default.as_deref(), Some("'active'"));
    }

    #[test]
    fn test_foreign_keys_resolve_implicit_primary_key() {
        let schema = read_schema(&shop()).unwrap();
        assert_eq!(schema.relationships.len(), 2);
        assert!(schema.relationships.contains(&Relationship {
            from_table: "orders".into(),
            from_column: "user_id".into(),
            to_table: "users".into(),
            to_column: "id".into(),
        }));
        assert!(schema.relationships.contains(&Relationship {
            from_table: "orders".into(),
            from_column: "coupon_id".into(),
            to_table: "coupons".into(),
            to_column: "code".into(),
        }));
    }

    #[test]
    fn test_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = read_schema(&conn).unwrap();
        assert!(schema.tables.is_empty());
        assert!(schema.relationships.is_empty());
    }
}
