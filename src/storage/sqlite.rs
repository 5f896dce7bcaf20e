//! Embedded relational backend
//!
//! Tables are written with replace semantics inside one transaction, so a
//! failed save leaves the previous content untouched.
//!
//! Every written table gets a layout row in `__umetl_tables` (column order
//! and kinds) and, where needed, per-cell tags in `__umetl_cells`: cells a
//! record did not carry are tagged `absent`, and cells of a column mixing
//! value kinds are tagged with their own kind. Reading applies both, so a
//! table comes back exactly as it was written. Tables created by scripts
//! have no layout row and are read from their declared column types.

use super::params::NamedQuery;
use crate::table::{Record, Table, Value, format_timestamp, parse_timestamp};
use eyre::{Context, Result, bail};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql, params, params_from_iter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix reserved for bookkeeping tables
const RESERVED_PREFIX: &str = "__umetl_";
const TABLES_META: &str = "__umetl_tables";
const CELLS_META: &str = "__umetl_cells";
/// Stand-in column for tables written without any column
const PLACEHOLDER_COLUMN: &str = "__umetl_placeholder";
/// Cell tag for a column the record did not carry
const ABSENT: &str = "absent";

/// Kind of a stored column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Real,
    Text,
    Timestamp,
    Boolean,
    /// Values of more than one kind; each cell carries its own tag
    Mixed,
    /// No values, or a column we did not write; read back as stored
    Any,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Integer(_) => Some(Self::Integer),
            Value::Float(_) => Some(Self::Real),
            Value::Text(_) => Some(Self::Text),
            Value::Timestamp(_) => Some(Self::Timestamp),
        }
    }

    fn infer(table: &Table, column: &str) -> Self {
        let mut kinds = table
            .iter()
            .filter_map(|record| record.get(column))
            .filter_map(Self::of);

        let Some(first) = kinds.next() else {
            return Self::Any;
        };
        if kinds.all(|kind| kind == first) {
            first
        } else {
            Self::Mixed
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Boolean => "boolean",
            Self::Mixed => "mixed",
            Self::Any => "any",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        [
            Self::Integer,
            Self::Real,
            Self::Text,
            Self::Timestamp,
            Self::Boolean,
            Self::Mixed,
            Self::Any,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }

    fn from_decl(decl: &str) -> Self {
        let decl = decl.trim().to_ascii_uppercase();
        if decl.contains("TIMESTAMP") || decl == "DATETIME" {
            Self::Timestamp
        } else if decl.starts_with("BOOL") {
            Self::Boolean
        } else {
            Self::Any
        }
    }

    fn decl(self) -> &'static str {
        match self {
            Self::Integer => " INTEGER",
            Self::Real => " REAL",
            Self::Text => " TEXT",
            Self::Timestamp => " TIMESTAMP",
            Self::Boolean => " BOOLEAN",
            Self::Mixed | Self::Any => "",
        }
    }

    fn read(self, value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) if self == Self::Boolean => Value::Bool(i != 0),
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                match self {
                    Self::Timestamp => parse_timestamp(&text)
                        .map_or(Value::Text(text), Value::Timestamp),
                    _ => Value::Text(text),
                }
            }
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(Sql::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Timestamp(ts) => ToSqlOutput::Owned(Sql::Text(format_timestamp(ts))),
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Tag to record for `value` in `column`, if any
fn cell_tag(value: Option<&Value>, kind: ColumnKind) -> Option<&'static str> {
    match value {
        None => Some(ABSENT),
        Some(value) if kind == ColumnKind::Mixed => ColumnKind::of(value).map(ColumnKind::name),
        Some(_) => None,
    }
}

/// A connection to the embedded database file
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and check it answers
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let store = Self { conn, path };
        store.ping()?;
        store.ensure_metadata()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ping(&self) -> Result<()> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("Database did not answer")?;
        Ok(())
    }

    fn ensure_metadata(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {TABLES_META} (
                     table_name TEXT PRIMARY KEY,
                     columns TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS {CELLS_META} (
                     table_name TEXT NOT NULL,
                     row_id INTEGER NOT NULL,
                     column_name TEXT NOT NULL,
                     tag TEXT NOT NULL,
                     PRIMARY KEY (table_name, row_id, column_name)
                 );"
            ))
            .context("Failed to create table metadata")
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Replace `name` with the content of `table`, all or nothing
    pub fn write_table(&mut self, table: &Table, name: &str) -> Result<usize> {
        if name.starts_with(RESERVED_PREFIX) {
            bail!("Table name is reserved: {}", name);
        }

        let columns: Vec<(String, ColumnKind)> = table
            .columns()
            .into_iter()
            .map(|column| {
                let kind = ColumnKind::infer(table, &column);
                (column, kind)
            })
            .collect();
        let target = quote_ident(name);

        let definitions = if columns.is_empty() {
            quote_ident(PLACEHOLDER_COLUMN)
        } else {
            columns
                .iter()
                .map(|(column, kind)| format!("{}{}", quote_ident(column), kind.decl()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let insert = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", target)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                target,
                columns
                    .iter()
                    .map(|(column, _)| quote_ident(column))
                    .collect::<Vec<_>>()
                    .join(", "),
                (1..=columns.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let layout = serde_json::to_string(
            &columns
                .iter()
                .map(|(column, kind)| (column.as_str(), kind.name()))
                .collect::<Vec<_>>(),
        )?;

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", target), [])?;
        tx.execute(&format!("CREATE TABLE {} ({})", target, definitions), [])?;
        tx.execute(
            &format!("DELETE FROM {CELLS_META} WHERE table_name = ?1"),
            [name],
        )?;
        tx.execute(
            &format!("INSERT OR REPLACE INTO {TABLES_META} (table_name, columns) VALUES (?1, ?2)"),
            params![name, layout],
        )?;

        {
            let mut rows = tx.prepare(&insert)?;
            let mut tags = tx.prepare(&format!(
                "INSERT INTO {CELLS_META} (table_name, row_id, column_name, tag) VALUES (?1, ?2, ?3, ?4)"
            ))?;

            for record in table {
                let values = columns
                    .iter()
                    .map(|(column, _)| record.get(column).cloned().unwrap_or_default());
                rows.execute(params_from_iter(values))?;
                let row_id = tx.last_insert_rowid();

                for (column, kind) in &columns {
                    if let Some(tag) = cell_tag(record.get(column), *kind) {
                        tags.execute(params![name, row_id, column, tag])?;
                    }
                }
            }
        }

        tx.commit()
            .with_context(|| format!("Failed to commit table: {}", name))?;
        Ok(table.len())
    }

    /// Drop `name` and its metadata, if present
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
        tx.execute(
            &format!("DELETE FROM {TABLES_META} WHERE table_name = ?1"),
            [name],
        )?;
        tx.execute(
            &format!("DELETE FROM {CELLS_META} WHERE table_name = ?1"),
            [name],
        )?;
        tx.commit()
            .with_context(|| format!("Failed to drop table: {}", name))
    }

    /// Columns as declared in the schema
    fn declared_columns(&self, name: &str) -> Result<Vec<(String, ColumnKind)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map([name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let columns = rows
            .map(|row| row.map(|(column, decl)| (column, ColumnKind::from_decl(&decl))))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// Columns as recorded when the table was written
    fn layout(&self, name: &str) -> Result<Option<Vec<(String, ColumnKind)>>> {
        let json: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT columns FROM {TABLES_META} WHERE table_name = ?1"),
                [name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Ok(None);
        };

        let pairs: Vec<(String, String)> = serde_json::from_str(&json)
            .with_context(|| format!("Corrupt layout for table: {}", name))?;
        Ok(Some(
            pairs
                .into_iter()
                .map(|(column, kind)| (column, ColumnKind::from_name(&kind).unwrap_or(ColumnKind::Any)))
                .collect(),
        ))
    }

    fn cell_tags(&self, name: &str) -> Result<HashMap<i64, HashMap<String, String>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT row_id, column_name, tag FROM {CELLS_META} WHERE table_name = ?1"
        ))?;
        let rows = stmt.query_map([name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut tags: HashMap<i64, HashMap<String, String>> = HashMap::new();
        for row in rows {
            let (row_id, column, tag) = row?;
            tags.entry(row_id).or_default().insert(column, tag);
        }
        Ok(tags)
    }

    /// Read `name` back in insertion order
    pub fn read_table(&self, name: &str) -> Result<Table> {
        let declared = self.declared_columns(name)?;

        // A layout only applies while the schema still matches it
        let layout = self.layout(name)?.filter(|layout| {
            let expected: Vec<&str> = if layout.is_empty() {
                vec![PLACEHOLDER_COLUMN]
            } else {
                layout.iter().map(|(column, _)| column.as_str()).collect()
            };
            declared
                .iter()
                .map(|(column, _)| column.as_str())
                .eq(expected)
        });
        let (columns, tags) = match layout {
            Some(layout) => (layout, self.cell_tags(name)?),
            None => (declared, HashMap::new()),
        };

        let select = std::iter::once("rowid".to_string())
            .chain(columns.iter().map(|(column, _)| quote_ident(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            select,
            quote_ident(name)
        ))?;
        let mut rows = stmt.query([])?;

        let mut table = Table::new();
        while let Some(row) = rows.next()? {
            let row_id: i64 = row.get(0)?;
            let row_tags = tags.get(&row_id);

            let mut record = Record::new();
            for (index, (column, kind)) in columns.iter().enumerate() {
                let kind = match row_tags.and_then(|tags| tags.get(column)) {
                    Some(tag) if tag == ABSENT => continue,
                    Some(tag) => ColumnKind::from_name(tag).unwrap_or(*kind),
                    None => *kind,
                };
                record.insert(column.as_str(), kind.read(row.get_ref(index + 1)?));
            }
            table.push(record);
        }
        Ok(table)
    }

    /// Run a read query with named bindings
    pub fn query(&self, query: &NamedQuery) -> Result<Table> {
        let mut stmt = self
            .conn
            .prepare(&query.sql)
            .with_context(|| format!("Failed to prepare query: {}", query.sql))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let markers: Vec<String> = query.params.keys().map(|k| format!(":{}", k)).collect();
        let bindings: Vec<(&str, &dyn ToSql)> = markers
            .iter()
            .zip(query.params.values())
            .map(|(marker, value)| (marker.as_str(), value as &dyn ToSql))
            .collect();

        let mut rows = stmt.query(bindings.as_slice())?;
        let mut table = Table::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (index, column) in names.iter().enumerate() {
                record.insert(column.as_str(), ColumnKind::Any.read(row.get_ref(index)?));
            }
            table.push(record);
        }
        Ok(table)
    }

    /// Execute statements in order, in one transaction
    pub fn execute_statements<'a>(
        &mut self,
        statements: impl IntoIterator<Item = &'a str>,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        for statement in statements {
            tx.execute_batch(statement)
                .with_context(|| format!("Failed to execute statement: {}", statement))?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn transit() -> Table {
        let arrival = Utc.with_ymd_and_hms(2025, 11, 6, 10, 15, 0).unwrap();
        Table::from_records(vec![
            Record::new()
                .with("route_id", "R1")
                .with("stop_sequence", 3_i64)
                .with("arrival_time", arrival)
                .with("delay_minutes", 1.5)
                .with("wheelchair", true)
                .with("note", "12.5"),
            Record::new()
                .with("route_id", "R2")
                .with("stop_sequence", Value::Null)
                .with("arrival_time", Value::Null)
                .with("delay_minutes", 0.0)
                .with("wheelchair", false)
                .with("note", 7_i64),
        ])
    }

    #[test]
    fn test_write_read_preserves_types() {
        let (_dir, mut store) = open_temp();
        let table = transit();

        assert_eq!(store.write_table(&table, "mta_status").unwrap(), 2);
        assert!(store.table_exists("mta_status").unwrap());
        assert_eq!(store.read_table("mta_status").unwrap(), table);
    }

    #[test]
    fn test_mixed_columns_keep_each_cell_kind() {
        let (_dir, mut store) = open_temp();
        let arrival = Utc.with_ymd_and_hms(2025, 11, 6, 10, 15, 0).unwrap();
        let table = Table::from_records(vec![
            Record::new().with("flag", true).with("seen", arrival),
            Record::new().with("flag", 7_i64).with("seen", "later"),
            Record::new().with("flag", 2.0).with("seen", Value::Null),
        ]);

        store.write_table(&table, "mixed").unwrap();
        assert_eq!(store.read_table("mixed").unwrap(), table);
    }

    #[test]
    fn test_sparse_records_stay_sparse() {
        let (_dir, mut store) = open_temp();
        let table = Table::from_records(vec![
            Record::new().with("pickup_location_id", 100_i64).with("fare", 15.5),
            Record::new().with("fare", Value::Null),
            Record::new(),
        ]);

        store.write_table(&table, "trips").unwrap();
        assert_eq!(store.read_table("trips").unwrap(), table);
    }

    #[test]
    fn test_write_replaces() {
        let (_dir, mut store) = open_temp();
        store.write_table(&transit(), "mta_status").unwrap();

        let replacement = Table::from_records(vec![Record::new().with("other", "x")]);
        store.write_table(&replacement, "mta_status").unwrap();

        assert_eq!(store.read_table("mta_status").unwrap(), replacement);
    }

    #[test]
    fn test_empty_table() {
        let (_dir, mut store) = open_temp();
        store.write_table(&Table::new(), "trips").unwrap();

        assert!(store.table_exists("trips").unwrap());
        assert!(store.read_table("trips").unwrap().is_empty());
    }

    #[test]
    fn test_records_without_columns() {
        let (_dir, mut store) = open_temp();
        let table = Table::from_records(vec![Record::new(), Record::new()]);

        store.write_table(&table, "blank").unwrap();
        assert_eq!(store.read_table("blank").unwrap(), table);
    }

    #[test]
    fn test_placeholder_like_column_names_survive() {
        let (_dir, mut store) = open_temp();
        let table = Table::from_records(vec![
            Record::new().with("__empty__", 1_i64),
            Record::new().with(PLACEHOLDER_COLUMN, 2_i64),
        ]);

        store.write_table(&table, "odd").unwrap();
        assert_eq!(store.read_table("odd").unwrap(), table);
    }

    #[test]
    fn test_reserved_names_rejected() {
        let (_dir, mut store) = open_temp();
        assert!(store.write_table(&transit(), TABLES_META).is_err());
    }

    #[test]
    fn test_case_clashing_columns_fail_without_changes() {
        let (_dir, mut store) = open_temp();
        let original = Table::from_records(vec![Record::new().with("a", 1_i64)]);
        store.write_table(&original, "x").unwrap();

        let clashing = Table::from_records(vec![
            Record::new().with("fare", 2_i64).with("Fare", 3_i64),
        ]);
        assert!(store.write_table(&clashing, "x").is_err());
        assert_eq!(store.read_table("x").unwrap(), original);
    }

    #[test]
    fn test_drop_table() {
        let (_dir, mut store) = open_temp();
        store.write_table(&transit(), "mta_status").unwrap();

        store.drop_table("mta_status").unwrap();
        assert!(!store.table_exists("mta_status").unwrap());
        assert!(store.layout("mta_status").unwrap().is_none());
        store.drop_table("mta_status").unwrap();
    }

    #[test]
    fn test_recreated_by_script_ignores_old_layout() {
        let (_dir, mut store) = open_temp();
        store.write_table(&transit(), "zones").unwrap();

        store
            .execute_statements([
                "DROP TABLE zones",
                "CREATE TABLE zones (zone_id INTEGER, opened TIMESTAMP)",
                "INSERT INTO zones VALUES (1, '2025-11-06T10:15:00Z')",
            ])
            .unwrap();

        let opened = Utc.with_ymd_and_hms(2025, 11, 6, 10, 15, 0).unwrap();
        assert_eq!(
            store.read_table("zones").unwrap(),
            Table::from_records(vec![
                Record::new().with("zone_id", 1_i64).with("opened", opened)
            ])
        );
    }

    #[test]
    fn test_query_with_named_params() {
        let (_dir, mut store) = open_temp();
        store.write_table(&transit(), "mta_status").unwrap();

        let query = crate::storage::params::to_named(
            "SELECT route_id FROM mta_status WHERE delay_minutes > ?",
            &[Value::Float(1.0)],
        )
        .unwrap();
        let result = store.query(&query).unwrap();

        assert_eq!(
            result,
            Table::from_records(vec![Record::new().with("route_id", "R1")])
        );
    }

    #[test]
    fn test_failed_statements_roll_back() {
        let (_dir, mut store) = open_temp();

        let result = store.execute_statements([
            "CREATE TABLE zones (zone_id INTEGER)",
            "INSERT INTO nowhere VALUES (1)",
        ]);

        assert!(result.is_err());
        assert!(!store.table_exists("zones").unwrap());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("trips"), "\"trips\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
