//! Local table store over SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};
use tracing::debug;

use super::{
    validate_identifier, Join, Predicate, Record, Relation, RemoteQueryError, StoreResult,
    TableQuery, TableStore, SCHEMA,
};

/// [`TableStore`] backed by a SQLite connection.
///
/// Rows get a v4 UUID `id` when the caller does not supply one. Substring
/// matching lowercases both sides with the `fold` SQL function, since
/// `LIKE` alone folds ASCII only.
pub struct SqliteTableStore {
    conn: Mutex<Connection>,
}

impl SqliteTableStore {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        register_fold(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RemoteQueryError::LockPoisoned)
    }

    fn select(&self, query: &TableQuery) -> StoreResult<Vec<Record>> {
        let conn = self.lock()?;
        select_rows(&conn, query)
    }

    fn insert_row(&self, table: &str, mut fields: Record) -> StoreResult<Record> {
        let table_sql = quote(table)?;
        let id = fields
            .entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()))
            .clone();

        let columns = fields
            .keys()
            .map(|k| quote(k))
            .collect::<StoreResult<Vec<_>>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let params: Vec<SqlValue> = fields.values().map(to_sql_value).collect();
        let sql = format!(
            "INSERT INTO {table_sql} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(params.iter()))?;
        fetch_by_id(&conn, table, &id)
    }

    fn update_row(&self, table: &str, id: &str, fields: Record) -> StoreResult<Record> {
        let table_sql = quote(table)?;
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (column, value) in fields.iter().filter(|(k, _)| k.as_str() != "id") {
            assignments.push(format!("{} = ?", quote(column)?));
            params.push(to_sql_value(value));
        }
        if !fields.contains_key("updated_at") {
            assignments.push("\"updated_at\" = datetime('now')".to_string());
        }
        params.push(SqlValue::Text(id.to_string()));

        let sql = format!(
            "UPDATE {table_sql} SET {} WHERE \"id\" = ?",
            assignments.join(", ")
        );

        let conn = self.lock()?;
        let rows_affected = conn.execute(&sql, params_from_iter(params.iter()))?;
        if rows_affected == 0 {
            return Err(RemoteQueryError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        fetch_by_id(&conn, table, &Value::String(id.to_string()))
    }

    fn delete_row(&self, table: &str, id: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE \"id\" = ?", quote(table)?);
        let conn = self.lock()?;
        let rows_affected = conn.execute(&sql, [id])?;
        debug!(table, id, rows_affected, "sqlite delete");
        Ok(())
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn query(&self, query: &TableQuery) -> StoreResult<Vec<Record>> {
        self.select(query)
    }

    async fn insert(&self, table: &str, fields: Record) -> StoreResult<Record> {
        self.insert_row(table, fields)
    }

    async fn update(&self, table: &str, id: &str, fields: Record) -> StoreResult<Record> {
        self.update_row(table, id, fields)
    }

    async fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        self.delete_row(table, id)
    }
}

fn quote(name: &str) -> StoreResult<String> {
    Ok(format!("\"{}\"", validate_identifier(name)?))
}

fn select_rows(conn: &Connection, query: &TableQuery) -> StoreResult<Vec<Record>> {
    let columns = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query
            .columns
            .iter()
            .map(|c| quote(c))
            .collect::<StoreResult<Vec<_>>>()?
            .join(", ")
    };
    let mut sql = format!("SELECT {columns} FROM {}", quote(&query.table)?);

    let mut params = Vec::new();
    if !query.filters.is_empty() {
        let clauses = query
            .filters
            .iter()
            .map(|p| predicate_sql(p, &mut params))
            .collect::<StoreResult<Vec<_>>>()?;
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if let Some(order) = &query.order {
        let direction = if order.ascending { "ASC" } else { "DESC" };
        sql.push_str(&format!(" ORDER BY {} {direction}", quote(&order.column)?));
    }

    debug!(%sql, params = params.len(), "sqlite select");

    let mut rows = read_rows(conn, &sql, &params)?;
    for join in &query.joins {
        for row in rows.iter_mut() {
            embed(conn, row, join)?;
        }
    }
    Ok(rows)
}

fn predicate_sql(predicate: &Predicate, params: &mut Vec<SqlValue>) -> StoreResult<String> {
    match predicate {
        Predicate::Eq { column, value } if value.is_null() => {
            Ok(format!("{} IS NULL", quote(column)?))
        }
        Predicate::Eq { column, value } => {
            params.push(to_sql_value(value));
            Ok(format!("{} = ?", quote(column)?))
        }
        Predicate::Gte { column, value } => {
            params.push(SqlValue::Real(*value));
            Ok(format!("{} >= ?", quote(column)?))
        }
        Predicate::Lt { column, value } => {
            params.push(SqlValue::Real(*value));
            Ok(format!("{} < ?", quote(column)?))
        }
        Predicate::Contains { column, needle } => {
            let needle = escape_like(&needle.to_lowercase());
            params.push(SqlValue::Text(format!("%{needle}%")));
            Ok(format!("fold({}) LIKE ? ESCAPE '\\'", quote(column)?))
        }
        // An empty disjunction matches nothing.
        Predicate::Or(inner) if inner.is_empty() => Ok("0".to_string()),
        Predicate::Or(inner) => {
            let parts = inner
                .iter()
                .map(|p| predicate_sql(p, params))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" OR ")))
        }
    }
}

/// Unicode lowercase, so `SIAMÊS` and `Siamês` compare equal. Non-text
/// values pass through.
fn register_fold(conn: &Connection) -> StoreResult<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(text) => {
                    SqlValue::Text(String::from_utf8_lossy(text).to_lowercase())
                }
                other => SqlValue::from(other),
            })
        },
    )?;
    Ok(())
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn read_rows(conn: &Connection, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
        let mut record = Record::new();
        for (i, name) in names.iter().enumerate() {
            record.insert(name.clone(), from_sql_value(row.get_ref(i)?));
        }
        Ok(record)
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

fn embed(conn: &Connection, row: &mut Record, join: &Join) -> StoreResult<()> {
    let embedded = match &join.relation {
        Relation::BelongsTo { foreign_key } => match row.get(foreign_key) {
            None | Some(Value::Null) => Value::Null,
            Some(key) => {
                let related = TableQuery::from(join.table.as_str())
                    .filter(Predicate::eq("id", key.clone()));
                select_rows(conn, &related)?
                    .into_iter()
                    .next()
                    .map(Value::Object)
                    .unwrap_or(Value::Null)
            }
        },
        Relation::HasMany { foreign_key } => match row.get("id") {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(key) => {
                let related = TableQuery::from(join.table.as_str())
                    .filter(Predicate::eq(foreign_key.as_str(), key.clone()));
                Value::Array(
                    select_rows(conn, &related)?
                        .into_iter()
                        .map(Value::Object)
                        .collect(),
                )
            }
        },
    };
    row.insert(join.table.clone(), embedded);
    Ok(())
}

fn fetch_by_id(conn: &Connection, table: &str, id: &Value) -> StoreResult<Record> {
    let query = TableQuery::from(table).filter(Predicate::eq("id", id.clone()));
    select_rows(conn, &query)?
        .into_iter()
        .next()
        .ok_or_else(|| RemoteQueryError::NotFound {
            table: table.to_string(),
            id: match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
