//! Mapping between synced records and their SQL rows.

use chrono::{DateTime, Utc};
use libsql::{Row, Value};

use crate::error::{Error, Result};
use crate::models::{RecordId, SyncableRecord};
use crate::util::from_millis;

/// A record stored one-per-row in its own table.
///
/// `COLUMNS` lists every column in the order produced by [`to_values`] and
/// consumed by [`from_row`]; `id` is always first.
///
/// [`to_values`]: TableRecord::to_values
/// [`from_row`]: TableRecord::from_row
pub trait TableRecord: SyncableRecord {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn to_values(&self) -> Result<Vec<Value>>;

    fn from_row(row: &Row) -> Result<Self>;
}

pub fn column_list<T: TableRecord>() -> String {
    T::COLUMNS.join(", ")
}

pub fn placeholders(count: usize, offset: usize) -> String {
    (1..=count)
        .map(|index| format!("?{}", index + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn select_sql<T: TableRecord>() -> String {
    format!("SELECT {} FROM {}", column_list::<T>(), T::TABLE)
}

pub fn insert_sql<T: TableRecord>() -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::TABLE,
        column_list::<T>(),
        placeholders(T::COLUMNS.len(), 0)
    )
}

/// Insert-or-update keyed on `id`.
///
/// Uses `ON CONFLICT DO UPDATE` rather than `REPLACE` so an update never
/// deletes the row and cascades to its children.
pub fn upsert_sql<T: TableRecord>() -> String {
    format!(
        "{} ON CONFLICT(id) DO UPDATE SET {}",
        insert_sql::<T>(),
        assignments::<T>("excluded.")
    )
}

/// `UPDATE ... WHERE id = ?1`, with the remaining columns bound in order.
pub fn update_sql<T: TableRecord>() -> String {
    let sets = T::COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, column)| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {} SET {sets} WHERE id = ?1", T::TABLE)
}

fn assignments<T: TableRecord>(source: &str) -> String {
    T::COLUMNS
        .iter()
        .skip(1)
        .map(|column| format!("{column} = {source}{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |value| Value::Text(value.to_string()))
}

pub fn millis(value: DateTime<Utc>) -> Value {
    Value::Integer(value.timestamp_millis())
}

pub fn id_value(id: RecordId) -> Value {
    Value::Text(id.as_str())
}

pub fn json_text(value: &serde_json::Value) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

pub fn get_text(row: &Row, index: i32) -> Result<String> {
    match row.get_value(index)? {
        Value::Text(value) => Ok(value),
        other => Err(column_type_error(index, "text", &other)),
    }
}

pub fn get_optional_text(row: &Row, index: i32) -> Result<Option<String>> {
    match row.get_value(index)? {
        Value::Null => Ok(None),
        Value::Text(value) => Ok(Some(value)),
        other => Err(column_type_error(index, "text", &other)),
    }
}

pub fn get_i64(row: &Row, index: i32) -> Result<i64> {
    match row.get_value(index)? {
        Value::Integer(value) => Ok(value),
        other => Err(column_type_error(index, "integer", &other)),
    }
}

pub fn get_bool(row: &Row, index: i32) -> Result<bool> {
    Ok(get_i64(row, index)? != 0)
}

pub fn get_id(row: &Row, index: i32) -> Result<RecordId> {
    let raw = get_text(row, index)?;
    raw.parse()
        .map_err(|error| Error::Database(format!("invalid id `{raw}`: {error}")))
}

pub fn get_timestamp(row: &Row, index: i32) -> Result<DateTime<Utc>> {
    let raw = get_i64(row, index)?;
    from_millis(raw).ok_or_else(|| Error::Database(format!("invalid timestamp {raw}")))
}

pub fn get_json(row: &Row, index: i32) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&get_text(row, index)?)?)
}

pub fn get_optional_json(row: &Row, index: i32) -> Result<Option<serde_json::Value>> {
    get_optional_text(row, index)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(Into::into)
}

/// Parse a stored enum through its `FromStr` impl.
pub fn get_parsed<T>(row: &Row, index: i32) -> Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    get_text(row, index)?.parse()
}

fn column_type_error(index: i32, expected: &str, found: &Value) -> Error {
    Error::Database(format!(
        "column {index}: expected {expected}, found {found:?}"
    ))
}
