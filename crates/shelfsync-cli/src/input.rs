use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use shelfsync_core::BookRecord;

fn read_json(path: &Path) -> Result<Value> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing JSON in {}", path.display()))
}

/// A JSON array of records, or an object with a `books` array.
pub fn read_records(path: &Path) -> Result<Vec<BookRecord>> {
    let value = read_json(path)?;
    let is_list = value.is_array() || value.get("books").is_some_and(Value::is_array);
    if !is_list {
        bail!(
            "{} holds neither a record array nor a `books` array",
            path.display()
        );
    }
    Ok(BookRecord::list_from_value(&value))
}

/// A single record object, or the only record of a one-element list.
pub fn read_record(path: &Path) -> Result<BookRecord> {
    let value = read_json(path)?;
    if value.is_object() && value.get("books").is_none() {
        return Ok(BookRecord::from_value(&value));
    }
    let mut records = BookRecord::list_from_value(&value);
    match records.len() {
        1 => Ok(records.remove(0)),
        n => bail!("{} must hold exactly one record, found {n}", path.display()),
    }
}
