//! The two standalone file converters: CSV to JSON, and JSON reformatting.
//!
//! Both are thin wrappers over the `csv` and `serde_json` crates; the only
//! logic of our own is path validation and whitespace trimming.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Error;

/// Converts a `.csv` file with a header row into a JSON array of objects,
/// written alongside the input with the extension replaced by `.json`.
///
/// Header names become keys and every value is a string; both are trimmed of
/// surrounding whitespace. Column order is preserved. Returns the path of
/// the written file.
pub fn csv_to_json(path: &Path) -> Result<PathBuf, Error> {
    if !path.is_file() {
        return Err(Error::InvalidPath(path.to_path_buf()));
    }
    if path.extension().and_then(OsStr::to_str) != Some("csv") {
        return Err(Error::NotCsv(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = serde_json::Map::new();
        for (key, value) in headers.iter().zip(record.iter()) {
            row.insert(key.to_string(), Value::String(value.to_string()));
        }
        rows.push(Value::Object(row));
    }

    let json_path = path.with_extension("json");
    write_json(&json_path, &Value::Array(rows), true)?;
    Ok(json_path)
}

/// Rewrites a JSON file in place, pretty-printed when `prettify` is set and
/// minified otherwise. Malformed input fails before anything is written.
pub fn format_json(path: &Path, prettify: bool) -> Result<(), Error> {
    if !path.is_file() {
        return Err(Error::InvalidPath(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    write_json(path, &value, prettify)
}

fn write_json(path: &Path, value: &Value, pretty: bool) -> Result<(), Error> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    fs::write(path, rendered)?;
    Ok(())
}
