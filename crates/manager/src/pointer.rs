//! Applies one WAL entry's `key` (a JSON-pointer-shaped path, e.g. `/a`,
//! `/completedSteps/0`, or `/` for the whole document) to a raw
//! [`serde_json::Value`] during crash recovery.
//!
//! The transaction coordinator only knows how to replay entries into a
//! caller-supplied closure — it has no idea what a "document" looks like.
//! This is that closure's core: plain pointer-segment navigation, same
//! idea as [`serde_json::Value::pointer`] but mutable and with insert/remove
//! semantics at the final segment.

use cs_durability::{WalEntry, WalOp};
use serde_json::Value;
use std::io;

pub fn apply_wal_entry_to_value(doc: &mut Value, entry: &WalEntry) -> io::Result<()> {
    if entry.key == "/" {
        match entry.op {
            WalOp::Write => *doc = entry.value.clone().unwrap_or(Value::Null),
            WalOp::Delete => *doc = Value::Null,
        }
        return Ok(());
    }

    let trimmed = entry.key.trim_start_matches('/');
    let mut segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    let last = segments.pop().ok_or_else(|| invalid(&entry.key, "empty path"))?;

    let mut cursor = doc;
    for seg in &segments {
        cursor = cursor
            .as_object_mut()
            .and_then(|m| m.get_mut(*seg))
            .ok_or_else(|| invalid(&entry.key, "missing parent object"))?;
    }

    let obj = cursor.as_object_mut().ok_or_else(|| invalid(&entry.key, "parent is not an object"))?;
    match entry.op {
        WalOp::Write => {
            obj.insert(last.to_string(), entry.value.clone().unwrap_or(Value::Null));
        }
        WalOp::Delete => {
            obj.remove(last);
        }
    }
    Ok(())
}

fn invalid(key: &str, why: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("WAL path {key}: {why}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_durability::WalEntry;
    use serde_json::json;

    #[test]
    fn root_write_replaces_whole_document() {
        let mut doc = json!({"a": 1});
        let entry = WalEntry::write("/", json!({"b": 2}), None);
        apply_wal_entry_to_value(&mut doc, &entry).unwrap();
        assert_eq!(doc, json!({"b": 2}));
    }

    #[test]
    fn nested_write_sets_leaf_field() {
        let mut doc = json!({"a": {"b": 1}});
        let entry = WalEntry::write("/a/b", json!(99), None);
        apply_wal_entry_to_value(&mut doc, &entry).unwrap();
        assert_eq!(doc["a"]["b"], json!(99));
    }

    #[test]
    fn top_level_delete_removes_key() {
        let mut doc = json!({"a": 1, "b": 2});
        let entry = WalEntry::delete("/a", None);
        apply_wal_entry_to_value(&mut doc, &entry).unwrap();
        assert_eq!(doc, json!({"b": 2}));
    }

    #[test]
    fn missing_parent_is_an_error() {
        let mut doc = json!({"a": 1});
        let entry = WalEntry::write("/x/y", json!(1), None);
        assert!(apply_wal_entry_to_value(&mut doc, &entry).is_err());
    }
}
