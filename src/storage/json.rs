//! File-backed JSON storage writers

use crate::pipeline::Item;
use crate::storage::{Storage, StorageError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Appends one JSON object per line (JSONL / NDJSON)
pub struct JsonLinesStorage {
    writer: BufWriter<File>,
}

impl JsonLinesStorage {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl Storage for JsonLinesStorage {
    fn store(&mut self, items: &[Item]) -> Result<(), StorageError> {
        for item in items {
            serde_json::to_writer(&mut self.writer, item)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// Collects items and writes a single pretty-printed JSON array on close
pub struct JsonStorage {
    path: std::path::PathBuf,
    items: Vec<Item>,
}

impl JsonStorage {
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            items: Vec::new(),
        }
    }
}

impl Storage for JsonStorage {
    fn store(&mut self, items: &[Item]) -> Result<(), StorageError> {
        self.items.extend_from_slice(items);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.items)?;
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| {
                let mut item = Item::new(format!("http://example.com/{}", i));
                item.set("index", i);
                item
            })
            .collect()
    }

    #[test]
    fn test_jsonl_writes_one_line_per_item() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut storage = JsonLinesStorage::create(&path).unwrap();
        storage.store(&sample_items(3)).unwrap();
        storage.store(&sample_items(2)).unwrap();
        storage.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["url"].as_str().unwrap().starts_with("http://example.com/"));
        }
    }

    #[test]
    fn test_json_writes_array_on_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut storage = JsonStorage::create(&path);
        storage.store(&sample_items(4)).unwrap();
        storage.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
    }
}
