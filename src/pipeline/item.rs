use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single scraped data record
///
/// Items are produced by response callbacks (or the default extractor),
/// funneled through the pipeline one at a time, and written out in batches
/// by the storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Extracted key-value data
    pub fields: Map<String, Value>,

    /// Source page URL this item was extracted from
    pub url: String,

    /// Name of the callback that produced this item
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Crawl depth at which this item was found
    pub depth: u32,

    /// When this item was created
    pub timestamp: DateTime<Utc>,
}

impl Item {
    /// Creates an empty item for a source URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            fields: Map::new(),
            url: url.into(),
            source: String::new(),
            depth: 0,
            timestamp: Utc::now(),
        }
    }

    /// Sets a field value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Retrieves a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Retrieves a field value as a string slice, if it is one
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns true if the field exists
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Removes a field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }
}
