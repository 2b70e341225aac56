//! Item post-processing pipeline
//!
//! Items flow through a chain of named middlewares in registration order.
//! A middleware may transform an item, drop it (by returning `None`), or
//! fail; failures drop the item and are logged by the engine, never
//! aborting the crawl.

mod item;

pub use item::Item;

use thiserror::Error;

/// Error raised by a pipeline middleware
#[derive(Debug, Error)]
#[error("pipeline error at stage {stage:?}: {message}")]
pub struct PipelineError {
    pub stage: String,
    pub message: String,
}

impl PipelineError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// A single item-processing stage
pub trait Middleware: Send + Sync {
    /// The middleware's identifier, used in logs and errors
    fn name(&self) -> &str;

    /// Transforms an item. Return `Ok(None)` to drop it.
    fn process(&self, item: Item) -> Result<Option<Item>, PipelineError>;
}

/// Chains middlewares together
#[derive(Default)]
pub struct Pipeline {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware to the chain
    pub fn add(&mut self, middleware: Box<dyn Middleware>) {
        tracing::debug!(
            "pipeline middleware added: {} (position {})",
            middleware.name(),
            self.middlewares.len()
        );
        self.middlewares.push(middleware);
    }

    /// Runs the item through every middleware in order
    ///
    /// Returns `Ok(None)` if any stage dropped the item.
    pub fn process(&self, item: Item) -> Result<Option<Item>, PipelineError> {
        let mut current = item;
        for middleware in &self.middlewares {
            match middleware.process(current)? {
                Some(next) => current = next,
                None => {
                    tracing::debug!("item dropped by stage {}", middleware.name());
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Drops items missing (or holding empty strings in) any required field
pub struct RequiredFields {
    pub fields: Vec<String>,
}

impl Middleware for RequiredFields {
    fn name(&self) -> &str {
        "required_fields"
    }

    fn process(&self, item: Item) -> Result<Option<Item>, PipelineError> {
        for field in &self.fields {
            match item.get(field) {
                None => return Ok(None),
                Some(value) => {
                    if value.as_str().is_some_and(str::is_empty) {
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Some(item))
    }
}

/// Renames fields according to an (old, new) mapping
pub struct RenameFields {
    pub mapping: Vec<(String, String)>,
}

impl Middleware for RenameFields {
    fn name(&self) -> &str {
        "rename_fields"
    }

    fn process(&self, mut item: Item) -> Result<Option<Item>, PipelineError> {
        for (old, new) in &self.mapping {
            if let Some(value) = item.remove(old) {
                item.set(new.clone(), value);
            }
        }
        Ok(Some(item))
    }
}

/// Trims surrounding whitespace from every string field
pub struct TrimStrings;

impl Middleware for TrimStrings {
    fn name(&self) -> &str {
        "trim_strings"
    }

    fn process(&self, mut item: Item) -> Result<Option<Item>, PipelineError> {
        for value in item.fields.values_mut() {
            let trimmed = value.as_str().and_then(|s| {
                let t = s.trim();
                (t.len() != s.len()).then(|| t.to_string())
            });
            if let Some(t) = trimmed {
                *value = t.into();
            }
        }
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with(fields: &[(&str, &str)]) -> Item {
        let mut item = Item::new("http://example.com/");
        for (k, v) in fields {
            item.set(*k, *v);
        }
        item
    }

    #[test]
    fn test_empty_pipeline_passes_through() {
        let pipeline = Pipeline::new();
        let item = item_with(&[("title", "T")]);
        let out = pipeline.process(item).unwrap().unwrap();
        assert_eq!(out.get_str("title"), Some("T"));
    }

    #[test]
    fn test_required_fields_drops_missing() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(RequiredFields {
            fields: vec!["title".to_string()],
        }));

        assert!(pipeline.process(item_with(&[("title", "T")])).unwrap().is_some());
        assert!(pipeline.process(item_with(&[("other", "x")])).unwrap().is_none());
        assert!(pipeline.process(item_with(&[("title", "")])).unwrap().is_none());
    }

    #[test]
    fn test_rename_fields() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(RenameFields {
            mapping: vec![("old".to_string(), "new".to_string())],
        }));

        let out = pipeline.process(item_with(&[("old", "v")])).unwrap().unwrap();
        assert!(!out.has("old"));
        assert_eq!(out.get_str("new"), Some("v"));
    }

    #[test]
    fn test_trim_strings() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(TrimStrings));

        let out = pipeline
            .process(item_with(&[("title", "  padded  ")]))
            .unwrap()
            .unwrap();
        assert_eq!(out.get_str("title"), Some("padded"));
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(RenameFields {
            mapping: vec![("a".to_string(), "b".to_string())],
        }));
        pipeline.add(Box::new(RequiredFields {
            fields: vec!["b".to_string()],
        }));

        // The rename must happen before the requirement check for this to pass
        let out = pipeline.process(item_with(&[("a", "v")])).unwrap();
        assert!(out.is_some());
        assert_eq!(pipeline.len(), 2);
    }

    struct Failing;
    impl Middleware for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn process(&self, _item: Item) -> Result<Option<Item>, PipelineError> {
            Err(PipelineError::new("failing", "boom"))
        }
    }

    #[test]
    fn test_error_propagates_with_stage_name() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(Failing));

        let err = pipeline.process(item_with(&[])).unwrap_err();
        assert_eq!(err.stage, "failing");
    }
}
