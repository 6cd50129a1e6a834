//! Record sync pipeline
//!
//! Pulls JSON records from one or more upstream paths and turns each into a
//! [`DocumentRecord`] keyed by the configured id field.
//!
//! - extract: one retried request per source path, paced after every success
//! - items: field filters, then the record limit
//! - transform: record must be an object whose id is a non-empty string or a
//!   number, free of `/`

use crate::error::{ItemError, PipelineError};
use crate::fetcher::{Fetcher, RecordSource};
use crate::pipeline::{PhaseProgress, Pipeline, PipelineContext, ValidationReport};
use crate::store::address::is_collection_path;
use crate::store::DocumentRecord;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Generic upstream-to-collection sync
pub struct RecordSyncPipeline {
    source: Arc<dyn RecordSource>,
    fetcher: Fetcher,
    sources: Vec<String>,
}

impl RecordSyncPipeline {
    pub fn new(source: Arc<dyn RecordSource>, fetcher: Fetcher, sources: Vec<String>) -> Self {
        Self {
            source,
            fetcher,
            sources,
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

/// Whether `record` has every `field = value` pair in `filters`
///
/// String fields compare by content; other values by their JSON text.
fn matches_filters(record: &Value, filters: &BTreeMap<String, String>) -> bool {
    filters.iter().all(|(field, expected)| match record.get(field) {
        Some(Value::String(actual)) => actual == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

fn document_id(
    record: &serde_json::Map<String, Value>,
    id_field: &str,
) -> Result<String, ItemError> {
    let id = match record.get(id_field) {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        Some(_) => return Err(ItemError::new(format!("field '{}' is not a usable id", id_field))),
        None => return Err(ItemError::new(format!("missing id field '{}'", id_field))),
    };

    if id.contains('/') {
        return Err(ItemError::for_key(id, "id contains '/'"));
    }
    Ok(id)
}

#[async_trait]
impl Pipeline for RecordSyncPipeline {
    type Raw = Vec<Value>;
    type Item = Value;
    type Output = DocumentRecord;

    fn name(&self) -> &str {
        "record-sync"
    }

    async fn validate(&self, ctx: &PipelineContext) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.sources.is_empty() {
            errors.push("at least one source path is required".to_string());
        }
        if self.sources.iter().any(|s| s.trim().is_empty()) {
            errors.push("source paths must not be empty".to_string());
        }

        let base_url = &ctx.config.upstream.base_url;
        if let Err(e) = reqwest::Url::parse(base_url) {
            errors.push(format!("upstream.base_url '{}' is not a valid URL: {}", base_url, e));
        }

        if !is_collection_path(&ctx.options.destination) {
            errors.push(format!(
                "destination '{}' is not a collection path",
                ctx.options.destination
            ));
        }

        if ctx.config.upstream.id_field.trim().is_empty() {
            errors.push("upstream.id_field must not be empty".to_string());
        }

        errors.extend(ctx.config.validate());

        if ctx.config.retry.max_attempts == 1 {
            warnings.push("retries disabled (retry.max_attempts = 1)".to_string());
        }
        if ctx.options.dry_run {
            warnings.push("dry run: documents are not persisted".to_string());
        }
        if ctx.options.limit == Some(0) {
            warnings.push("limit is 0: no records will be processed".to_string());
        }

        ValidationReport::from_messages(errors, warnings)
    }

    async fn extract(
        &self,
        _ctx: &PipelineContext,
        progress: &PhaseProgress<'_>,
    ) -> Result<Vec<Value>, PipelineError> {
        let total = self.sources.len();
        let mut records = Vec::new();

        for (index, path) in self.sources.iter().enumerate() {
            let label = format!("fetch {}", path);
            let batch = self
                .fetcher
                .retry(&label, || self.source.fetch_records(path))
                .await
                .map_err(|source| PipelineError::Remote {
                    label: label.clone(),
                    attempts: self.fetcher.max_attempts(),
                    source,
                })?;

            info!(source = %path, records = batch.len(), "Source fetched");
            let fetched = batch.len();
            records.extend(batch);

            self.fetcher.pause_between_requests().await;
            progress.report(
                index + 1,
                total,
                format!("Fetched {} ({} records)", path, fetched),
            );
        }

        Ok(records)
    }

    fn items(&self, ctx: &PipelineContext, raw: Vec<Value>) -> Result<Vec<Value>, PipelineError> {
        let fetched = raw.len();
        let filters = &ctx.options.filters;

        let mut items: Vec<Value> = raw
            .into_iter()
            .filter(|record| matches_filters(record, filters))
            .collect();
        let matched = items.len();

        if let Some(limit) = ctx.options.limit {
            items.truncate(limit);
        }

        info!(
            fetched,
            matched,
            selected = items.len(),
            "Records selected for transform"
        );
        Ok(items)
    }

    fn transform_item(
        &self,
        ctx: &PipelineContext,
        item: Value,
    ) -> Result<DocumentRecord, ItemError> {
        let record = match item {
            Value::Object(record) => record,
            other => {
                return Err(ItemError::new(format!(
                    "record is not a JSON object (got {})",
                    json_kind(&other)
                )))
            }
        };

        let id = document_id(&record, &ctx.config.upstream.id_field)?;
        Ok(DocumentRecord::new(id, record))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters_compare_strings_and_json_text() {
        let record = json!({"chamber": "senate", "year": 2024});
        let mut filters = BTreeMap::new();
        filters.insert("chamber".to_string(), "senate".to_string());
        filters.insert("year".to_string(), "2024".to_string());
        assert!(matches_filters(&record, &filters));

        filters.insert("bloc".to_string(), "X".to_string());
        assert!(!matches_filters(&record, &filters));
    }

    #[test]
    fn test_document_id_rules() {
        let record = |v: Value| v.as_object().cloned().unwrap();

        assert_eq!(document_id(&record(json!({"id": " A12 "})), "id").unwrap(), "A12");
        assert_eq!(document_id(&record(json!({"id": 42})), "id").unwrap(), "42");
        assert!(document_id(&record(json!({"id": ""})), "id").is_err());
        assert!(document_id(&record(json!({"id": null})), "id").is_err());
        assert!(document_id(&record(json!({"name": "x"})), "id").is_err());

        let err = document_id(&record(json!({"id": "a/b"})), "id").unwrap_err();
        assert_eq!(err.key.as_deref(), Some("a/b"));
    }
}
