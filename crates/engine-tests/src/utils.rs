use async_trait::async_trait;
use engine_processing::{error::UploadError, item::BatchPayload, upload::Uploader};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

/// One `update` action and its partial document, as read back from a bulk body.
#[derive(Debug, Clone)]
pub struct BulkEntry {
    pub id: String,
    pub doc: Value,
    pub doc_as_upsert: bool,
}

pub fn parse_bulk(content: &[u8]) -> Vec<BulkEntry> {
    let text = std::str::from_utf8(content).expect("bulk body is utf-8");
    assert!(text.ends_with('\n'), "bulk body must end with a newline");

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len() % 2, 0, "bulk body must hold action/document pairs");

    lines
        .chunks(2)
        .map(|pair| {
            let action: Value = serde_json::from_str(pair[0]).expect("action line");
            let body: Value = serde_json::from_str(pair[1]).expect("document line");
            BulkEntry {
                id: action["update"]["_id"]
                    .as_str()
                    .expect("update action carries an id")
                    .to_string(),
                doc: body["doc"].clone(),
                doc_as_upsert: body["doc_as_upsert"].as_bool().unwrap_or(false),
            }
        })
        .collect()
}

/// Applies entries the way an upsert-capable index would: top-level fields of
/// later partial documents overwrite or extend earlier ones.
pub fn merge_upserts<'a>(entries: impl IntoIterator<Item = &'a BulkEntry>) -> BTreeMap<String, Map<String, Value>> {
    let mut merged: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for entry in entries {
        let target = merged.entry(entry.id.clone()).or_default();
        if let Value::Object(fields) = &entry.doc {
            target.extend(fields.clone());
        }
    }
    merged
}

/// Batch files in a directory, keyed by the batch number in their name.
pub fn read_batch_files(dir: &Path) -> BTreeMap<u64, Vec<BulkEntry>> {
    fs::read_dir(dir)
        .expect("read output directory")
        .map(|entry| entry.expect("directory entry").path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            let number = name.strip_prefix("batch-")?.strip_suffix(".json")?.parse().ok()?;
            let content = fs::read(&path).expect("read batch file");
            Some((number, parse_bulk(&content)))
        })
        .collect()
}

/// Keeps every payload it is handed.
#[derive(Debug, Default)]
pub struct CollectingUploader {
    payloads: Mutex<Vec<BatchPayload>>,
}

impl CollectingUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn payloads(&self) -> Vec<BatchPayload> {
        self.payloads.lock().expect("uploader lock").clone()
    }

    pub fn entries(&self) -> Vec<BulkEntry> {
        self.payloads()
            .iter()
            .flat_map(|payload| parse_bulk(&payload.content))
            .collect()
    }
}

#[async_trait]
impl Uploader for CollectingUploader {
    fn name(&self) -> &str {
        "collect"
    }

    async fn upload(&self, payload: &BatchPayload) -> Result<(), UploadError> {
        self.payloads.lock().expect("uploader lock").push(payload.clone());
        Ok(())
    }
}
