use crate::{
    error::BatchError,
    item::{AssembledDocument, BatchPayload, DocumentBatch},
};
use async_trait::async_trait;
use bytes::Bytes;
use engine_core::{context::BatchCounter, stage::Stage};
use serde::Serialize;
use tracing::trace;

pub const STAGE_NAME: &str = "save";

#[derive(Serialize)]
struct UpdateAction<'a> {
    update: UpdateTarget<'a>,
}

#[derive(Serialize)]
struct UpdateTarget<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    doc: &'a serde_json::Value,
    doc_as_upsert: bool,
}

/// Serializes document batches into bulk update-with-upsert payloads.
pub struct BatchAssembler {
    counter: BatchCounter,
}

impl BatchAssembler {
    pub fn new(counter: BatchCounter) -> Self {
        BatchAssembler { counter }
    }

    /// The batch number is drawn only after the payload is written.
    pub fn assemble(&self, batch: DocumentBatch) -> Result<BatchPayload, BatchError> {
        let content = write_bulk_lines(&batch.documents)?;
        let batch_number = self.counter.next();
        trace!(batch_number, query_id = %batch.query_id, bytes = content.len(), "Wrote batch");

        Ok(BatchPayload {
            batch_number,
            query_id: batch.query_id,
            document_count: batch.documents.len(),
            content: Bytes::from(content),
        })
    }
}

/// Two newline-terminated lines per document: the update action and the
/// upsert body.
pub fn write_bulk_lines(documents: &[AssembledDocument]) -> Result<Vec<u8>, BatchError> {
    let mut buffer = Vec::new();
    for document in documents {
        let to_error = |source| BatchError::Serialize {
            entity_id: document.entity_id.clone(),
            source,
        };

        let action = UpdateAction {
            update: UpdateTarget {
                id: &document.entity_id,
            },
        };
        serde_json::to_writer(&mut buffer, &action).map_err(to_error)?;
        buffer.push(b'\n');

        let body = UpsertBody {
            doc: &document.body,
            doc_as_upsert: true,
        };
        serde_json::to_writer(&mut buffer, &body).map_err(to_error)?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}

#[async_trait]
impl Stage for BatchAssembler {
    type Input = DocumentBatch;
    type Output = BatchPayload;
    type Error = BatchError;

    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn handle(&self, batch: DocumentBatch) -> Result<Vec<BatchPayload>, BatchError> {
        Ok(vec![self.assemble(batch)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{collections::HashSet, sync::Arc};

    fn doc(id: &str, body: serde_json::Value) -> AssembledDocument {
        AssembledDocument {
            query_id: "q1".into(),
            entity_id: id.into(),
            body,
        }
    }

    #[test]
    fn writes_exact_bulk_lines() {
        let assembler = BatchAssembler::new(BatchCounter::new());
        let payload = assembler
            .assemble(DocumentBatch {
                query_id: "q1".into(),
                documents: vec![doc("A", json!({"n": "x"})), doc("B", json!({"n": "y"}))],
            })
            .unwrap();

        let expected = concat!(
            "{\"update\":{\"_id\":\"A\"}}\n",
            "{\"doc\":{\"n\":\"x\"},\"doc_as_upsert\":true}\n",
            "{\"update\":{\"_id\":\"B\"}}\n",
            "{\"doc\":{\"n\":\"y\"},\"doc_as_upsert\":true}\n",
        );
        assert_eq!(std::str::from_utf8(&payload.content).unwrap(), expected);
        assert_eq!(payload.batch_number, 1);
        assert_eq!(payload.document_count, 2);
    }

    #[test]
    fn entity_ids_are_escaped() {
        let lines = write_bulk_lines(&[doc("a\"b", json!({}))]).unwrap();
        assert!(std::str::from_utf8(&lines).unwrap().starts_with(r#"{"update":{"_id":"a\"b"}}"#));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assemblers_draw_distinct_numbers() {
        let assembler = Arc::new(BatchAssembler::new(BatchCounter::new()));
        let mut handles = Vec::new();
        for task in 0..8 {
            let assembler = assembler.clone();
            handles.push(tokio::spawn(async move {
                let mut numbers = Vec::new();
                for i in 0..25 {
                    let payload = assembler
                        .handle(DocumentBatch {
                            query_id: format!("q{task}"),
                            documents: vec![doc(&i.to_string(), json!({ "i": i }))],
                        })
                        .await
                        .unwrap();
                    numbers.push(payload[0].batch_number);
                }
                numbers
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            let numbers = handle.await.unwrap();
            assert!(numbers.windows(2).all(|w| w[0] < w[1]));
            all.extend(numbers);
        }
        assert_eq!(all.len(), 200);
        assert_eq!(all.iter().max(), Some(&200));
    }
}
