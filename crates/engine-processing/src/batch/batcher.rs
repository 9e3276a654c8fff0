use crate::item::{AssembledDocument, DocumentBatch};
use async_trait::async_trait;
use dashmap::DashMap;
use engine_core::stage::Stage;
use std::convert::Infallible;
use tracing::trace;

pub const STAGE_NAME: &str = "batch";

/// Groups the documents of each task key into batches of at most
/// `entities_per_batch`. The remainder is flushed when the key completes.
pub struct DocumentBatcher {
    entities_per_batch: usize,
    pending: DashMap<String, Vec<AssembledDocument>>,
}

impl DocumentBatcher {
    pub fn new(entities_per_batch: usize) -> Self {
        DocumentBatcher {
            entities_per_batch: entities_per_batch.max(1),
            pending: DashMap::new(),
        }
    }
}

#[async_trait]
impl Stage for DocumentBatcher {
    type Input = AssembledDocument;
    type Output = DocumentBatch;
    type Error = Infallible;

    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn handle(&self, document: AssembledDocument) -> Result<Vec<DocumentBatch>, Infallible> {
        let query_id = document.query_id.clone();
        let full = {
            let mut pending = self.pending.entry(query_id.clone()).or_default();
            pending.push(document);
            if pending.len() >= self.entities_per_batch {
                Some(std::mem::take(&mut *pending))
            } else {
                None
            }
        };

        Ok(full
            .map(|documents| {
                trace!(query_id = %query_id, documents = documents.len(), "Batch full");
                vec![DocumentBatch { query_id, documents }]
            })
            .unwrap_or_default())
    }

    async fn complete(&self, task_key: &str, _is_last: bool) -> Result<Vec<DocumentBatch>, Infallible> {
        let remainder = self
            .pending
            .remove(task_key)
            .map(|(_, documents)| documents)
            .unwrap_or_default();

        if remainder.is_empty() {
            return Ok(Vec::new());
        }
        trace!(query_id = %task_key, documents = remainder.len(), "Flushing remainder");
        Ok(vec![DocumentBatch {
            query_id: task_key.to_string(),
            documents: remainder,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(query_id: &str, id: usize) -> AssembledDocument {
        AssembledDocument {
            query_id: query_id.into(),
            entity_id: id.to_string(),
            body: json!({ "id": id }),
        }
    }

    #[tokio::test]
    async fn emits_full_batches_then_remainder() {
        let batcher = DocumentBatcher::new(2);
        let mut sizes = Vec::new();

        for id in 0..5 {
            for batch in batcher.handle(doc("q1", id)).await.unwrap() {
                sizes.push(batch.documents.len());
            }
        }
        batcher.handle(doc("q2", 9)).await.unwrap();

        let rest = batcher.complete("q1", false).await.unwrap();
        assert_eq!(sizes, vec![2, 2]);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].documents, vec![doc("q1", 4)]);

        assert!(batcher.complete("q1", false).await.unwrap().is_empty());
        assert_eq!(batcher.complete("q2", true).await.unwrap()[0].documents.len(), 1);
    }
}
