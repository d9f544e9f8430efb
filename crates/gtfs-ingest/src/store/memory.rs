//! In-memory document store

use super::{Document, DocumentStore, ScanPage, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Ordered map of documents; contents are lost on drop
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Map<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// All stored ids in ascending order
    pub async fn ids(&self) -> Vec<String> {
        self.documents.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.documents
            .read()
            .await
            .get(id)
            .map(|fields| Document::new(id, fields.clone()))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn put(&self, document: Document) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .insert(document.id, document.fields);
        Ok(())
    }

    async fn bulk_put(&self, documents: Vec<Document>) -> Result<(), StoreError> {
        let mut map = self.documents.write().await;
        for document in documents {
            map.insert(document.id, document.fields);
        }
        Ok(())
    }

    async fn range_scan(
        &self,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        if start > end {
            return Ok(ScanPage::default());
        }

        let map = self.documents.read().await;
        let range = map.range::<str, _>((
            std::ops::Bound::Included(start),
            std::ops::Bound::Included(end),
        ));

        let mut page = ScanPage::default();
        for (id, _) in range {
            if page.ids.len() < limit {
                page.ids.push(id.clone());
            }
            page.total_matching += 1;
        }
        Ok(page)
    }

    async fn range_ids(
        &self,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        if start > end {
            return Ok(Vec::new());
        }

        let map = self.documents.read().await;
        Ok(map
            .range::<str, _>((
                std::ops::Bound::Included(start),
                std::ops::Bound::Included(end),
            ))
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn bulk_delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut map = self.documents.write().await;
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }
}
