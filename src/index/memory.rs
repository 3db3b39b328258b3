//! In-memory [`EntryIndex`] used by the integration suite.
//!
//! Namespaces map to insertion-ordered vectors behind a `std::sync::RwLock`;
//! semantic queries are brute-force cosine similarity over ready entries.
//! Listing cursors encode the next start position.

use crate::index::types::{
    ClaimOutcome, EntryPage, EntryRecord, EntryStatus, IndexError, NamespaceId, ScoredEntry,
};
use crate::index::EntryIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

struct StoredEntry {
    record: EntryRecord,
    vector: Vec<f32>,
}

/// Process-local index implementation.
#[derive(Default)]
pub struct MemoryEntryIndex {
    namespaces: RwLock<HashMap<String, Vec<StoredEntry>>>,
}

impl MemoryEntryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

fn lock_error() -> IndexError {
    IndexError::Backend("namespace lock poisoned".into())
}

#[async_trait]
impl EntryIndex for MemoryEntryIndex {
    async fn ensure_namespace(
        &self,
        namespace: &NamespaceId,
        _vector_size: u64,
    ) -> Result<(), IndexError> {
        let mut namespaces = self.namespaces.write().map_err(|_| lock_error())?;
        namespaces.entry(namespace.0.clone()).or_default();
        Ok(())
    }

    async fn namespace_exists(&self, namespace: &NamespaceId) -> Result<bool, IndexError> {
        let namespaces = self.namespaces.read().map_err(|_| lock_error())?;
        Ok(namespaces.contains_key(&namespace.0))
    }

    async fn get_entry(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<Option<EntryRecord>, IndexError> {
        let namespaces = self.namespaces.read().map_err(|_| lock_error())?;
        Ok(namespaces.get(&namespace.0).and_then(|entries| {
            entries
                .iter()
                .find(|stored| stored.record.entry_id == entry_id)
                .map(|stored| stored.record.clone())
        }))
    }

    async fn claim_entry(
        &self,
        namespace: &NamespaceId,
        record: EntryRecord,
        vector: Vec<f32>,
    ) -> Result<ClaimOutcome, IndexError> {
        let mut namespaces = self.namespaces.write().map_err(|_| lock_error())?;
        let entries = namespaces.entry(namespace.0.clone()).or_default();

        // The whole decision happens under the write lock, so racing claims
        // for one id serialize and exactly one of them inserts.
        match entries
            .iter()
            .position(|stored| stored.record.entry_id == record.entry_id)
        {
            Some(idx) if entries[idx].record.status == EntryStatus::Error => {
                // Replacing an errored id keeps its position in insertion order.
                let replaced = std::mem::replace(&mut entries[idx].record, record);
                entries[idx].vector = vector;
                Ok(ClaimOutcome::Claimed {
                    replaced: Some(replaced),
                })
            }
            Some(idx) => Ok(ClaimOutcome::Occupied(entries[idx].record.clone())),
            None => {
                entries.push(StoredEntry { record, vector });
                Ok(ClaimOutcome::Claimed { replaced: None })
            }
        }
    }

    async fn set_status(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
        status: EntryStatus,
    ) -> Result<(), IndexError> {
        let mut namespaces = self.namespaces.write().map_err(|_| lock_error())?;
        let entries = namespaces
            .get_mut(&namespace.0)
            .ok_or_else(|| IndexError::Backend(format!("unknown namespace {namespace}")))?;
        let stored = entries
            .iter_mut()
            .find(|stored| stored.record.entry_id == entry_id)
            .ok_or_else(|| IndexError::Backend(format!("unknown entry {entry_id}")))?;
        stored.record.status = status;
        Ok(())
    }

    async fn list_page(
        &self,
        namespace: &NamespaceId,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<EntryPage, IndexError> {
        let namespaces = self.namespaces.read().map_err(|_| lock_error())?;
        let Some(entries) = namespaces.get(&namespace.0) else {
            return Ok(EntryPage {
                entries: Vec::new(),
                is_done: true,
                continue_cursor: String::new(),
            });
        };

        let start = match cursor.filter(|value| !value.is_empty()) {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| IndexError::Backend(format!("invalid cursor {value}")))?,
            None => 0,
        };

        let page: Vec<EntryRecord> = entries
            .iter()
            .skip(start)
            .take(page_size)
            .map(|stored| stored.record.clone())
            .collect();

        let next = start + page.len();
        let is_done = next >= entries.len();
        Ok(EntryPage {
            entries: page,
            is_done,
            continue_cursor: if is_done { String::new() } else { next.to_string() },
        })
    }

    async fn delete_entry(
        &self,
        namespace: &NamespaceId,
        entry_id: &str,
    ) -> Result<(), IndexError> {
        let mut namespaces = self.namespaces.write().map_err(|_| lock_error())?;
        if let Some(entries) = namespaces.get_mut(&namespace.0) {
            entries.retain(|stored| stored.record.entry_id != entry_id);
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &NamespaceId,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, IndexError> {
        let namespaces = self.namespaces.read().map_err(|_| lock_error())?;
        let Some(entries) = namespaces.get(&namespace.0) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredEntry> = entries
            .iter()
            .filter(|stored| stored.record.status == EntryStatus::Ready)
            .map(|stored| ScoredEntry {
                record: stored.record.clone(),
                score: cosine_sim(&vector, &stored.vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::EntryMetadata;

    fn record(id: &str, status: EntryStatus) -> EntryRecord {
        EntryRecord {
            entry_id: id.into(),
            key: format!("{id}.txt"),
            content_hash: format!("hash-{id}"),
            status,
            text: format!("text for {id}"),
            metadata: EntryMetadata {
                storage_ref: None,
                uploaded_by: "org-1".into(),
                filename: format!("{id}.txt"),
                category: None,
            },
            ingested_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn pagination_concatenates_to_full_ordered_set() {
        let index = MemoryEntryIndex::new();
        let namespace = NamespaceId("kb_org-1".into());
        index.ensure_namespace(&namespace, 4).await.expect("ensure");
        for i in 0..5 {
            index
                .claim_entry(&namespace, record(&format!("e{i}"), EntryStatus::Ready), vec![1.0; 4])
                .await
                .expect("claim");
        }

        let mut collected = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = index
                .list_page(&namespace, cursor.clone(), 2)
                .await
                .expect("page");
            pages += 1;
            collected.extend(page.entries.iter().map(|e| e.entry_id.clone()));
            if page.is_done {
                assert!(page.continue_cursor.is_empty());
                break;
            }
            cursor = Some(page.continue_cursor);
        }

        assert_eq!(pages, 3);
        assert_eq!(collected, vec!["e0", "e1", "e2", "e3", "e4"]);
    }

    #[tokio::test]
    async fn query_skips_non_ready_entries() {
        let index = MemoryEntryIndex::new();
        let namespace = NamespaceId("kb_org-1".into());
        index.ensure_namespace(&namespace, 2).await.expect("ensure");
        index
            .claim_entry(&namespace, record("ready", EntryStatus::Ready), vec![1.0, 0.0])
            .await
            .expect("claim");
        index
            .claim_entry(&namespace, record("pending", EntryStatus::Pending), vec![1.0, 0.0])
            .await
            .expect("claim");

        let results = index
            .query(&namespace, vec![1.0, 0.0], 10)
            .await
            .expect("query");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.entry_id, "ready");
    }

    #[tokio::test]
    async fn claim_refuses_live_ids_and_replaces_errored_ones_in_place() {
        let index = MemoryEntryIndex::new();
        let namespace = NamespaceId("kb_org-1".into());
        index.ensure_namespace(&namespace, 2).await.expect("ensure");

        let first = index
            .claim_entry(&namespace, record("a", EntryStatus::Pending), vec![0.1, 0.2])
            .await
            .expect("claim");
        assert!(matches!(first, ClaimOutcome::Claimed { replaced: None }));
        index
            .claim_entry(&namespace, record("b", EntryStatus::Ready), vec![0.1, 0.2])
            .await
            .expect("claim");

        // a second claim while the id is live loses
        let contested = index
            .claim_entry(&namespace, record("a", EntryStatus::Ready), vec![0.3, 0.4])
            .await
            .expect("claim");
        assert!(matches!(
            contested,
            ClaimOutcome::Occupied(existing) if existing.status == EntryStatus::Pending
        ));

        // an errored id is reclaimable and keeps its position
        index
            .set_status(&namespace, "a", EntryStatus::Error)
            .await
            .expect("set status");
        let reclaimed = index
            .claim_entry(&namespace, record("a", EntryStatus::Ready), vec![0.3, 0.4])
            .await
            .expect("claim");
        assert!(matches!(
            reclaimed,
            ClaimOutcome::Claimed { replaced: Some(old) } if old.status == EntryStatus::Error
        ));

        let page = index.list_page(&namespace, None, 10).await.expect("page");
        let ids: Vec<_> = page.entries.iter().map(|e| e.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(page.entries[0].status, EntryStatus::Ready);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let index = MemoryEntryIndex::new();
        let first = NamespaceId("kb_org-1".into());
        let second = NamespaceId("kb_org-2".into());
        index.ensure_namespace(&first, 2).await.expect("ensure");
        index.ensure_namespace(&second, 2).await.expect("ensure");
        index
            .claim_entry(&first, record("only-first", EntryStatus::Ready), vec![1.0, 0.0])
            .await
            .expect("claim");

        let page = index.list_page(&second, None, 10).await.expect("page");
        assert!(page.entries.is_empty());
        let results = index.query(&second, vec![1.0, 0.0], 5).await.expect("query");
        assert!(results.is_empty());
    }
}
