use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{DocumentPatch, MetadataStore, StoreError, TransitionResult};
use crate::document::{DocumentId, DocumentRecord};
use crate::summary::SummaryStatus;

#[derive(Default)]
struct Inner {
    records: HashMap<DocumentId, (u64, DocumentRecord)>,
    next_seq: u64,
}

/// In-process store. Every write holds the one write lock, so patches are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl MetadataStore for MemoryStore {
    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let seq = match inner.records.get(&record.id) {
            Some((seq, _)) => *seq,
            None => {
                inner.next_seq += 1;
                inner.next_seq
            }
        };
        inner.records.insert(record.id.clone(), (seq, record.clone()));
        Ok(())
    }

    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.read()?.records.get(id).map(|(_, r)| r.clone()))
    }

    fn update_fields(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.records.get_mut(id) {
            Some((_, record)) => {
                patch.apply(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn transition(
        &self,
        id: &DocumentId,
        from: &[SummaryStatus],
        patch: &DocumentPatch,
    ) -> Result<TransitionResult, StoreError> {
        let mut inner = self.write()?;
        let Some((_, record)) = inner.records.get_mut(id) else {
            return Ok(TransitionResult::Missing);
        };

        if !from.contains(&record.summary_status) {
            return Ok(TransitionResult::Rejected(record.summary_status));
        }

        patch.apply(record);
        Ok(TransitionResult::Applied)
    }

    fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        Ok(self.write()?.records.remove(id).is_some())
    }

    fn list_ids_by_recency(&self) -> Result<Vec<DocumentId>, StoreError> {
        let inner = self.read()?;
        let mut entries: Vec<_> = inner
            .records
            .values()
            .map(|(seq, r)| (r.upload_date, *seq, r.id.clone()))
            .collect();
        entries.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        Ok(entries.into_iter().map(|(_, _, id)| id).collect())
    }

    fn ids_with_status(&self, status: SummaryStatus) -> Result<Vec<DocumentId>, StoreError> {
        let inner = self.read()?;
        let mut entries: Vec<_> = inner
            .records
            .values()
            .filter(|(_, r)| r.summary_status == status)
            .map(|(seq, r)| (r.upload_date, *seq, r.id.clone()))
            .collect();
        entries.sort_by_key(|(date, seq, _)| (*date, *seq));
        Ok(entries.into_iter().map(|(_, _, id)| id).collect())
    }
}
