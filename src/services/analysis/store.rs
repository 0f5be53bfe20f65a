// Analysis persistence
// Stored results are owned by one user and addressed by a numeric id.

use crate::models::AnalysisResult;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored analysis with id {0}")]
    NotFound(i64),

    #[error("{0}")]
    Other(String),
}

pub trait AnalysisStore: Send + Sync {
    /// Persist a result for `owner_id` and return its id.
    fn save(&self, result: &AnalysisResult, owner_id: &str) -> Result<i64, StoreError>;

    /// Fetch a stored result. Results owned by someone else read as not found.
    fn get(&self, id: i64, owner_id: &str) -> Result<AnalysisResult, StoreError>;

    /// Results owned by `owner_id`, newest first.
    fn list(&self, owner_id: &str) -> Result<Vec<AnalysisResult>, StoreError>;

    /// Save and return the result with its `stored_id` attached.
    fn persist(&self, result: AnalysisResult, owner_id: &str) -> Result<AnalysisResult, StoreError> {
        let id = self.save(&result, owner_id)?;
        Ok(result.with_stored_id(id))
    }
}

struct StoredAnalysis {
    id: i64,
    owner_id: String,
    result: AnalysisResult,
}

/// Process-local store. Ids start at 1.
#[derive(Default)]
pub struct MemoryAnalysisStore {
    rows: Mutex<Vec<StoredAnalysis>>,
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredAnalysis>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Other("analysis store lock poisoned".to_string()))
    }
}

impl AnalysisStore for MemoryAnalysisStore {
    fn save(&self, result: &AnalysisResult, owner_id: &str) -> Result<i64, StoreError> {
        let mut rows = self.rows()?;
        let id = rows.last().map(|r| r.id + 1).unwrap_or(1);
        rows.push(StoredAnalysis {
            id,
            owner_id: owner_id.to_string(),
            result: result.clone(),
        });
        Ok(id)
    }

    fn get(&self, id: i64, owner_id: &str) -> Result<AnalysisResult, StoreError> {
        self.rows()?
            .iter()
            .find(|r| r.id == id && r.owner_id == owner_id)
            .map(|r| r.result.clone().with_stored_id(r.id))
            .ok_or(StoreError::NotFound(id))
    }

    fn list(&self, owner_id: &str) -> Result<Vec<AnalysisResult>, StoreError> {
        Ok(self
            .rows()?
            .iter()
            .rev()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.result.clone().with_stored_id(r.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisHints;
    use crate::services::analysis::reconciler::reconcile;

    fn analysis(document_id: &str) -> AnalysisResult {
        let raw = format!("{{\"document_id\": \"{}\"}}", document_id);
        reconcile(&raw, &AnalysisHints::default())
    }

    #[test]
    fn test_persist_attaches_stored_id() {
        let store = MemoryAnalysisStore::new();
        let first = store.persist(analysis("d1"), "user-1").unwrap();
        let second = store.persist(analysis("d2"), "user-1").unwrap();
        assert_eq!(first.stored_id, Some(1));
        assert_eq!(second.stored_id, Some(2));

        let loaded = store.get(2, "user-1").unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_get_is_scoped_to_owner() {
        let store = MemoryAnalysisStore::new();
        let id = store.save(&analysis("d1"), "user-1").unwrap();
        assert!(matches!(store.get(id, "user-2"), Err(StoreError::NotFound(1))));
        assert!(matches!(store.get(99, "user-1"), Err(StoreError::NotFound(99))));
    }

    #[test]
    fn test_list_newest_first() {
        let store = MemoryAnalysisStore::new();
        store.save(&analysis("d1"), "user-1").unwrap();
        store.save(&analysis("other"), "user-2").unwrap();
        store.save(&analysis("d3"), "user-1").unwrap();

        let ids: Vec<_> = store
            .list("user-1")
            .unwrap()
            .into_iter()
            .map(|r| (r.document_id, r.stored_id))
            .collect();
        assert_eq!(ids, vec![("d3".to_string(), Some(3)), ("d1".to_string(), Some(1))]);
    }
}
