use crate::constants::MAX_CAS_RETRIES;
use crate::drill::cache::ResultCache;
use crate::drill::types::{OutcomeCode, PendingResults};
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn load_pending_results(&self, user_id: &str) -> Result<PendingResults, StoreError> {
        let key = keys::pending_results_key(user_id)?;
        match self.pending_results.get(key.as_bytes())? {
            Some(raw) => Self::deserialize(&raw),
            None => Ok(PendingResults::new()),
        }
    }

    /// Read-modify-write of one user's pending map under compare-and-swap,
    /// flushed before returning. `mutate` returns `None` to delete the key.
    fn update_pending_results<F>(&self, user_id: &str, mut mutate: F) -> Result<bool, StoreError>
    where
        F: FnMut(PendingResults) -> Option<PendingResults>,
    {
        let key = keys::pending_results_key(user_id)?;

        for _ in 0..MAX_CAS_RETRIES {
            let current = self.pending_results.get(key.as_bytes())?;
            let existing: PendingResults = match &current {
                Some(raw) => Self::deserialize(raw)?,
                None => PendingResults::new(),
            };
            let had_data = !existing.is_empty();

            let next = match mutate(existing) {
                Some(map) if !map.is_empty() => Some(Self::serialize(&map)?),
                _ => None,
            };

            if current.is_none() && next.is_none() {
                return Ok(had_data);
            }

            let swapped = self
                .pending_results
                .compare_and_swap(key.as_bytes(), current, next)?;
            if swapped.is_ok() {
                self.pending_results.flush()?;
                return Ok(had_data);
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: "pending_results".to_string(),
            key,
            attempts: MAX_CAS_RETRIES,
        })
    }

    pub fn record_pending_outcome(
        &self,
        user_id: &str,
        word_id: &str,
        outcome: OutcomeCode,
    ) -> Result<(), StoreError> {
        self.update_pending_results(user_id, |mut map| {
            map.insert(word_id.to_string(), outcome);
            Some(map)
        })?;
        Ok(())
    }

    /// Removes only entries whose id and outcome match `submitted`.
    pub fn clear_submitted_results(
        &self,
        user_id: &str,
        submitted: &PendingResults,
    ) -> Result<bool, StoreError> {
        self.update_pending_results(user_id, |mut map| {
            map.retain(|word_id, outcome| submitted.get(word_id) != Some(&*outcome));
            Some(map)
        })
    }

    pub fn list_pending_users(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let mut users = Vec::new();
        for item in self.pending_results.iter() {
            let (key, value) = item?;
            let map: PendingResults = Self::deserialize(&value)?;
            if !map.is_empty() {
                users.push((String::from_utf8_lossy(&key).into_owned(), map.len()));
            }
        }
        Ok(users)
    }
}

impl ResultCache for Store {
    fn load(&self, user_id: &str) -> Result<PendingResults, StoreError> {
        self.load_pending_results(user_id)
    }

    fn persist_outcome(
        &self,
        user_id: &str,
        word_id: &str,
        outcome: OutcomeCode,
    ) -> Result<(), StoreError> {
        self.record_pending_outcome(user_id, word_id, outcome)
    }

    fn clear_submitted(
        &self,
        user_id: &str,
        submitted: &PendingResults,
    ) -> Result<bool, StoreError> {
        self.clear_submitted_results(user_id, submitted)
    }

    fn pending_users(&self) -> Result<Vec<(String, usize)>, StoreError> {
        self.list_pending_users()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        (dir, store)
    }

    #[test]
    fn outcomes_accumulate_per_user() {
        let (_dir, store) = store();
        store.record_pending_outcome("u1", "10", OutcomeCode::Correct).unwrap();
        store.record_pending_outcome("u1", "11", OutcomeCode::Incorrect).unwrap();
        store.record_pending_outcome("u2", "10", OutcomeCode::Incorrect).unwrap();

        let u1 = store.load_pending_results("u1").unwrap();
        assert_eq!(u1.len(), 2);
        assert_eq!(u1["11"], OutcomeCode::Incorrect);
        assert_eq!(store.load_pending_results("u2").unwrap().len(), 1);
        assert!(store.load_pending_results("u3").unwrap().is_empty());
    }

    #[test]
    fn clear_reports_previous_state() {
        let (_dir, store) = store();
        let empty = PendingResults::new();
        assert!(!store.clear_submitted_results("u1", &empty).unwrap());

        store.record_pending_outcome("u1", "10", OutcomeCode::Correct).unwrap();
        let snapshot = store.load_pending_results("u1").unwrap();
        assert!(store.clear_submitted_results("u1", &snapshot).unwrap());
        assert!(store.load_pending_results("u1").unwrap().is_empty());
    }

    #[test]
    fn clear_keeps_entries_not_in_snapshot() {
        let (_dir, store) = store();
        store.record_pending_outcome("u1", "10", OutcomeCode::Correct).unwrap();
        let snapshot = store.load_pending_results("u1").unwrap();

        store.record_pending_outcome("u1", "11", OutcomeCode::Correct).unwrap();
        store.record_pending_outcome("u1", "10", OutcomeCode::Incorrect).unwrap();

        store.clear_submitted_results("u1", &snapshot).unwrap();
        let left = store.load_pending_results("u1").unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left["10"], OutcomeCode::Incorrect);
    }

    #[test]
    fn pending_users_lists_non_empty_maps() {
        let (_dir, store) = store();
        store.record_pending_outcome("u1", "10", OutcomeCode::Correct).unwrap();
        store.record_pending_outcome("u2", "1", OutcomeCode::Correct).unwrap();
        store.record_pending_outcome("u2", "2", OutcomeCode::Incorrect).unwrap();

        let mut users = store.list_pending_users().unwrap();
        users.sort();
        assert_eq!(users, vec![("u1".to_string(), 1), ("u2".to_string(), 2)]);
    }

    #[test]
    fn results_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = Store::open(path.to_str().unwrap()).unwrap();
            store.record_pending_outcome("u1", "10", OutcomeCode::Correct).unwrap();
        }
        let store = Store::open(path.to_str().unwrap()).unwrap();
        assert_eq!(store.load_pending_results("u1").unwrap().len(), 1);
    }
}
