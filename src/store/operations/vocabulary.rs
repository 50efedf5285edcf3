use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};

use crate::drill::schedule::ReviewSchedule;
use crate::store::keys;
use crate::store::{Store, StoreError};

/// A dictionary word kept locally for reverse-direction training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub user_id: String,
    pub word_id: String,
    pub word: String,
    pub translation: String,
    pub schedule: ReviewSchedule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn due_key_for(entry: &VocabularyEntry) -> Result<String, StoreError> {
    keys::vocabulary_due_key(
        &entry.user_id,
        entry.schedule.next_review_at.timestamp_millis(),
        &entry.word_id,
    )
}

impl Store {
    pub fn get_vocabulary(
        &self,
        user_id: &str,
        word_id: &str,
    ) -> Result<Option<VocabularyEntry>, StoreError> {
        let key = keys::vocabulary_key(user_id, word_id)?;
        match self.vocabulary.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Writes the entry and moves its due-index key in one transaction.
    pub fn set_vocabulary_entry(&self, entry: &VocabularyEntry) -> Result<(), StoreError> {
        let key = keys::vocabulary_key(&entry.user_id, &entry.word_id)?;
        let value = Self::serialize(entry)?;
        let due_key = due_key_for(entry)?;

        (&self.vocabulary, &self.vocabulary_due_index)
            .transaction(|(tx_vocab, tx_due)| {
                if let Some(old_raw) = tx_vocab.get(key.as_bytes())? {
                    let old: VocabularyEntry = serde_json::from_slice(&old_raw).map_err(|e| {
                        ConflictableTransactionError::Abort(StoreError::Serialization(e))
                    })?;
                    let old_due = due_key_for(&old).map_err(ConflictableTransactionError::Abort)?;
                    tx_due.remove(old_due.as_bytes())?;
                }
                tx_vocab.insert(key.as_bytes(), value.as_slice())?;
                tx_due.insert(due_key.as_bytes(), &[])?;
                Ok(())
            })
            .map_err(|error: TransactionError<StoreError>| match error {
                TransactionError::Abort(store_error) => store_error,
                TransactionError::Storage(storage_error) => StoreError::Sled(storage_error),
            })?;

        Ok(())
    }

    /// Inserts a new word with a fresh schedule, or refreshes the texts of an
    /// existing one. Returns `true` when the word was new.
    pub fn upsert_vocabulary(
        &self,
        user_id: &str,
        word_id: &str,
        word: &str,
        translation: &str,
        default_ease: f64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        match self.get_vocabulary(user_id, word_id)? {
            Some(mut existing) => {
                if existing.word != word || existing.translation != translation {
                    existing.word = word.to_string();
                    existing.translation = translation.to_string();
                    existing.updated_at = now;
                    self.set_vocabulary_entry(&existing)?;
                }
                Ok(false)
            }
            None => {
                let entry = VocabularyEntry {
                    user_id: user_id.to_string(),
                    word_id: word_id.to_string(),
                    word: word.to_string(),
                    translation: translation.to_string(),
                    schedule: ReviewSchedule::new_word(default_ease, now),
                    created_at: now,
                    updated_at: now,
                };
                self.set_vocabulary_entry(&entry)?;
                Ok(true)
            }
        }
    }

    /// Applies one outcome to the stored schedule. `None` if the word is gone.
    pub fn reschedule_vocabulary(
        &self,
        user_id: &str,
        word_id: &str,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewSchedule>, StoreError> {
        let Some(mut entry) = self.get_vocabulary(user_id, word_id)? else {
            return Ok(None);
        };
        entry.schedule = entry.schedule.update(correct, now);
        entry.updated_at = now;
        self.set_vocabulary_entry(&entry)?;
        Ok(Some(entry.schedule))
    }

    /// Due words in ascending due order, at most `limit`.
    pub fn due_vocabulary(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<VocabularyEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let prefix = keys::vocabulary_due_prefix(user_id)?;
        let now_ms = now.timestamp_millis().max(0);
        let mut due = Vec::with_capacity(limit);
        let mut seen = HashSet::new();

        for item in self.vocabulary_due_index.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let Some((due_ms, word_id)) = keys::parse_vocabulary_due_key(&key) else {
                continue;
            };
            if due_ms > now_ms {
                break;
            }
            if let Some(entry) = self.get_vocabulary(user_id, &word_id)? {
                let entry_due = entry.schedule.next_review_at.timestamp_millis().max(0);
                if entry_due == due_ms && seen.insert(word_id) {
                    due.push(entry);
                    if due.len() >= limit {
                        break;
                    }
                }
            }
        }

        Ok(due)
    }

    pub fn count_due_vocabulary(&self, user_id: &str, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let prefix = keys::vocabulary_due_prefix(user_id)?;
        let now_ms = now.timestamp_millis().max(0);
        let mut count = 0;
        for item in self.vocabulary_due_index.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            match keys::parse_vocabulary_due_key(&key) {
                Some((due_ms, _)) if due_ms <= now_ms => count += 1,
                Some(_) => break,
                None => continue,
            }
        }
        Ok(count)
    }

    pub fn list_vocabulary(&self, user_id: &str) -> Result<Vec<VocabularyEntry>, StoreError> {
        let prefix = keys::vocabulary_prefix(user_id)?;
        let mut entries = Vec::new();
        for item in self.vocabulary.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            entries.push(Self::deserialize(&value)?);
        }
        Ok(entries)
    }
}
