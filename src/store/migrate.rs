use crate::drill::schedule::MIN_EASE_FACTOR;
use crate::store::operations::vocabulary::VocabularyEntry;
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_vocabulary_ease_floor", m002_vocabulary_ease_floor),
    ]
}

/// Applies pending migrations in order.
///
/// Each migration must be idempotent: the process can die after a migration
/// ran but before its version was recorded. Versions only move forward.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    let all = migrations();

    for (index, (name, func)) in all.iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.config_versions.get(VERSION_KEY.as_bytes())? {
        Some(raw) if raw.len() == 4 => {
            let bytes: [u8; 4] = raw.as_ref().try_into().unwrap_or([0; 4]);
            Ok(u32::from_be_bytes(bytes))
        }
        Some(raw) => Ok(String::from_utf8_lossy(&raw).parse::<u32>().unwrap_or(0)),
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .config_versions
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Clamps every stored ease factor to at least `MIN_EASE_FACTOR`; non-finite
/// values are reset to the floor.
fn m002_vocabulary_ease_floor(store: &Store) -> Result<(), StoreError> {
    let mut fixed = 0usize;
    for item in store.vocabulary.iter() {
        let (_, value) = item?;
        let mut entry: VocabularyEntry = Store::deserialize(&value)?;
        if entry.schedule.ease_factor < MIN_EASE_FACTOR || !entry.schedule.ease_factor.is_finite() {
            entry.schedule.ease_factor = MIN_EASE_FACTOR;
            store.set_vocabulary_entry(&entry)?;
            fixed += 1;
        }
    }
    if fixed > 0 {
        tracing::info!(fixed, "Clamped vocabulary ease factors");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::*;
    use crate::drill::schedule::ReviewSchedule;

    #[test]
    fn migration_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        run(&store).unwrap();
        let first = get_current_version(&store).unwrap();
        run(&store).unwrap();
        let second = get_current_version(&store).unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 2);
    }

    #[test]
    fn downgrade_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db2");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        set_version(&store, 3).unwrap();
        let err = set_version(&store, 2).unwrap_err();
        assert!(matches!(err, StoreError::Migration { .. }));
    }

    #[test]
    fn ease_below_floor_is_clamped() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db3").to_str().unwrap()).unwrap();
        let now = Utc::now();
        let mut schedule = ReviewSchedule::new_word(2.5, now);
        schedule.ease_factor = 0.9;
        store
            .set_vocabulary_entry(&VocabularyEntry {
                user_id: "u1".into(),
                word_id: "1".into(),
                word: "cat".into(),
                translation: "кот".into(),
                schedule,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        run(&store).unwrap();
        let entry = store.get_vocabulary("u1", "1").unwrap().unwrap();
        assert!((entry.schedule.ease_factor - MIN_EASE_FACTOR).abs() < 1e-9);
    }
}
