use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::drill::provider::CredentialSource;
use crate::store::keys;
use crate::store::{Store, StoreError};

/// Cookie string captured by the external login flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredential {
    pub user_id: String,
    pub cookies: String,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn set_credential(&self, user_id: &str, cookies: &str) -> Result<(), StoreError> {
        if cookies.trim().is_empty() {
            return Err(StoreError::Validation("cookies must not be empty".to_string()));
        }
        let key = keys::credential_key(user_id)?;
        let record = ProviderCredential {
            user_id: user_id.to_string(),
            cookies: cookies.trim().to_string(),
            updated_at: Utc::now(),
        };
        self.credentials
            .insert(key.as_bytes(), Self::serialize(&record)?)?;
        Ok(())
    }

    pub fn get_credential(&self, user_id: &str) -> Result<Option<ProviderCredential>, StoreError> {
        let key = keys::credential_key(user_id)?;
        match self.credentials.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn delete_credential(&self, user_id: &str) -> Result<bool, StoreError> {
        let key = keys::credential_key(user_id)?;
        Ok(self.credentials.remove(key.as_bytes())?.is_some())
    }
}

impl CredentialSource for Store {
    fn credential(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_credential(user_id)?.map(|c| c.cookies))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn credential_roundtrip_and_delete() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();

        assert!(store.credential("u1").unwrap().is_none());
        store.set_credential("u1", " _ym_uid=42; a=b ").unwrap();
        assert_eq!(store.credential("u1").unwrap().as_deref(), Some("_ym_uid=42; a=b"));
        assert!(store.delete_credential("u1").unwrap());
        assert!(store.credential("u1").unwrap().is_none());
        assert!(matches!(store.set_credential("u1", "  "), Err(StoreError::Validation(_))));
    }
}
