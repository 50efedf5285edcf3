use crate::store::StoreError;

fn validate_segment(field: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    if value.contains(':') {
        return Err(StoreError::Validation(format!(
            "{field} must not contain ':'"
        )));
    }
    Ok(())
}

pub fn pending_results_key(user_id: &str) -> Result<String, StoreError> {
    validate_segment("user_id", user_id)?;
    Ok(user_id.to_string())
}

pub fn credential_key(user_id: &str) -> Result<String, StoreError> {
    validate_segment("user_id", user_id)?;
    Ok(user_id.to_string())
}

pub fn vocabulary_key(user_id: &str, word_id: &str) -> Result<String, StoreError> {
    validate_segment("user_id", user_id)?;
    validate_segment("word_id", word_id)?;
    Ok(format!("{}:{}", user_id, word_id))
}

pub fn vocabulary_prefix(user_id: &str) -> Result<String, StoreError> {
    validate_segment("user_id", user_id)?;
    Ok(format!("{}:", user_id))
}

/// `user:{due_ms:020}:word`, so a prefix scan yields words in due order.
pub fn vocabulary_due_key(user_id: &str, due_ts_ms: i64, word_id: &str) -> Result<String, StoreError> {
    validate_segment("user_id", user_id)?;
    validate_segment("word_id", word_id)?;
    Ok(format!("{}:{:020}:{}", user_id, due_ts_ms.max(0) as u64, word_id))
}

pub fn vocabulary_due_prefix(user_id: &str) -> Result<String, StoreError> {
    vocabulary_prefix(user_id)
}

pub fn parse_vocabulary_due_key(key: &[u8]) -> Option<(i64, String)> {
    let text = std::str::from_utf8(key).ok()?;
    let mut parts = text.splitn(3, ':');
    let _user = parts.next()?;
    let ts = parts.next()?.parse::<u64>().ok()?;
    let word_id = parts.next()?;
    if word_id.is_empty() {
        return None;
    }
    Some((i64::try_from(ts).ok()?, word_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_keys_sort_by_time() {
        let a = vocabulary_due_key("u1", 5, "w9").unwrap();
        let b = vocabulary_due_key("u1", 40, "w1").unwrap();
        assert!(a < b);
        assert_eq!(parse_vocabulary_due_key(b.as_bytes()), Some((40, "w1".to_string())));
    }

    #[test]
    fn separators_are_rejected() {
        assert!(vocabulary_key("u:1", "w").is_err());
        assert!(pending_results_key("").is_err());
    }
}
