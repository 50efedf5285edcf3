pub const PENDING_RESULTS: &str = "pending_results";
pub const VOCABULARY: &str = "vocabulary";
pub const VOCABULARY_DUE_INDEX: &str = "vocabulary_due_index";
pub const CREDENTIALS: &str = "credentials";
pub const CONFIG_VERSIONS: &str = "config_versions";
