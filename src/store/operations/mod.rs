pub mod credentials;
pub mod pending_results;
pub mod vocabulary;
