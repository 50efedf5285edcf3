use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

use crate::drill::schedule::{DEFAULT_EASE_FACTOR, MIN_EASE_FACTOR};

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub transport_token: String,
    pub cors_origin: String,
    pub provider: ProviderConfig,
    pub training: TrainingConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    /// Word set the repetition results are written to.
    pub word_set_id: u32,
    /// Word set training words and the export are read from.
    pub dictionary_word_set_id: u32,
    pub fetch_limit: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.lingualeo.com".to_string(),
            timeout_secs: 30,
            word_set_id: 0,
            dictionary_word_set_id: 1,
            fetch_limit: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub local_batch: usize,
    pub dictionary_batch: usize,
    pub idle_timeout_secs: u64,
    pub default_ease: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            local_batch: 10,
            dictionary_batch: 10,
            idle_timeout_secs: 1800,
            default_ease: DEFAULT_EASE_FACTOR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub enable_idle_sweep: bool,
    pub enable_pending_audit: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("transport_token", &"***REDACTED***")
            .field("cors_origin", &self.cors_origin)
            .field("provider", &self.provider)
            .field("training", &self.training)
            .field("worker", &self.worker)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        let provider_defaults = ProviderConfig::default();
        let training_defaults = TrainingConfig::default();

        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/lingua-drill.sled"),
            transport_token: env_or(
                "TRANSPORT_TOKEN",
                "change_me_to_a_long_random_transport_token",
            ),
            cors_origin: env_or("CORS_ORIGIN", "*"),
            provider: ProviderConfig {
                api_url: env_or("PROVIDER_API_URL", &provider_defaults.api_url),
                timeout_secs: env_or_parse("PROVIDER_TIMEOUT_SECS", provider_defaults.timeout_secs),
                word_set_id: env_or_parse("PROVIDER_WORD_SET_ID", provider_defaults.word_set_id),
                dictionary_word_set_id: env_or_parse(
                    "PROVIDER_DICTIONARY_SET_ID",
                    provider_defaults.dictionary_word_set_id,
                ),
                fetch_limit: env_or_parse("PROVIDER_FETCH_LIMIT", provider_defaults.fetch_limit),
            },
            training: TrainingConfig {
                local_batch: env_or_parse("TRAINING_LOCAL_BATCH", training_defaults.local_batch),
                dictionary_batch: env_or_parse(
                    "TRAINING_DICTIONARY_BATCH",
                    training_defaults.dictionary_batch,
                ),
                idle_timeout_secs: env_or_parse(
                    "TRAINING_IDLE_TIMEOUT_SECS",
                    training_defaults.idle_timeout_secs,
                ),
                default_ease: env_or_parse("TRAINING_DEFAULT_EASE", training_defaults.default_ease)
                    .max(MIN_EASE_FACTOR),
            },
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                enable_idle_sweep: env_or_bool("ENABLE_IDLE_SWEEP_WORKER", true),
                enable_pending_audit: env_or_bool("ENABLE_PENDING_AUDIT_WORKER", true),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
