use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use lingua_drill::config::{Config, ProviderConfig, TrainingConfig, WorkerConfig};
use lingua_drill::drill::{ResultCache, TrainingEngine};
use lingua_drill::routes::build_router;
use lingua_drill::state::AppState;
use lingua_drill::store::Store;

use super::fixtures::ScriptedProvider;

pub const TEST_TOKEN: &str = "integration-test-transport-token";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<Store>,
    pub engine: Arc<TrainingEngine>,
    pub provider: Arc<ScriptedProvider>,
    pub config: Config,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn auth_header(&self) -> (&'static str, String) {
        ("authorization", format!("Bearer {TEST_TOKEN}"))
    }
}

fn test_config(temp_dir: &TempDir) -> Config {
    let sled_path = temp_dir.path().join("drill-test.sled");
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        transport_token: TEST_TOKEN.to_string(),
        cors_origin: "*".to_string(),
        provider: ProviderConfig::default(),
        training: TrainingConfig::default(),
        worker: WorkerConfig {
            is_leader: false,
            enable_idle_sweep: false,
            enable_pending_audit: false,
        },
    }
}

pub fn open_store(temp_dir: &TempDir) -> Arc<Store> {
    let store = Arc::new(Store::open(&test_config(temp_dir).sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");
    store
}

/// Engine over a fresh store and a scripted provider, with an optional
/// replacement for the result cache.
pub fn engine_with_cache(
    store: Arc<Store>,
    provider: Arc<ScriptedProvider>,
    cache: Option<Arc<dyn ResultCache>>,
) -> Arc<TrainingEngine> {
    let cache = cache.unwrap_or_else(|| store.clone() as Arc<dyn ResultCache>);
    Arc::new(TrainingEngine::new(
        provider,
        cache,
        store,
        TrainingConfig::default(),
    ))
}

pub async fn spawn_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(&temp_dir);
    let store = open_store(&temp_dir);
    let provider = ScriptedProvider::new();
    let engine = engine_with_cache(store.clone(), provider.clone(), None);
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store.clone(), engine.clone(), &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        store,
        engine,
        provider,
        config,
        _temp_dir: temp_dir,
    }
}
