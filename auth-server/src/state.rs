use crate::{
    cache::{create_cache, Cache, CacheError},
    config::{keys::KeyConfigError, AuthConfig},
    seed::{SeedDocument, SeedError},
};
use log::info;
use std::sync::Arc;
use thiserror::Error;
use token_engine::store::MemoryStore;
use token_engine::{EngineError, KeyStore, TokenEngine};

/// Failures that keep the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to initialize cache: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to load signing keys: {0}")]
    Keys(#[from] KeyConfigError),

    #[error("Failed to seed the store: {0}")]
    Seed(#[from] SeedError),

    #[error("Failed to build the token engine: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AuthConfig>,
    pub cache: Arc<Cache>,
    pub engine: TokenEngine,
}

impl AppState {
    /// Wires the engine from the configuration: cache backend, signing keys
    /// and the (optionally seeded) in-memory store.
    pub async fn new(settings: AuthConfig) -> Result<Self, StartupError> {
        let cache = create_cache(&settings).await?;
        info!("Using '{}' denylist cache", cache.kind());

        let keys = settings.keys.key_store(&settings.oauth.issuer)?;

        let store = MemoryStore::new();
        if let Some(path) = &settings.seed_file {
            info!("Seeding store from {}", path.display());
            SeedDocument::from_file(path)?.apply(&store).await?;
        }

        Self::with_parts(settings, cache, keys, store)
    }

    /// Assembles the state from already-built collaborators.
    pub fn with_parts(
        settings: AuthConfig,
        cache: Cache,
        keys: KeyStore,
        store: MemoryStore,
    ) -> Result<Self, StartupError> {
        let cache = Arc::new(cache);
        let engine = TokenEngine::builder()
            .with_key_store(Arc::new(keys))
            .with_memory_store(store)
            .with_revocation_cache(cache.clone())
            .with_settings(settings.oauth.token_settings())
            .build()?;

        Ok(Self {
            settings: Arc::new(settings),
            cache,
            engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::null::NullCache;
    use crate::config::CacheStore;
    use crate::test_utils::test_key_store;

    #[tokio::test]
    async fn test_app_state_new_with_seed_file() {
        let dir = std::env::temp_dir().join(format!("auth-state-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let seed = dir.join("seed.json");
        std::fs::write(
            &seed,
            r#"{ "clients": [ { "client_id": "svc", "secret": "pw", "tenant_id": "T1" } ] }"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("k1.pem"),
            include_str!("../../token-engine/tests/fixtures/signing-k1.pem"),
        )
        .unwrap();

        let mut settings = AuthConfig::for_test();
        settings.cache.store = CacheStore::InMemory;
        settings.seed_file = Some(seed);
        settings.keys.dir = Some(dir.clone());
        settings.keys.active_kid = Some("k1".to_string());

        let state = AppState::new(settings).await.unwrap();
        assert_eq!(state.cache.kind(), "in-memory");
        assert_eq!(state.engine.key_store().active_kid(), "k1");
        assert!(state.engine.authenticate_client("svc", Some("pw")).await.is_ok());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_key_directory_fails_startup() {
        let mut settings = AuthConfig::for_test();
        settings.keys.dir = Some("/nonexistent".into());
        settings.keys.active_kid = Some("k1".to_string());

        assert!(matches!(
            AppState::new(settings).await,
            Err(StartupError::Keys(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_seed_file_fails_startup() {
        let dir = std::env::temp_dir().join(format!("auth-state-seed-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("k1.pem"),
            include_str!("../../token-engine/tests/fixtures/signing-k1.pem"),
        )
        .unwrap();

        let mut settings = AuthConfig::for_test();
        settings.seed_file = Some(dir.join("missing.json"));
        settings.keys.dir = Some(dir.clone());
        settings.keys.active_kid = Some("k1".to_string());

        assert!(matches!(
            AppState::new(settings).await,
            Err(StartupError::Seed(SeedError::Io(_)))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_app_state_clone() {
        let state = AppState::with_parts(
            AuthConfig::for_test(),
            Cache::Null(NullCache),
            test_key_store(),
            MemoryStore::new(),
        )
        .unwrap();
        let state2 = state.clone();

        // After cloning, both instances should point to the same data
        assert_eq!(Arc::as_ptr(&state.settings), Arc::as_ptr(&state2.settings));
        assert_eq!(Arc::as_ptr(&state.cache), Arc::as_ptr(&state2.cache));
        assert!(Arc::ptr_eq(state.engine.key_store(), state2.engine.key_store()));
    }

    #[test]
    fn test_lifetimes_come_from_settings() {
        let mut settings = AuthConfig::for_test();
        settings.oauth.access_token_ttl = 60;
        let state = AppState::with_parts(
            settings,
            Cache::Null(NullCache),
            test_key_store(),
            MemoryStore::new(),
        )
        .unwrap();

        assert_eq!(state.engine.settings().access_ttl.as_secs(), 60);
    }

    #[test]
    fn test_out_of_range_lifetimes_fail_startup() {
        for (access, code) in [(u64::MAX, 600), (900, 0)] {
            let mut settings = AuthConfig::for_test();
            settings.oauth.access_token_ttl = access;
            settings.oauth.auth_code_ttl = code;
            let result = AppState::with_parts(
                settings,
                Cache::Null(NullCache),
                test_key_store(),
                MemoryStore::new(),
            );
            assert!(matches!(
                result,
                Err(StartupError::Engine(EngineError::Configuration(_)))
            ));
        }
    }
}
