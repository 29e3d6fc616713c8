pub(crate) use crate::config::cache::{CacheConfig, CacheStore};
pub(crate) use crate::config::keys::KeysConfig;
pub(crate) use crate::config::oauth::OAuthConfig;
use confique::Config;
use std::path::PathBuf;

pub mod cache;
pub mod keys;
pub mod oauth;

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_FILE_ENV: &str = "AUTH_CONFIG_FILE";

/// Main configuration structure for the authorization server
#[derive(Debug, Config, Clone)]
pub struct AuthConfig {
    /// The port the server will listen to (default: 8080)
    #[config(env = "AUTH_PORT", default = 8080)]
    pub port: u16,

    /// Timeout in seconds for each component health check (default: 3)
    #[config(env = "AUTH_HEALTHCHECK_TIMEOUT", default = 3.0)]
    pub healthcheck_timeout: f64,

    /// JSON file with clients and users loaded into the in-memory store at startup
    #[config(env = "AUTH_SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Token issuance configuration
    #[config(nested)]
    pub oauth: OAuthConfig,

    /// Signing key configuration
    #[config(nested)]
    pub keys: KeysConfig,

    /// Denylist cache configuration
    #[config(nested)]
    pub cache: CacheConfig,
}

impl AuthConfig {
    /// Loads the configuration from the environment, falling back to the file
    /// named by `AUTH_CONFIG_FILE` and then to the defaults.
    pub fn new() -> Result<Self, confique::Error> {
        let mut builder = Self::builder().env();
        if let Some(path) = std::env::var_os(CONFIG_FILE_ENV) {
            builder = builder.file(PathBuf::from(path));
        }
        builder.load()
    }

    /// Defaults only, with the denylist disabled and an ephemeral key.
    #[cfg(test)]
    pub fn for_test() -> Self {
        let mut config = Self::builder()
            .load()
            .expect("defaults must form a valid configuration");
        config.port = 0;
        config.cache.store = CacheStore::None;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confique::toml::FormatOptions;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::builder().load().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.healthcheck_timeout, 3.0);
        assert_eq!(config.seed_file, None);
        assert_eq!(config.oauth.issuer, "auth-service");
        assert_eq!(config.oauth.access_token_ttl, 900);
        assert_eq!(config.oauth.refresh_token_ttl, 2_592_000);
        assert_eq!(config.oauth.auth_code_ttl, 600);
        assert_eq!(config.keys.dir, None);
        assert_eq!(config.keys.active_kid, None);
        assert_eq!(config.cache.store, CacheStore::InMemory);
        assert_eq!(config.cache.memory.capacity, 128);
        assert_eq!(config.cache.redis.url, "");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("auth-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("auth.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
port = 9090

[oauth]
issuer = "https://auth.example.com"
access_token_ttl = 300

[cache]
store = "redis"

[cache.redis]
url = "redis://localhost:6379"
"#
        )
        .unwrap();

        let config = AuthConfig::builder().file(&path).load().unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.oauth.issuer, "https://auth.example.com");
        assert_eq!(config.oauth.access_token_ttl, 300);
        assert_eq!(config.oauth.refresh_token_ttl, 2_592_000);
        assert_eq!(config.cache.store, CacheStore::Redis);
        assert_eq!(config.cache.redis.url, "redis://localhost:6379");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unknown_cache_store_is_rejected() {
        let dir = std::env::temp_dir().join(format!("auth-config-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("auth.toml");
        std::fs::write(&path, "[cache]\nstore = \"memcached\"\n").unwrap();

        assert!(AuthConfig::builder().file(&path).load().is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_template_lists_every_section() {
        let template = confique::toml::template::<AuthConfig>(FormatOptions::default());
        assert!(template.contains("[oauth]"));
        assert!(template.contains("[keys]"));
        assert!(template.contains("[cache.redis]"));
        assert!(template.contains("AUTH_OAUTH_ISSUER"));
    }

    #[test]
    fn test_for_test_disables_cache() {
        let config = AuthConfig::for_test();
        assert_eq!(config.port, 0);
        assert_eq!(config.cache.store, CacheStore::None);
    }
}
