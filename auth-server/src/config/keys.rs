use confique::Config;
use log::{info, warn};
use std::path::PathBuf;
use thiserror::Error;
use token_engine::{KeyError, KeyPair, KeyStore};

/// Key id of the key generated when no key directory is configured.
pub const EPHEMERAL_KID: &str = "ephemeral";
const EPHEMERAL_KEY_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum KeyConfigError {
    #[error("AUTH_KEYS_ACTIVE_KID must be set when AUTH_KEYS_DIR is configured")]
    MissingActiveKid,

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Signing key configuration
#[derive(Debug, Config, Clone)]
pub struct KeysConfig {
    /// Directory of `<kid>.pem` RSA private keys (PKCS#1 or PKCS#8)
    #[config(env = "AUTH_KEYS_DIR")]
    pub dir: Option<PathBuf>,

    /// Key id used for signing; must name one of the keys in `dir`
    #[config(env = "AUTH_KEYS_ACTIVE_KID")]
    pub active_kid: Option<String>,
}

impl KeysConfig {
    /// Builds the key store. Without a key directory a single throwaway key is
    /// generated, so tokens do not survive a restart.
    pub fn key_store(&self, issuer: &str) -> Result<KeyStore, KeyConfigError> {
        let Some(dir) = &self.dir else {
            warn!(
                "No signing key directory configured, generating an ephemeral {}-bit key",
                EPHEMERAL_KEY_BITS
            );
            let pair = KeyPair::generate(EPHEMERAL_KID, EPHEMERAL_KEY_BITS)?;
            return Ok(KeyStore::new(issuer, vec![pair], EPHEMERAL_KID)?);
        };

        let active_kid = self
            .active_kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(KeyConfigError::MissingActiveKid)?;
        let store = KeyStore::load_dir(issuer, dir, active_kid)?;
        info!(
            "Loaded signing keys {:?} from {}, active key '{}'",
            store.kids(),
            dir.display(),
            active_kid
        );
        Ok(store)
    }
}
