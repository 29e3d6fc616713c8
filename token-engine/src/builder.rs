use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::EngineError;
use crate::keys::KeyStore;
use crate::revocation::RevocationCache;
use crate::store::{AuthCodeStore, ClientStore, MemoryStore, TokenStore, UserStore};
use crate::{TokenEngine, TokenSettings};

/// Marker types to track whether the key store has been provided.
pub struct Missing;
pub struct Present;

/// A builder for assembling a [`TokenEngine`] from its collaborators.
/// The builder is generic over one type parameter:
/// - KeysSet: whether the key store has been supplied.
pub struct TokenEngineBuilder<KeysSet> {
    pub(crate) keys: Option<Arc<KeyStore>>,
    pub(crate) clients: Option<Arc<dyn ClientStore>>,
    pub(crate) users: Option<Arc<dyn UserStore>>,
    pub(crate) codes: Option<Arc<dyn AuthCodeStore>>,
    pub(crate) tokens: Option<Arc<dyn TokenStore>>,
    pub(crate) denylist: Option<Arc<dyn RevocationCache>>,
    pub(crate) settings: TokenSettings,
    _keys: PhantomData<KeysSet>,
}

impl TokenEngineBuilder<Missing> {
    /// Creates a new builder with no collaborators and default lifetimes.
    pub fn new() -> Self {
        Self {
            keys: None,
            clients: None,
            users: None,
            codes: None,
            tokens: None,
            denylist: None,
            settings: TokenSettings::default(),
            _keys: PhantomData,
        }
    }

    /// Sets the signing key store.
    pub fn with_key_store(self, keys: Arc<KeyStore>) -> TokenEngineBuilder<Present> {
        TokenEngineBuilder {
            keys: Some(keys),
            clients: self.clients,
            users: self.users,
            codes: self.codes,
            tokens: self.tokens,
            denylist: self.denylist,
            settings: self.settings,
            _keys: PhantomData,
        }
    }
}

impl Default for TokenEngineBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<KeysSet> TokenEngineBuilder<KeysSet> {
    pub fn with_client_store(mut self, store: Arc<dyn ClientStore>) -> Self {
        self.clients = Some(store);
        self
    }

    pub fn with_user_store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.users = Some(store);
        self
    }

    pub fn with_code_store(mut self, store: Arc<dyn AuthCodeStore>) -> Self {
        self.codes = Some(store);
        self
    }

    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }

    /// Uses one in-memory store for clients, users, codes and tokens.
    pub fn with_memory_store(self, store: MemoryStore) -> Self {
        let store = Arc::new(store);
        self.with_client_store(store.clone())
            .with_user_store(store.clone())
            .with_code_store(store.clone())
            .with_token_store(store)
    }

    /// Sets the denylist cache consulted by introspection and written by revocation.
    pub fn with_revocation_cache(mut self, cache: Arc<dyn RevocationCache>) -> Self {
        self.denylist = Some(cache);
        self
    }

    /// Overrides the token and code lifetimes.
    pub fn with_settings(mut self, settings: TokenSettings) -> Self {
        self.settings = settings;
        self
    }
}

// Only with a key store can the engine be built.
impl TokenEngineBuilder<Present> {
    /// Builds the engine, failing if a storage collaborator or the denylist is missing.
    pub fn build(self) -> Result<TokenEngine, EngineError> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T, EngineError> {
            value.ok_or_else(|| EngineError::Configuration(format!("{name} not provided")))
        }

        self.settings.validate()?;

        Ok(TokenEngine {
            keys: required(self.keys, "key store")?,
            clients: required(self.clients, "client store")?,
            users: required(self.users, "user store")?,
            codes: required(self.codes, "authorization code store")?,
            tokens: required(self.tokens, "token store")?,
            denylist: required(self.denylist, "revocation cache")?,
            settings: self.settings,
        })
    }
}
