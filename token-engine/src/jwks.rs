//! Verifier-side cache of the published key set.

use crate::error::JwksError;
use crate::keys::JwkSet;
use crate::models::{CallerContext, TokenClaims};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use url::Url;

#[derive(Default)]
struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
    /// Bumped on every successful refresh
    generation: u64,
}

impl CachedKeys {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
    }
}

/// Caches public keys by `kid` and refreshes them from the JWKS endpoint on a
/// miss or once the TTL has passed.
///
/// Refreshes are serialized. A caller that waited for someone else's refresh
/// answers from that refresh instead of fetching again.
pub struct JwksCache {
    url: Url,
    ttl: Duration,
    client: reqwest::Client,
    cache: RwLock<CachedKeys>,
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    pub fn new(url: Url, ttl: Duration) -> Self {
        Self::with_client(url, ttl, reqwest::Client::new())
    }

    pub fn with_client(url: Url, ttl: Duration, client: reqwest::Client) -> Self {
        Self {
            url,
            ttl,
            client,
            cache: RwLock::new(CachedKeys::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Public key for `kid`, refreshing the key set when needed.
    pub async fn key_for_kid(&self, kid: &str) -> Result<DecodingKey, JwksError> {
        let seen_generation = {
            let cache = self.cache.read().await;
            if cache.is_fresh(self.ttl) {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
            cache.generation
        };

        let _refresh = self.refresh_lock.lock().await;

        // Someone refreshed while we waited for the lock
        {
            let cache = self.cache.read().await;
            if cache.generation != seen_generation {
                return cache
                    .keys
                    .get(kid)
                    .cloned()
                    .ok_or_else(|| JwksError::NotFound(kid.to_string()));
            }
        }

        let keys = self.fetch().await?;
        let mut cache = self.cache.write().await;
        let generation = cache.generation + 1;
        *cache = CachedKeys {
            keys,
            fetched_at: Some(Instant::now()),
            generation,
        };
        info!(
            "Refreshed key set from {} ({} keys)",
            self.url,
            cache.keys.len()
        );
        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| JwksError::NotFound(kid.to_string()))
    }

    async fn fetch(&self) -> Result<HashMap<String, DecodingKey>, JwksError> {
        debug!("Fetching key set from {}", self.url);
        let response = self.client.get(self.url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(JwksError::Status(response.status().as_u16()));
        }
        let set: JwkSet = response.json().await?;

        let mut keys = HashMap::with_capacity(set.keys.len());
        for jwk in set.keys {
            if jwk.kty != "RSA" || jwk.kid.is_empty() {
                debug!("Skipping non-RSA or unnamed key '{}'", jwk.kid);
                continue;
            }
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => warn!("Ignoring invalid key '{}': {}", jwk.kid, e),
            }
        }
        Ok(keys)
    }

    /// Verifies an RS256 token issued by `issuer` against the cached keys.
    pub async fn verify(&self, token: &str, issuer: &str) -> Result<TokenClaims, JwksError> {
        let header = jsonwebtoken::decode_header(token)?;
        let kid = header.kid.ok_or(JwksError::MissingKid)?;
        let key = self.key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.validate_aud = false;

        let mut claims = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)?.claims;
        claims.kid = kid;
        Ok(claims)
    }

    /// Caller identity carried by a verified bearer token.
    pub async fn caller_context(
        &self,
        token: &str,
        issuer: &str,
    ) -> Result<CallerContext, JwksError> {
        let claims = self.verify(token, issuer).await?;
        Ok(CallerContext::from_claims(&claims))
    }
}
