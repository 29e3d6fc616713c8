//! RSA key store: signs with the active key, publishes every known key.
//!
//! The key set is immutable once built. Rotation builds a new set and swaps the
//! `Arc` under a write lock, so a signer always sees either the old set or the
//! new one in full.

use crate::crypto;
use crate::error::KeyError;
use crate::models::{ClaimSet, TokenClaims};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// One entry of the published key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use", default)]
    pub key_use: String,
    #[serde(default)]
    pub alg: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
    #[serde(default)]
    pub kid: String,
}

/// The `{keys: [...]}` document served at the JWKS endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// An RSA key pair identified by `kid`.
pub struct KeyPair {
    kid: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    jwk: Jwk,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Loads a private key in PKCS#1 or PKCS#8 PEM form. The public half is derived.
    pub fn from_pem(kid: impl Into<String>, pem: &str) -> Result<Self, KeyError> {
        let kid = kid.into();
        let private = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| KeyError::InvalidKey {
                kid: kid.clone(),
                reason: e.to_string(),
            })?;
        Self::from_private_key(kid, private)
    }

    /// Generates a fresh key pair.
    pub fn generate(kid: impl Into<String>, bits: usize) -> Result<Self, KeyError> {
        let kid = kid.into();
        let private =
            RsaPrivateKey::new(&mut rand::thread_rng(), bits).map_err(|e| KeyError::InvalidKey {
                kid: kid.clone(),
                reason: e.to_string(),
            })?;
        Self::from_private_key(kid, private)
    }

    fn from_private_key(kid: String, private: RsaPrivateKey) -> Result<Self, KeyError> {
        let invalid = |reason: String| KeyError::InvalidKey {
            kid: kid.clone(),
            reason,
        };
        let pem = private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| invalid(e.to_string()))?;
        let encoding = EncodingKey::from_rsa_pem(pem.as_bytes())?;

        let n = URL_SAFE_NO_PAD.encode(private.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(private.e().to_bytes_be());
        let decoding = DecodingKey::from_rsa_components(&n, &e)?;

        Ok(Self {
            jwk: Jwk {
                kty: "RSA".to_string(),
                key_use: "sig".to_string(),
                alg: "RS256".to_string(),
                n,
                e,
                kid: kid.clone(),
            },
            kid,
            encoding,
            decoding,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }
}

struct KeySet {
    active: String,
    keys: BTreeMap<String, Arc<KeyPair>>,
}

impl KeySet {
    fn active_pair(&self) -> Result<&Arc<KeyPair>, KeyError> {
        self.keys
            .get(&self.active)
            .ok_or_else(|| KeyError::ActiveKeyMissing(self.active.clone()))
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: TokenClaims,
}

pub struct KeyStore {
    issuer: String,
    set: RwLock<Arc<KeySet>>,
}

impl KeyStore {
    /// Builds a key store. Fails if `active_kid` is not among `keys`.
    pub fn new(
        issuer: impl Into<String>,
        keys: Vec<KeyPair>,
        active_kid: &str,
    ) -> Result<Self, KeyError> {
        let keys: BTreeMap<String, Arc<KeyPair>> = keys
            .into_iter()
            .map(|pair| (pair.kid.clone(), Arc::new(pair)))
            .collect();
        if !keys.contains_key(active_kid) {
            return Err(KeyError::ActiveKeyMissing(active_kid.to_string()));
        }
        Ok(Self {
            issuer: issuer.into(),
            set: RwLock::new(Arc::new(KeySet {
                active: active_kid.to_string(),
                keys,
            })),
        })
    }

    /// Loads every `<kid>.pem` file of `dir`.
    pub fn load_dir(
        issuer: impl Into<String>,
        dir: impl AsRef<Path>,
        active_kid: &str,
    ) -> Result<Self, KeyError> {
        let mut pairs = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pem") {
                continue;
            }
            let Some(kid) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let pem = std::fs::read_to_string(&path)?;
            pairs.push(KeyPair::from_pem(kid, &pem)?);
            debug!("Loaded signing key '{}' from {}", kid, path.display());
        }
        Self::new(issuer, pairs, active_kid)
    }

    fn snapshot(&self) -> Arc<KeySet> {
        self.set
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap<F>(&self, update: F) -> Result<(), KeyError>
    where
        F: FnOnce(&KeySet) -> Result<KeySet, KeyError>,
    {
        let mut guard = self.set.write().unwrap_or_else(PoisonError::into_inner);
        let next = update(&guard)?;
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn active_kid(&self) -> String {
        self.snapshot().active.clone()
    }

    pub fn kids(&self) -> Vec<String> {
        self.snapshot().keys.keys().cloned().collect()
    }

    /// Signs `claims` with the active key, valid for `ttl`.
    pub fn sign_with_active(
        &self,
        claims: &ClaimSet,
        ttl: Duration,
    ) -> Result<SignedToken, KeyError> {
        let set = self.snapshot();
        let pair = set.active_pair()?;

        let now = Utc::now().timestamp();
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or(KeyError::LifetimeOutOfRange(ttl.as_secs()))?;
        let mut payload = TokenClaims {
            sub: claims.subject(),
            scope: claims.scope.clone().unwrap_or_default(),
            client_id: claims.client_id.clone(),
            tenant_id: claims.tenant_id.clone(),
            typ: claims.token_type,
            aud: vec![claims.client_id.clone()],
            iss: self.issuer.clone(),
            iat: now,
            exp,
            jti: crypto::random_token(16),
            kid: String::new(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(pair.kid.clone());
        let token = jsonwebtoken::encode(&header, &payload, &pair.encoding)?;
        payload.kid = pair.kid.clone();

        Ok(SignedToken {
            token,
            claims: payload,
        })
    }

    /// Verifies a token issued by this store, using the key named in its header.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, KeyError> {
        let header = jsonwebtoken::decode_header(token)?;
        let kid = header.kid.ok_or(KeyError::MissingKid)?;
        let set = self.snapshot();
        let pair = set
            .keys
            .get(&kid)
            .ok_or_else(|| KeyError::UnknownKid(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_aud = false;

        let mut claims = jsonwebtoken::decode::<TokenClaims>(token, &pair.decoding, &validation)?.claims;
        claims.kid = kid;
        Ok(claims)
    }

    /// Public keys of every known kid.
    pub fn jwks(&self) -> JwkSet {
        JwkSet {
            keys: self
                .snapshot()
                .keys
                .values()
                .map(|pair| pair.jwk.clone())
                .collect(),
        }
    }

    /// Publishes a new, non-active key.
    pub fn add_key(&self, pair: KeyPair) -> Result<(), KeyError> {
        let kid = pair.kid.clone();
        let pair = Arc::new(pair);
        self.swap(|current| {
            if current.keys.contains_key(&pair.kid) {
                return Err(KeyError::DuplicateKid(pair.kid.clone()));
            }
            let mut keys = current.keys.clone();
            keys.insert(pair.kid.clone(), pair.clone());
            Ok(KeySet {
                active: current.active.clone(),
                keys,
            })
        })?;
        info!("Published signing key '{}'", kid);
        Ok(())
    }

    /// Makes a known key the active signer.
    pub fn promote(&self, kid: &str) -> Result<(), KeyError> {
        self.swap(|current| {
            if !current.keys.contains_key(kid) {
                return Err(KeyError::UnknownKid(kid.to_string()));
            }
            Ok(KeySet {
                active: kid.to_string(),
                keys: current.keys.clone(),
            })
        })?;
        info!("Signing key '{}' is now active", kid);
        Ok(())
    }

    /// Stops publishing a non-active key. Tokens signed with it no longer verify.
    pub fn retire(&self, kid: &str) -> Result<(), KeyError> {
        self.swap(|current| {
            if current.active == kid {
                return Err(KeyError::RetireActive(kid.to_string()));
            }
            if !current.keys.contains_key(kid) {
                return Err(KeyError::UnknownKid(kid.to_string()));
            }
            let mut keys = current.keys.clone();
            keys.remove(kid);
            Ok(KeySet {
                active: current.active.clone(),
                keys,
            })
        })?;
        info!("Retired signing key '{}'", kid);
        Ok(())
    }
}
