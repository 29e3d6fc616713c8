use thiserror::Error;

/// Errors reported by the storage collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors raised while loading, rotating or using signing keys.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Active key '{0}' is not part of the loaded key set")]
    ActiveKeyMissing(String),

    #[error("Unknown key id '{0}'")]
    UnknownKid(String),

    #[error("Key id '{0}' is already in use")]
    DuplicateKid(String),

    #[error("Key '{0}' is active and cannot be retired")]
    RetireActive(String),

    #[error("Token header carries no key id")]
    MissingKid,

    #[error("Token lifetime of {0} seconds cannot be represented")]
    LifetimeOutOfRange(u64),

    #[error("Invalid key material for '{kid}': {reason}")]
    InvalidKey { kid: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Argon2 rejected the password or its parameters.
#[derive(Error, Debug)]
#[error("Failed to hash password: {0}")]
pub struct PasswordHashError(pub argon2::password_hash::Error);

/// Errors raised by the JWKS client cache.
#[derive(Error, Debug)]
pub enum JwksError {
    #[error("Key id '{0}' not found in the published key set")]
    NotFound(String),

    #[error("Failed to fetch key set: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Key set endpoint answered with status {0}")]
    Status(u16),

    #[error("Token header carries no key id")]
    MissingKid,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Grant-validation failures. Each maps to the error string put on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("tenant_required")]
    TenantRequired,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid redirect_uri")]
    InvalidRedirectUri,

    #[error("redirect_uri required")]
    RedirectUriRequired,

    #[error("invalid code")]
    InvalidCode,

    #[error("redirect_uri mismatch")]
    RedirectUriMismatch,

    #[error("invalid code_verifier")]
    InvalidVerifier,

    #[error("public clients must use PKCE")]
    PkceRequired,

    #[error("refresh_token_not_found")]
    RefreshTokenNotFound,

    #[error("invalid client_id")]
    InvalidClientId,

    #[error("refresh_token_expired")]
    RefreshTokenExpired,
}

impl GrantError {
    /// Error code returned to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            GrantError::TenantRequired => "tenant_required",
            GrantError::InvalidCredentials => "invalid_grant",
            GrantError::InvalidRedirectUri => "invalid_redirect_uri",
            GrantError::RedirectUriRequired => "redirect_uri_required",
            GrantError::InvalidCode => "invalid_code",
            GrantError::RedirectUriMismatch => "redirect_uri_mismatch",
            GrantError::InvalidVerifier => "invalid_code_verifier",
            GrantError::PkceRequired => "pkce_required",
            GrantError::RefreshTokenNotFound => "refresh_token_not_found",
            GrantError::InvalidClientId => "invalid_client_id",
            GrantError::RefreshTokenExpired => "refresh_token_expired",
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Client authentication failed: {0}")]
    InvalidClient(String),

    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource owner denied the request")]
    AccessDenied,

    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Signing error: {0}")]
    Signing(#[from] KeyError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// OAuth error code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::InvalidClient(_) => "invalid_client",
            EngineError::Grant(grant) => grant.code(),
            EngineError::InvalidRequest(_) => "invalid_request",
            EngineError::AccessDenied => "access_denied",
            EngineError::UnsupportedGrantType(_) => "unsupported_grant_type",
            EngineError::Storage(_) | EngineError::Signing(_) | EngineError::Configuration(_) => {
                "server_error"
            }
        }
    }

    /// Whether the failure is on our side rather than the caller's.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            EngineError::Storage(_) | EngineError::Signing(_) | EngineError::Configuration(_)
        )
    }
}
