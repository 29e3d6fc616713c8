//! HTTP Basic client authentication (RFC 6749 Section 2.3.1)

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use token_engine::ClientAuth;

/// Outcome of reading the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasicCredentials {
    /// No `Authorization: Basic` header was sent
    Absent,
    /// A Basic header was sent but could not be decoded
    Malformed,
    Present(ClientAuth),
}

impl BasicCredentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Self::Absent;
        };
        let Some(encoded) = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Basic "))
        else {
            return Self::Absent;
        };

        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return Self::Malformed;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return Self::Malformed;
        };
        match decoded.split_once(':') {
            Some((client_id, secret)) if !client_id.is_empty() => Self::Present(ClientAuth::new(
                client_id,
                Some(secret.to_string()).filter(|s| !s.is_empty()),
            )),
            _ => Self::Malformed,
        }
    }

    pub fn into_option(self) -> Option<ClientAuth> {
        match self {
            Self::Present(auth) => Some(auth),
            Self::Absent | Self::Malformed => None,
        }
    }
}
