use axum::http::HeaderValue;
use axum::response::Response;
use chrono::{Duration, Utc};
use http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use log::warn;

/// Caching policy attached to an OAuth response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Token and introspection answers carry credentials (RFC 6749 section 5.1).
    NoStore,
    /// Shared caches may keep the body for `max_age` seconds.
    Public { max_age: u32 },
}

impl CachePolicy {
    fn cache_control(&self) -> HeaderValue {
        match self {
            Self::NoStore => HeaderValue::from_static("no-store"),
            Self::Public { max_age } => HeaderValue::from_str(&format!("public, max-age={max_age}"))
                .unwrap_or(HeaderValue::from_static("public")),
        }
    }

    pub fn apply<B>(&self, response: &mut Response<B>) {
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, self.cache_control());

        match self {
            Self::NoStore => {
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
                headers.insert(EXPIRES, HeaderValue::from_static("0"));
            }
            Self::Public { max_age } => {
                let expires = Utc::now() + Duration::seconds(i64::from(*max_age));
                match HeaderValue::from_str(&expires.to_rfc2822()) {
                    Ok(value) => {
                        headers.insert(EXPIRES, value);
                    }
                    Err(e) => warn!("failed to set expires header: {e}"),
                }
            }
        }
    }
}
