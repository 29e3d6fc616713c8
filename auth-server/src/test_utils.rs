use crate::cache::create_cache;
use crate::config::{AuthConfig, CacheStore};
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use token_engine::crypto;
use token_engine::models::{Client, User};
use token_engine::store::MemoryStore;
use token_engine::{KeyPair, KeyStore};
use tower::ServiceExt;

const K1_PEM: &str = include_str!("../../token-engine/tests/fixtures/signing-k1.pem");
const K2_PEM: &str = include_str!("../../token-engine/tests/fixtures/signing-k2.pem");

pub const CLIENT_ID: &str = "mobile";
pub const CLIENT_SECRET: &str = "s3cr3t";
pub const TENANT_ID: &str = "T1";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const PUBLIC_CLIENT_ID: &str = "spa";
pub const PUBLIC_REDIRECT_URI: &str = "https://spa.example.com/cb";
pub const OTHER_CLIENT_ID: &str = "billing";
pub const OTHER_CLIENT_SECRET: &str = "b1ll1ng";
pub const USER_ID: &str = "u-1";
pub const USER_EMAIL: &str = "a@b.com";
pub const USER_PASSWORD: &str = "Passw0rd1";

/// Key store with `k1` active and `k2` published.
pub fn test_key_store() -> KeyStore {
    KeyStore::new(
        "auth-service",
        vec![
            KeyPair::from_pem("k1", K1_PEM).expect("fixture k1 must parse"),
            KeyPair::from_pem("k2", K2_PEM).expect("fixture k2 must parse"),
        ],
        "k1",
    )
    .expect("fixture key store must build")
}

/// Store holding two confidential clients, a public client and one user.
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .add_client(Client {
            id: "c-mobile".to_string(),
            client_id: CLIENT_ID.to_string(),
            secret_hash: Some(crypto::hash_client_secret(CLIENT_SECRET)),
            redirect_uri: Some(REDIRECT_URI.to_string()),
            scopes: Some("read write".to_string()),
            tenant_id: Some(TENANT_ID.to_string()),
            created_at: Utc::now(),
        })
        .await;
    store
        .add_client(Client {
            id: "c-spa".to_string(),
            client_id: PUBLIC_CLIENT_ID.to_string(),
            secret_hash: None,
            redirect_uri: Some(PUBLIC_REDIRECT_URI.to_string()),
            scopes: Some("read".to_string()),
            tenant_id: Some(TENANT_ID.to_string()),
            created_at: Utc::now(),
        })
        .await;
    store
        .add_client(Client {
            id: "c-billing".to_string(),
            client_id: OTHER_CLIENT_ID.to_string(),
            secret_hash: Some(crypto::hash_client_secret(OTHER_CLIENT_SECRET)),
            redirect_uri: None,
            scopes: Some("invoices".to_string()),
            tenant_id: Some("T2".to_string()),
            created_at: Utc::now(),
        })
        .await;
    store
        .add_user(User {
            id: USER_ID.to_string(),
            email: USER_EMAIL.to_string(),
            password_hash: crypto::hash_password(USER_PASSWORD).expect("hashing must succeed"),
        })
        .await;
    store
}

pub fn basic_header(client_id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{secret}")))
}

/// Test fixture for exercising the HTTP surface against a seeded store.
///
/// The denylist uses the in-memory backend and tokens are signed with the
/// fixture keys from [`test_key_store`].
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     let response = fixture
///         .post_form("/oauth/token", &[("grant_type", "client_credentials")])
///         .await;
///     response.assert_status(StatusCode::UNAUTHORIZED);
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub settings: AuthConfig,
    /// State shared with the router, for inspecting the engine and the cache
    pub state: AppState,
}

impl TestFixture {
    pub async fn new() -> Self {
        let mut settings = AuthConfig::for_test();
        settings.cache.store = CacheStore::InMemory;
        Self::with_config(settings).await
    }

    pub async fn with_config(settings: AuthConfig) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let cache = create_cache(&settings)
            .await
            .expect("Failed to create test cache");
        let state = AppState::with_parts(
            settings.clone(),
            cache,
            test_key_store(),
            seeded_store().await,
        )
        .expect("Failed to build test state");
        let app = create_app(state.clone()).await;

        Self {
            app,
            settings,
            state,
        }
    }

    /// Initializes the test logger; later calls are no-ops.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    pub fn request_builder(&self, method: Method, uri: impl AsRef<str>) -> http::request::Builder {
        Request::builder().method(method).uri(uri.as_ref())
    }

    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a POST request with an `application/x-www-form-urlencoded` body.
    pub async fn post_form(&self, uri: impl AsRef<str>, fields: &[(&str, &str)]) -> TestResponse {
        self.post_form_with_headers(uri, fields, &[]).await
    }

    /// Sends a form POST authenticated with HTTP Basic.
    pub async fn post_form_with_basic(
        &self,
        uri: impl AsRef<str>,
        client_id: &str,
        secret: &str,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let authorization = basic_header(client_id, secret);
        self.post_form_with_headers(uri, fields, &[(AUTHORIZATION.as_str(), authorization.as_str())])
            .await
    }

    pub async fn post_form_with_headers(
        &self,
        uri: impl AsRef<str>,
        fields: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut builder = self
            .request_builder(Method::POST, uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Sends a POST request with a JSON body.
    pub async fn post_json<T: Serialize>(&self, uri: impl AsRef<str>, body: &T) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = self
            .request_builder(Method::POST, uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    /// Runs the password grant for the seeded user through the token endpoint.
    pub async fn password_grant(&self) -> Value {
        let response = self
            .post_form_with_basic(
                "/oauth/token",
                CLIENT_ID,
                CLIENT_SECRET,
                &[
                    ("grant_type", "password"),
                    ("username", USER_EMAIL),
                    ("password", USER_PASSWORD),
                ],
            )
            .await;
        response.assert_ok();
        response.json()
    }
}

/// Response from a test request.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {} but got {} with body: {}",
            expected, self.status, self.body
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Response body as JSON, `{}` if the body is empty or not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_str(&self.body).expect("Failed to deserialize response JSON")
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
