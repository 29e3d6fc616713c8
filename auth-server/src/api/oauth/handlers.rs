//! OAuth 2.0 endpoint handlers

use crate::api::oauth::client_auth::BasicCredentials;
use crate::api::oauth::models::{
    AuthorizeParams, IntrospectionResponse, TokenReferenceRequest, TokenRequest, TokenResponse,
};
use crate::errors::{OAuthError, OAuthErrorBody};
use crate::headers::CachePolicy;
use crate::openapi::OAUTH_TAG;
use crate::state::AppState;
use axum::{
    extract::{Form, FromRequest, Query, Request, State},
    http::{
        header::{CONTENT_TYPE, LOCATION},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    Json,
};
use log::{debug, info};
use serde::de::DeserializeOwned;
use token_engine::models::{CallerContext, TokenTypeHint};

/// Seconds JWKS responses may be cached by verifiers.
const JWKS_MAX_AGE: u32 = 300;

/// Request body accepted either as `application/json` or as
/// `application/x-www-form-urlencoded`, chosen by the content type.
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = OAuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| OAuthError::invalid_request(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| OAuthError::invalid_request(e.body_text()))?;
            Ok(Self(value))
        }
    }
}

fn with_credentials_headers(body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    CachePolicy::NoStore.apply(&mut response);
    response
}

/// Authenticates the calling client from its HTTP Basic credentials.
async fn authenticate_basic(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<CallerContext, OAuthError> {
    match BasicCredentials::from_headers(headers) {
        BasicCredentials::Present(auth) => state
            .engine
            .authenticate_client(&auth.client_id, auth.client_secret.as_deref())
            .await
            .map_err(|e| OAuthError::from(e).with_basic_challenge()),
        BasicCredentials::Absent | BasicCredentials::Malformed => {
            Err(OAuthError::invalid_client_basic())
        }
    }
}

fn required_token(request: TokenReferenceRequest) -> Result<(String, Option<TokenTypeHint>), OAuthError> {
    let hint = TokenTypeHint::parse(request.token_type_hint.as_deref());
    match request.token.filter(|t| !t.trim().is_empty()) {
        Some(token) => Ok((token, hint)),
        None => Err(OAuthError::invalid_request("token required")),
    }
}

/// OAuth 2.0 Token endpoint (RFC 6749 Section 3.2)
#[utoipa::path(
    post,
    path = "/oauth/token",
    tag = OAUTH_TAG,
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Grant parameters, form or JSON encoded"
    ),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Invalid grant or request", body = OAuthErrorBody),
        (status = 401, description = "Client authentication failed", body = OAuthErrorBody),
        (status = 500, description = "Internal error", body = OAuthErrorBody)
    )
)]
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<TokenRequest>,
) -> Result<Response, OAuthError> {
    let basic = BasicCredentials::from_headers(&headers);
    if basic == BasicCredentials::Malformed {
        return Err(OAuthError::invalid_client_basic());
    }
    let used_basic = matches!(basic, BasicCredentials::Present(_));

    let grant = request.into_grant(basic.into_option())?;
    let issued = state.engine.grant(grant).await.map_err(|e| {
        let err = OAuthError::from(e);
        if used_basic {
            err.with_basic_challenge()
        } else {
            err
        }
    })?;

    Ok(with_credentials_headers(Json(TokenResponse::from(issued))))
}

/// OAuth 2.0 Authorization endpoint (RFC 6749 Section 4.1.1)
///
/// Renders the consent page, unless `prompt=none` or `autoapprove=1` asks for
/// the code to be issued straight away.
#[utoipa::path(
    get,
    path = "/oauth/authorize",
    tag = OAUTH_TAG,
    params(AuthorizeParams),
    responses(
        (status = 200, description = "Consent page", content_type = "text/html"),
        (status = 302, description = "Redirect to redirect_uri with code and state"),
        (status = 400, description = "Invalid request", body = OAuthErrorBody)
    )
)]
pub async fn authorize_page(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, OAuthError> {
    if !params.skips_consent() {
        debug!(
            "Rendering consent page for client '{}'",
            params.client_id.as_deref().unwrap_or_default()
        );
        return Ok(Html(consent_page(&params)).into_response());
    }
    issue_code(&state, params).await
}

/// Consent decision of the resource owner
#[utoipa::path(
    post,
    path = "/oauth/authorize",
    tag = OAUTH_TAG,
    request_body(content = AuthorizeParams, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to redirect_uri with code and state"),
        (status = 400, description = "Invalid request", body = OAuthErrorBody),
        (status = 403, description = "Resource owner denied access", body = OAuthErrorBody)
    )
)]
pub async fn authorize_decision(
    State(state): State<AppState>,
    Form(params): Form<AuthorizeParams>,
) -> Result<Response, OAuthError> {
    issue_code(&state, params).await
}

async fn issue_code(state: &AppState, params: AuthorizeParams) -> Result<Response, OAuthError> {
    // A denial is answered before the request itself is validated.
    if !params.denied() && !params.has_code_response_type() {
        return Err(OAuthError::unsupported_response_type());
    }

    let grant = state
        .engine
        .authorize(params.into_engine_request())
        .await?;
    let location = grant.location();
    let location = HeaderValue::from_str(location.as_str())
        .map_err(|_| OAuthError::invalid_request("redirect_uri is not a valid header value"))?;

    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}

/// Token Introspection (RFC 7662); requires HTTP Basic client authentication
#[utoipa::path(
    post,
    path = "/oauth/introspect",
    tag = OAUTH_TAG,
    request_body(content = TokenReferenceRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token state; only `active` is set for inactive tokens", body = IntrospectionResponse),
        (status = 400, description = "Missing token", body = OAuthErrorBody),
        (status = 401, description = "Client authentication failed", body = OAuthErrorBody)
    )
)]
pub async fn introspect(
    State(state): State<AppState>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<TokenReferenceRequest>,
) -> Result<Response, OAuthError> {
    let caller = authenticate_basic(&state, &headers).await?;
    let (token, hint) = required_token(request)?;

    let response = match state.engine.introspect(&token, hint, Some(&caller)).await {
        Some(active) => IntrospectionResponse::from(active),
        None => IntrospectionResponse::inactive(),
    };
    Ok(with_credentials_headers(Json(response)))
}

/// Token Revocation (RFC 7009); requires HTTP Basic client authentication
///
/// Answers 200 whether or not the token was known.
#[utoipa::path(
    post,
    path = "/oauth/revoke",
    tag = OAUTH_TAG,
    request_body(content = TokenReferenceRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token revoked or unknown"),
        (status = 400, description = "Missing token", body = OAuthErrorBody),
        (status = 401, description = "Client authentication failed", body = OAuthErrorBody),
        (status = 500, description = "Internal error", body = OAuthErrorBody)
    )
)]
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    FormOrJson(request): FormOrJson<TokenReferenceRequest>,
) -> Result<StatusCode, OAuthError> {
    let caller = authenticate_basic(&state, &headers).await?;
    let (token, hint) = required_token(request)?;

    state.engine.revoke(&token, hint, Some(&caller)).await?;
    info!("Revocation request from client '{}' processed", caller.client_id);
    Ok(StatusCode::OK)
}

/// Published signing keys (RFC 7517)
#[utoipa::path(
    get,
    path = "/oauth/jwks",
    tag = OAUTH_TAG,
    responses(
        (status = 200, description = "JSON Web Key Set with every known signing key", content_type = "application/json")
    )
)]
pub async fn jwks(State(state): State<AppState>) -> Response {
    let mut response = Json(state.engine.jwks()).into_response();
    CachePolicy::Public { max_age: JWKS_MAX_AGE }.apply(&mut response);
    response
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn consent_page(params: &AuthorizeParams) -> String {
    let field = |value: &Option<String>| escape_html(value.as_deref().unwrap_or_default());
    let client_id = field(&params.client_id);
    let user_id = field(&params.user_id);
    let scope = field(&params.scope);

    format!(
        r#"<!doctype html>
<html>
<head>
    <meta charset="utf-8">
    <title>Authorize {client_id}</title>
</head>
<body>
    <h2>Application "{client_id}" is requesting access</h2>
    <p>User: {user_id}</p>
    <p>Scope: {scope}</p>
    <form method="POST" action="/oauth/authorize">
        <input type="hidden" name="response_type" value="{response_type}"/>
        <input type="hidden" name="client_id" value="{client_id}"/>
        <input type="hidden" name="redirect_uri" value="{redirect_uri}"/>
        <input type="hidden" name="scope" value="{scope}"/>
        <input type="hidden" name="state" value="{state}"/>
        <input type="hidden" name="user_id" value="{user_id}"/>
        <input type="hidden" name="code_challenge" value="{code_challenge}"/>
        <input type="hidden" name="code_challenge_method" value="{code_challenge_method}"/>
        <input type="hidden" name="tenant_id" value="{tenant_id}"/>
        <button type="submit" name="approve" value="1">Allow</button>
        <button type="submit" name="approve" value="0">Deny</button>
    </form>
</body>
</html>
"#,
        response_type = field(&params.response_type),
        redirect_uri = field(&params.redirect_uri),
        state = field(&params.state),
        code_challenge = field(&params.code_challenge),
        code_challenge_method = field(&params.code_challenge_method),
        tenant_id = field(&params.tenant_id),
    )
}
