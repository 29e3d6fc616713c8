use crate::api::health::handlers as health;
use crate::api::oauth::handlers as oauth;
use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const OAUTH_TAG: &str = "OAuth 2.0 API";

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::ready_check,
        health::healthz_check,
        oauth::token,
        oauth::authorize_page,
        oauth::authorize_decision,
        oauth::introspect,
        oauth::revoke,
        oauth::jwks,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = OAUTH_TAG, description = "Token issuance, introspection and revocation"),
    ),
    info(
        title = "Authorization Server API",
        description = "Multi-tenant OAuth 2.0 authorization server",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
