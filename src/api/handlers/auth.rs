//! Public account endpoints: login, registration, password help, and session
//! bootstrap.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::debug;

use super::{
    body::JsonBody,
    types::{
        AuthResponse, ErrorResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest,
        RegisterRequest, SessionResponse,
    },
    ApiResult,
};
use crate::{
    api::guard::authorize,
    auth::{account, RoleSet, TokenCodec},
    store::SharedStore,
};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in.", body = AuthResponse),
        (status = 400, description = "Missing email or password.", body = ErrorResponse),
        (status = 401, description = "Invalid email or password.", body = ErrorResponse),
        (status = 404, description = "Unknown or inactive site code.", body = ErrorResponse),
    ),
    tag = "auth"
)]
/// Exchanges email and password for a bearer token.
/// Site identities must send their site's `tenantCode`; the platform admin omits it.
pub async fn login(
    Extension(store): Extension<SharedStore>,
    Extension(codec): Extension<Arc<TokenCodec>>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let authenticated = account::login(
        store.as_ref(),
        &codec,
        account::LoginRequest {
            email: payload.email,
            password: payload.password,
            join_code: payload.tenant_code,
        },
    )
    .await?;
    Ok(Json(authenticated.into()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Resident registered and signed in.", body = AuthResponse),
        (status = 400, description = "Missing or invalid fields.", body = ErrorResponse),
        (status = 404, description = "Unknown or inactive site code.", body = ErrorResponse),
        (status = 409, description = "Email already registered or unit occupied.", body = ErrorResponse),
    ),
    tag = "auth"
)]
/// Self-registration. The new identity is always a resident of the site named by `tenantCode`.
pub async fn register(
    Extension(store): Extension<SharedStore>,
    Extension(codec): Extension<Arc<TokenCodec>>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let authenticated = account::register(
        store.as_ref(),
        &codec,
        account::Registration {
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            password: payload.password,
            phone: payload.phone,
            join_code: payload.tenant_code,
            building: payload.building,
            unit: payload.unit,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::from(authenticated))))
}

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "How to get the password reset.", body = ForgotPasswordResponse),
        (status = 404, description = "Unknown or inactive site code.", body = ErrorResponse),
    ),
    tag = "auth"
)]
/// Passwords are reset by a site administrator. This returns who to contact
/// and answers identically whether or not the email is registered.
pub async fn forgot_password(
    Extension(store): Extension<SharedStore>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    let site = match payload.tenant_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            Some(account::resolve_join_code(store.as_ref(), code).await?)
        }
        _ => None,
    };
    debug!(has_site = site.is_some(), "password help requested");

    let response = match site {
        Some(site) => ForgotPasswordResponse {
            message: format!(
                "Contact the management of {} to reset your password.",
                site.name
            ),
            contact_email: site.contact_email,
            contact_phone: site.contact_phone,
        },
        None => ForgotPasswordResponse {
            message: "Contact your site management to reset your password.".to_string(),
            contact_email: None,
            contact_phone: None,
        },
    };
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Current identity and dashboard.", body = SessionResponse),
        (status = 401, description = "Missing, invalid, or stale credential.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
/// Resolves the bearer token to the stored identity and picks the dashboard.
/// Unlike the guard, this re-reads the store, so deactivated identities get `401`.
pub async fn session(
    headers: HeaderMap,
    Extension(store): Extension<SharedStore>,
    Extension(codec): Extension<Arc<TokenCodec>>,
) -> ApiResult<Json<SessionResponse>> {
    let ctx = authorize(&headers, &codec, RoleSet::ANY)?;
    let session = account::bootstrap_session(store.as_ref(), &ctx).await?;
    Ok(Json(session.into()))
}
