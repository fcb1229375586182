//! Bearer-token guard.
//!
//! Flow Overview: read `Authorization: Bearer <token>`, verify it with the
//! process-wide [`TokenCodec`], check the route's [`RoleSet`], then hand the
//! request to the handler with an [`AuthContext`] in its extensions. The store
//! is never consulted here.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::auth::{AuthContext, AuthError, RoleSet, TokenCodec};

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Verify the request credential and check it against `roles`.
///
/// # Errors
/// [`AuthError::Unauthenticated`] for a missing or invalid credential,
/// [`AuthError::Forbidden`] when the role is not in a non-empty `roles`.
pub fn authorize(
    headers: &HeaderMap,
    codec: &TokenCodec,
    roles: RoleSet,
) -> Result<AuthContext, AuthError> {
    let Some(token) = extract_bearer_token(headers) else {
        debug!("rejected: missing bearer token");
        return Err(AuthError::Unauthenticated);
    };
    let ctx = codec.verify(token).map_err(|err| {
        debug!("rejected: {err}");
        AuthError::Unauthenticated
    })?;
    if !roles.permits(ctx.role()) {
        debug!(user_id = %ctx.user_id(), role = %ctx.role(), "rejected: role not allowed");
        return Err(AuthError::Forbidden);
    }
    Ok(ctx)
}

/// Route-layer middleware: `middleware::from_fn_with_state(RoleSet::ADMINS, enforce)`.
pub async fn enforce(State(roles): State<RoleSet>, mut request: Request, next: Next) -> Response {
    let Some(codec) = request.extensions().get::<Arc<TokenCodec>>().cloned() else {
        error!("token codec missing from request extensions");
        return AuthError::Internal("token codec not configured".to_string()).into_response();
    };
    match authorize(request.headers(), &codec, roles) {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn codec() -> Arc<TokenCodec> {
        match TokenCodec::new(&SecretString::from("0123456789abcdef0123456789abcdef"), 600) {
            Ok(codec) => Arc::new(codec),
            Err(err) => panic!("codec: {err}"),
        }
    }

    fn token_for(codec: &TokenCodec, role: Role) -> String {
        let site_id = role.is_site_bound().then(Uuid::new_v4);
        let ctx = AuthContext::new(Uuid::new_v4(), "a@x.com".into(), role, site_id)
            .unwrap_or_else(|| panic!("valid context"));
        match codec.issue(&ctx) {
            Ok(issued) => issued.token,
            Err(err) => panic!("issue: {err}"),
        }
    }

    fn counting_app(codec: Arc<TokenCodec>, roles: RoleSet, calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/guarded",
                get(move |Extension(ctx): Extension<AuthContext>| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ctx.role().to_string()
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(roles, enforce))
            .layer(Extension(codec))
    }

    async fn call(app: Router, token: Option<&str>) -> StatusCode {
        let mut request = Request::builder().uri("/guarded");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match request.body(Body::empty()) {
            Ok(request) => request,
            Err(err) => panic!("request: {err}"),
        };
        match app.oneshot(request).await {
            Ok(response) => response.status(),
            Err(err) => panic!("oneshot: {err}"),
        }
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   abc "));
        assert_eq!(extract_bearer_token(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(extract_bearer_token(&headers), Some("xyz"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn missing_header_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let status = call(counting_app(codec(), RoleSet::ANY, calls.clone()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_token_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(codec(), RoleSet::ANY, calls.clone());
        assert_eq!(call(app, Some("a.b.c")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forwards_iff_role_is_allowed() {
        let codec = codec();
        let sets = [
            RoleSet::ANY,
            RoleSet::PLATFORM,
            RoleSet::ADMINS,
            RoleSet::SITE_ADMIN,
            RoleSet::RESIDENT,
        ];
        for roles in sets {
            for role in [Role::PlatformAdmin, Role::SiteAdmin, Role::Resident] {
                let calls = Arc::new(AtomicUsize::new(0));
                let app = counting_app(codec.clone(), roles, calls.clone());
                let status = call(app, Some(&token_for(&codec, role))).await;
                if roles.permits(role) {
                    assert_eq!(status, StatusCode::OK, "{role} on {roles:?}");
                    assert_eq!(calls.load(Ordering::SeqCst), 1);
                } else {
                    assert_eq!(status, StatusCode::FORBIDDEN, "{role} on {roles:?}");
                    assert_eq!(calls.load(Ordering::SeqCst), 0);
                }
            }
        }
    }

    #[test]
    fn authorize_rejects_tokens_from_other_secrets() -> anyhow::Result<()> {
        let other = TokenCodec::new(&SecretString::from("ffffffffffffffffffffffffffffffff"), 600)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token_for(&other, Role::SiteAdmin)))?,
        );
        assert!(matches!(
            authorize(&headers, &codec(), RoleSet::ANY),
            Err(AuthError::Unauthenticated)
        ));
        Ok(())
    }
}
