//! Member administration inside a site.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::{
    body::JsonBody,
    types::{ErrorResponse, ResetPasswordRequest, SiteFilter, UserResponse},
    ApiResult,
};
use crate::{
    auth::{account, scope, AuthContext, AuthError, Role, SiteScope},
    store::{SharedStore, Store},
};

/// Site admins manage residents only; fellow admins are managed by the platform admin.
async fn ensure_manageable(
    store: &dyn Store,
    ctx: &AuthContext,
    scope: SiteScope,
    id: Uuid,
) -> ApiResult<()> {
    if ctx.is_platform_admin() {
        return Ok(());
    }
    let target = store
        .find_user(id)
        .await?
        .filter(|user| user.site_id.is_some_and(|site_id| scope.contains(site_id)))
        .ok_or(AuthError::NotFound)?;
    if target.role == Role::Resident {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[utoipa::path(
    get,
    path = "/v1/members",
    params(SiteFilter),
    responses(
        (status = 200, description = "Site-bound identities, newest first.", body = [UserResponse]),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "members"
)]
/// Site admins see their own site. The platform admin sees every site unless `siteId` is given.
pub async fn list_members(
    Query(filter): Query<SiteFilter>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let scope = scope::read_scope(&ctx, filter.site_id)?;
    let members = store.list_members(scope).await?;
    Ok(Json(members.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/v1/members/{id}",
    params(("id" = Uuid, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Identity deactivated.", body = UserResponse),
        (status = 400, description = "Cannot deactivate yourself.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only; site admins manage residents only.", body = ErrorResponse),
        (status = 404, description = "Not found in the caller's site.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "members"
)]
/// Soft delete. Existing tokens of the member keep verifying until they expire,
/// but session bootstrap and login reject the member immediately.
pub async fn delete_member(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<UserResponse>> {
    if id == ctx.user_id() {
        return Err(AuthError::validation("you cannot deactivate your own account"));
    }
    let scope = scope::read_scope(&ctx, None)?;
    ensure_manageable(store.as_ref(), &ctx, scope, id).await?;
    let user = store
        .set_user_active(scope, id, false)
        .await?
        .ok_or(AuthError::NotFound)?;
    info!(user_id = %user.id, by = %ctx.user_id(), "member deactivated");
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/v1/members/{id}/password",
    params(("id" = Uuid, Path, description = "Identity id")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced.", body = UserResponse),
        (status = 400, description = "Password too short.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only; site admins manage residents only.", body = ErrorResponse),
        (status = 404, description = "Not found in the caller's site.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "members"
)]
/// Administrative password reset; the out-of-band answer to "forgot password".
pub async fn reset_password(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> ApiResult<Json<UserResponse>> {
    let scope = scope::read_scope(&ctx, None)?;
    ensure_manageable(store.as_ref(), &ctx, scope, id).await?;
    let user = account::reset_password(store.as_ref(), scope, id, payload.password).await?;
    info!(user_id = %user.id, by = %ctx.user_id(), "password reset");
    Ok(Json(user.into()))
}
