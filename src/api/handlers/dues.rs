//! Monthly dues. Residents see their own; admins bill and record payments.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{
    body::JsonBody,
    active_site, non_negative,
    types::{CreateDueRequest, DueResponse, ErrorResponse, SiteFilter},
    ApiResult,
};
use crate::{
    auth::{scope, AuthContext, AuthError, Role},
    events::{EventHub, EventKind, SiteEvent},
    store::{NewDue, SharedStore},
};

/// `YYYY-MM` with a real month.
pub(crate) fn valid_period(period: &str) -> bool {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").is_ok_and(|regex| regex.is_match(period))
}

#[utoipa::path(
    get,
    path = "/v1/dues",
    params(SiteFilter),
    responses(
        (status = 200, description = "Dues visible to the caller, newest first.", body = [DueResponse]),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "dues"
)]
pub async fn list_dues(
    Query(filter): Query<SiteFilter>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<DueResponse>>> {
    let scope = scope::read_scope(&ctx, filter.site_id)?;
    let rows = store.list_dues(scope, scope::owner_filter(&ctx)).await?;
    Ok(Json(rows.into_iter().map(DueResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/dues",
    request_body = CreateDueRequest,
    responses(
        (status = 201, description = "Due billed.", body = DueResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
        (status = 404, description = "Site or resident not found.", body = ErrorResponse),
        (status = 409, description = "Already billed for this period.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "dues"
)]
/// Bills one resident for one month. The amount defaults to the site's monthly due.
pub async fn create_due(
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
    JsonBody(payload): JsonBody<CreateDueRequest>,
) -> ApiResult<impl IntoResponse> {
    let site_id = scope::write_target(&ctx, payload.site_id)?;
    let period = payload.period.trim().to_string();
    if !valid_period(&period) {
        return Err(AuthError::validation("period must be YYYY-MM"));
    }
    let site = active_site(store.as_ref(), site_id).await?;
    let amount_cents = non_negative(
        payload.amount_cents.unwrap_or(site.monthly_due_cents),
        "amountCents",
    )?;

    // The resident must belong to the same site as the due.
    store
        .find_user(payload.user_id)
        .await?
        .filter(|user| user.site_id == Some(site_id) && user.role == Role::Resident)
        .ok_or(AuthError::NotFound)?;

    let row = store
        .insert_due(NewDue {
            site_id,
            user_id: payload.user_id,
            period,
            amount_cents,
        })
        .await?;
    events.publish(SiteEvent::now(site_id, EventKind::DueCreated, row.id));
    Ok((StatusCode::CREATED, Json(DueResponse::from(row))))
}

#[utoipa::path(
    post,
    path = "/v1/dues/{id}/pay",
    params(("id" = Uuid, Path, description = "Due id")),
    responses(
        (status = 200, description = "Due marked paid; repeating keeps the first payment time.", body = DueResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
        (status = 404, description = "Not found in the caller's site.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "dues"
)]
pub async fn pay_due(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
) -> ApiResult<Json<DueResponse>> {
    let scope = scope::read_scope(&ctx, None)?;
    let row = store
        .mark_due_paid(scope, id, Utc::now())
        .await?
        .ok_or(AuthError::NotFound)?;
    info!(due_id = %row.id, by = %ctx.user_id(), "due marked paid");
    events.publish(SiteEvent::now(row.site_id, EventKind::DuePaid, row.id));
    Ok(Json(row.into()))
}
