//! Resident complaints. Residents file and see their own; site admins triage
//! every complaint of their site.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{
    body::JsonBody,
    active_site, required_text,
    types::{
        ComplaintResponse, CreateComplaintRequest, ErrorResponse, SiteFilter,
        UpdateComplaintStatusRequest,
    },
    ApiResult,
};
use crate::{
    auth::{scope, AuthContext, AuthError},
    events::{EventHub, EventKind, SiteEvent},
    store::{ComplaintStatus, NewComplaint, SharedStore},
};

#[utoipa::path(
    get,
    path = "/v1/complaints",
    params(SiteFilter),
    responses(
        (status = 200, description = "Complaints visible to the caller, newest first.", body = [ComplaintResponse]),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "complaints"
)]
pub async fn list_complaints(
    Query(filter): Query<SiteFilter>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<ComplaintResponse>>> {
    let scope = scope::read_scope(&ctx, filter.site_id)?;
    let rows = store
        .list_complaints(scope, scope::owner_filter(&ctx))
        .await?;
    Ok(Json(rows.into_iter().map(ComplaintResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/complaints/{id}",
    params(("id" = Uuid, Path, description = "Complaint id")),
    responses(
        (status = 200, description = "Complaint detail.", body = ComplaintResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 404, description = "Not visible to the caller.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "complaints"
)]
pub async fn get_complaint(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<ComplaintResponse>> {
    let scope = scope::read_scope(&ctx, None)?;
    let owner = scope::owner_filter(&ctx);
    let complaint = store
        .find_complaint(scope, id)
        .await?
        .filter(|row| owner.map_or(true, |owner| row.author_id == owner))
        .ok_or(AuthError::NotFound)?;
    Ok(Json(complaint.into()))
}

#[utoipa::path(
    post,
    path = "/v1/complaints",
    request_body = CreateComplaintRequest,
    responses(
        (status = 201, description = "Complaint filed.", body = ComplaintResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Residents only.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "complaints"
)]
pub async fn create_complaint(
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
    JsonBody(payload): JsonBody<CreateComplaintRequest>,
) -> ApiResult<impl IntoResponse> {
    let site_id = scope::write_target(&ctx, None)?;
    let title = required_text(&payload.title, "title")?;
    let description = required_text(&payload.description, "description")?;
    active_site(store.as_ref(), site_id).await?;

    let row = store
        .insert_complaint(NewComplaint {
            site_id,
            author_id: ctx.user_id(),
            title,
            description,
        })
        .await?;
    events.publish(SiteEvent::now(site_id, EventKind::ComplaintCreated, row.id));
    Ok((StatusCode::CREATED, Json(ComplaintResponse::from(row))))
}

#[utoipa::path(
    patch,
    path = "/v1/complaints/{id}/status",
    params(("id" = Uuid, Path, description = "Complaint id")),
    request_body = UpdateComplaintStatusRequest,
    responses(
        (status = 200, description = "Status updated.", body = ComplaintResponse),
        (status = 400, description = "Unknown status.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Site admins only.", body = ErrorResponse),
        (status = 404, description = "Not found in the caller's site.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "complaints"
)]
pub async fn update_complaint_status(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
    JsonBody(payload): JsonBody<UpdateComplaintStatusRequest>,
) -> ApiResult<Json<ComplaintResponse>> {
    let status = ComplaintStatus::parse(payload.status.trim())
        .ok_or_else(|| AuthError::validation("status must be open, in_progress, or resolved"))?;
    let scope = scope::read_scope(&ctx, None)?;
    let row = store
        .set_complaint_status(scope, id, status)
        .await?
        .ok_or(AuthError::NotFound)?;
    info!(complaint_id = %row.id, status = status.as_str(), "complaint status changed");
    events.publish(SiteEvent::now(row.site_id, EventKind::ComplaintUpdated, row.id));
    Ok(Json(row.into()))
}
