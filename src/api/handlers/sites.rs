//! Site management for the platform admin, plus the public join-code lookup.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    body::JsonBody,
    non_negative, required_text,
    types::{
        CreateAdminRequest, CreateSiteRequest, ErrorResponse, SiteLookupResponse, SiteResponse,
        UserResponse,
    },
    ApiResult,
};
use crate::{
    auth::{
        account::{self, valid_email},
        join_code, AuthContext, AuthError,
    },
    store::{normalize_email, Constraint, NewSite, SharedStore, StoreError},
};

#[utoipa::path(
    get,
    path = "/v1/sites/lookup/{code}",
    params(("code" = String, Path, description = "Site join code, any case")),
    responses(
        (status = 200, description = "Public site metadata.", body = SiteLookupResponse),
        (status = 404, description = "Unknown or inactive site code.", body = ErrorResponse),
    ),
    tag = "sites"
)]
/// Lets a visitor confirm a join code before registering. Only non-sensitive fields are returned.
pub async fn lookup_site(
    Path(code): Path<String>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<SiteLookupResponse>> {
    let site = account::resolve_join_code(store.as_ref(), &code).await?;
    Ok(Json(site.into()))
}

#[utoipa::path(
    post,
    path = "/v1/sites",
    request_body = CreateSiteRequest,
    responses(
        (status = 201, description = "Site created with a fresh join code.", body = SiteResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Platform admin only.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "sites"
)]
/// Creates a site. The join code is drawn until unused; a race with another insert is retried.
pub async fn create_site(
    Extension(store): Extension<SharedStore>,
    JsonBody(payload): JsonBody<CreateSiteRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = required_text(&payload.name, "name")?;
    let address = required_text(&payload.address, "address")?;
    let city = required_text(&payload.city, "city")?;
    if payload.building_count < 1 {
        return Err(AuthError::validation("buildingCount must be at least 1"));
    }
    if payload.unit_count < 0 {
        return Err(AuthError::validation("unitCount must not be negative"));
    }
    let monthly_due_cents = non_negative(payload.monthly_due_cents, "monthlyDueCents")?;
    let unit_capacity = payload.unit_capacity.unwrap_or(1);
    if unit_capacity < 1 {
        return Err(AuthError::validation("unitCapacity must be at least 1"));
    }
    let contact_email = match payload.contact_email.as_deref().map(normalize_email) {
        Some(email) if email.is_empty() => None,
        Some(email) if !valid_email(&email) => {
            return Err(AuthError::validation("contactEmail is invalid"));
        }
        other => other,
    };
    let contact_phone = payload
        .contact_phone
        .map(|phone| phone.trim().to_string())
        .filter(|phone| !phone.is_empty());

    let mut rng = StdRng::from_entropy();
    let mut attempt = 0;
    loop {
        let code = join_code::generate_unique(store.as_ref(), &mut rng).await?;
        let insert = store
            .insert_site(NewSite {
                join_code: code,
                name: name.clone(),
                address: address.clone(),
                city: city.clone(),
                building_count: payload.building_count,
                unit_count: payload.unit_count,
                monthly_due_cents,
                contact_email: contact_email.clone(),
                contact_phone: contact_phone.clone(),
                unit_capacity,
            })
            .await;
        match insert {
            Ok(site) => {
                info!(site_id = %site.id, "site created");
                return Ok((StatusCode::CREATED, Json(SiteResponse::from(site))));
            }
            Err(StoreError::Conflict(Constraint::JoinCode))
                if attempt + 1 < join_code::MAX_GENERATION_ATTEMPTS =>
            {
                attempt += 1;
                warn!(attempt, "join code taken concurrently, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/sites",
    responses(
        (status = 200, description = "All sites, newest first.", body = [SiteResponse]),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Platform admin only.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "sites"
)]
pub async fn list_sites(
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<SiteResponse>>> {
    let sites = store.list_sites().await?;
    Ok(Json(sites.into_iter().map(SiteResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/sites/{id}",
    params(("id" = Uuid, Path, description = "Site id")),
    responses(
        (status = 200, description = "Site detail.", body = SiteResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
        (status = 404, description = "Not found, or not the caller's site.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "sites"
)]
/// Site admins may only read their own site; any other id is `404`.
pub async fn get_site(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<SiteResponse>> {
    if !ctx.is_platform_admin() && ctx.site_id() != Some(id) {
        return Err(AuthError::NotFound);
    }
    let site = store.find_site(id).await?.ok_or(AuthError::NotFound)?;
    Ok(Json(site.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/sites/{id}",
    params(("id" = Uuid, Path, description = "Site id")),
    responses(
        (status = 200, description = "Site and its members deactivated.", body = SiteResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Platform admin only.", body = ErrorResponse),
        (status = 404, description = "Site not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "sites"
)]
/// Soft delete: the site and every identity bound to it are deactivated, records are kept.
pub async fn delete_site(
    Path(id): Path<Uuid>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<SiteResponse>> {
    let site = store.deactivate_site(id).await?.ok_or(AuthError::NotFound)?;
    info!(site_id = %site.id, "site deactivated");
    Ok(Json(site.into()))
}

#[utoipa::path(
    post,
    path = "/v1/sites/{id}/admins",
    params(("id" = Uuid, Path, description = "Site id")),
    request_body = CreateAdminRequest,
    responses(
        (status = 201, description = "Site admin created.", body = UserResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Platform admin only.", body = ErrorResponse),
        (status = 404, description = "Site not found or inactive.", body = ErrorResponse),
        (status = 409, description = "Email already used in this site.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "sites"
)]
pub async fn create_site_admin(
    Path(id): Path<Uuid>,
    Extension(store): Extension<SharedStore>,
    JsonBody(payload): JsonBody<CreateAdminRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = account::provision_site_admin(
        store.as_ref(),
        id,
        account::Provision {
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            password: payload.password,
            phone: payload.phone,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}
