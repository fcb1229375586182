//! Site announcements: everyone in the site reads, admins write.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    body::JsonBody,
    active_site, required_text,
    types::{AnnouncementResponse, CreateAnnouncementRequest, ErrorResponse, SiteFilter},
    ApiResult,
};
use crate::{
    auth::{scope, AuthContext, AuthError},
    events::{EventHub, EventKind, SiteEvent},
    store::{NewAnnouncement, SharedStore},
};

#[utoipa::path(
    get,
    path = "/v1/announcements",
    params(SiteFilter),
    responses(
        (status = 200, description = "Announcements, newest first.", body = [AnnouncementResponse]),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "announcements"
)]
pub async fn list_announcements(
    Query(filter): Query<SiteFilter>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<AnnouncementResponse>>> {
    let scope = scope::read_scope(&ctx, filter.site_id)?;
    let rows = store.list_announcements(scope).await?;
    Ok(Json(rows.into_iter().map(AnnouncementResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/announcements",
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 201, description = "Announcement published.", body = AnnouncementResponse),
        (status = 400, description = "Invalid input, or platform admin without siteId.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "announcements"
)]
pub async fn create_announcement(
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
    JsonBody(payload): JsonBody<CreateAnnouncementRequest>,
) -> ApiResult<impl IntoResponse> {
    let site_id = scope::write_target(&ctx, payload.site_id)?;
    let title = required_text(&payload.title, "title")?;
    let body = required_text(&payload.body, "body")?;
    active_site(store.as_ref(), site_id).await?;

    let row = store
        .insert_announcement(NewAnnouncement {
            site_id,
            author_id: ctx.user_id(),
            title,
            body,
        })
        .await?;
    events.publish(SiteEvent::now(
        site_id,
        EventKind::AnnouncementCreated,
        row.id,
    ));
    Ok((StatusCode::CREATED, Json(AnnouncementResponse::from(row))))
}

#[utoipa::path(
    delete,
    path = "/v1/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement id")),
    responses(
        (status = 204, description = "Announcement removed."),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
        (status = 404, description = "Not found in the caller's site.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "announcements"
)]
pub async fn delete_announcement(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
) -> ApiResult<StatusCode> {
    let scope = scope::read_scope(&ctx, None)?;
    if !store.delete_announcement(scope, id).await? {
        return Err(AuthError::NotFound);
    }
    if let Some(site_id) = ctx.site_id() {
        events.publish(SiteEvent::now(site_id, EventKind::AnnouncementDeleted, id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use crate::{auth::SiteScope, events::EventKind};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn residents_read_but_cannot_post() -> anyhow::Result<()> {
        let app = TestApp::new();
        let site = app.site("Oak", "OAKS1234").await?;
        let (_, admin) = app.site_admin(&site).await?;
        let (_, resident) = app.resident(&site, "1").await?;

        let body = json!({"title": "Water cut", "body": "Tuesday 10:00-12:00"});
        let denied = app
            .request(Method::POST, "/v1/announcements", Some(&resident), Some(body.clone()))
            .await?;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);

        let created = app
            .request(Method::POST, "/v1/announcements", Some(&admin), Some(body))
            .await?;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.json["siteId"], site.id.to_string());

        let listed = app
            .request(Method::GET, "/v1/announcements", Some(&resident), None)
            .await?;
        assert_eq!(listed.status, StatusCode::OK);
        assert_eq!(listed.json.as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn site_admin_cannot_write_into_another_site() -> anyhow::Result<()> {
        let app = TestApp::new();
        let own = app.site("Oak", "OAKS1234").await?;
        let other = app.site("Elm", "ELMS5678").await?;
        let (_, admin) = app.site_admin(&own).await?;

        let created = app
            .request(
                Method::POST,
                "/v1/announcements",
                Some(&admin),
                Some(json!({"siteId": other.id, "title": "Hi", "body": "there"})),
            )
            .await?;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.json["siteId"], own.id.to_string());
        Ok(())
    }

    #[tokio::test]
    async fn platform_admin_must_name_the_site() -> anyhow::Result<()> {
        let app = TestApp::new();
        let (_, admin) = app.platform_admin().await?;
        let site = app.site("Oak", "OAKS1234").await?;

        let missing = app
            .request(
                Method::POST,
                "/v1/announcements",
                Some(&admin),
                Some(json!({"title": "Hi", "body": "there"})),
            )
            .await?;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);

        let named = app
            .request(
                Method::POST,
                "/v1/announcements",
                Some(&admin),
                Some(json!({"siteId": site.id, "title": "Hi", "body": "there"})),
            )
            .await?;
        assert_eq!(named.status, StatusCode::CREATED);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_foreign_announcement_is_not_found() -> anyhow::Result<()> {
        let app = TestApp::new();
        let own = app.site("Oak", "OAKS1234").await?;
        let other = app.site("Elm", "ELMS5678").await?;
        let (_, own_admin) = app.site_admin(&own).await?;
        let (_, other_admin) = app.site_admin(&other).await?;

        let created = app
            .request(
                Method::POST,
                "/v1/announcements",
                Some(&other_admin),
                Some(json!({"title": "Elm only", "body": "..."})),
            )
            .await?;
        let id = created.json["id"].as_str().unwrap_or_default().to_string();

        let guessed = app
            .request(Method::DELETE, &format!("/v1/announcements/{id}"), Some(&own_admin), None)
            .await?;
        assert_eq!(guessed.status, StatusCode::NOT_FOUND);

        let owned = app
            .request(Method::DELETE, &format!("/v1/announcements/{id}"), Some(&other_admin), None)
            .await?;
        assert_eq!(owned.status, StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn publishing_notifies_only_the_same_site() -> anyhow::Result<()> {
        let app = TestApp::new();
        let site = app.site("Oak", "OAKS1234").await?;
        let other = app.site("Elm", "ELMS5678").await?;
        let (_, admin) = app.site_admin(&site).await?;
        let mut own_feed = app.events.subscribe(SiteScope::Site(site.id));
        let mut other_feed = app.events.subscribe(SiteScope::Site(other.id));

        app.request(
            Method::POST,
            "/v1/announcements",
            Some(&admin),
            Some(json!({"title": "Lift service", "body": "Friday"})),
        )
        .await?;

        let event = own_feed.next().await;
        assert_eq!(event.map(|event| event.kind), Some(EventKind::AnnouncementCreated));
        app.events.shutdown();
        assert!(other_feed.next().await.is_none());
        Ok(())
    }
}
