//! Site votes: admins open a question, residents cast one ballot each.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{
    body::JsonBody,
    active_site, required_text,
    types::{
        BallotRequest, CreateVoteRequest, ErrorResponse, OptionTally, SiteFilter,
        VoteResponse, VoteResultsResponse,
    },
    ApiResult,
};
use crate::{
    auth::{scope, AuthContext, AuthError},
    events::{EventHub, EventKind, SiteEvent},
    store::{NewVote, SharedStore},
};

#[utoipa::path(
    get,
    path = "/v1/votes",
    params(SiteFilter),
    responses(
        (status = 200, description = "Votes, newest first.", body = [VoteResponse]),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "votes"
)]
pub async fn list_votes(
    Query(filter): Query<SiteFilter>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<VoteResponse>>> {
    let scope = scope::read_scope(&ctx, filter.site_id)?;
    let rows = store.list_votes(scope).await?;
    Ok(Json(rows.into_iter().map(VoteResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/votes",
    request_body = CreateVoteRequest,
    responses(
        (status = 201, description = "Vote opened.", body = VoteResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
        (status = 404, description = "Site not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "votes"
)]
pub async fn create_vote(
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
    JsonBody(payload): JsonBody<CreateVoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let site_id = scope::write_target(&ctx, payload.site_id)?;
    let question = required_text(&payload.question, "question")?;
    let options: Vec<String> = payload
        .options
        .iter()
        .map(|option| option.trim())
        .filter(|option| !option.is_empty())
        .map(str::to_string)
        .collect();
    if options.len() < 2 {
        return Err(AuthError::validation("a vote needs at least two options"));
    }
    if payload.closes_at.is_some_and(|closes_at| closes_at <= Utc::now()) {
        return Err(AuthError::validation("closesAt must be in the future"));
    }
    active_site(store.as_ref(), site_id).await?;

    let row = store
        .insert_vote(NewVote {
            site_id,
            author_id: ctx.user_id(),
            question,
            options,
            closes_at: payload.closes_at,
        })
        .await?;
    events.publish(SiteEvent::now(site_id, EventKind::VoteCreated, row.id));
    Ok((StatusCode::CREATED, Json(VoteResponse::from(row))))
}

#[utoipa::path(
    post,
    path = "/v1/votes/{id}/ballots",
    params(("id" = Uuid, Path, description = "Vote id")),
    request_body = BallotRequest,
    responses(
        (status = 204, description = "Ballot recorded."),
        (status = 400, description = "Vote closed or choice out of range.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Residents only.", body = ErrorResponse),
        (status = 404, description = "Not found in the caller's site.", body = ErrorResponse),
        (status = 409, description = "Already voted.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "votes"
)]
pub async fn cast_ballot(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
    JsonBody(payload): JsonBody<BallotRequest>,
) -> ApiResult<StatusCode> {
    let scope = scope::read_scope(&ctx, None)?;
    let vote = store.find_vote(scope, id).await?.ok_or(AuthError::NotFound)?;
    if !vote.is_open_at(Utc::now()) {
        return Err(AuthError::validation("this vote is closed"));
    }
    let choice = i32::try_from(payload.choice)
        .ok()
        .filter(|_| payload.choice < vote.options.len())
        .ok_or_else(|| AuthError::validation("choice is out of range"))?;

    store.insert_ballot(vote.id, ctx.user_id(), choice).await?;
    debug!(vote_id = %vote.id, "ballot cast");
    events.publish(SiteEvent::now(vote.site_id, EventKind::BallotCast, vote.id));
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/votes/{id}/results",
    params(("id" = Uuid, Path, description = "Vote id")),
    responses(
        (status = 200, description = "Ballot count per option.", body = VoteResultsResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 404, description = "Not visible to the caller.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "votes"
)]
pub async fn vote_results(
    Path(id): Path<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<VoteResultsResponse>> {
    let scope = scope::read_scope(&ctx, None)?;
    let vote = store.find_vote(scope, id).await?.ok_or(AuthError::NotFound)?;
    let counts = store.tally(vote.id, vote.options.len()).await?;
    let open = vote.is_open_at(Utc::now());

    let options: Vec<OptionTally> = vote
        .options
        .into_iter()
        .zip(counts)
        .map(|(option, ballots)| OptionTally { option, ballots })
        .collect();
    Ok(Json(VoteResultsResponse {
        vote_id: vote.id,
        question: vote.question,
        open,
        total: options.iter().map(|tally| tally.ballots).sum(),
        options,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    async fn open_vote(app: &TestApp, token: &str) -> anyhow::Result<String> {
        let response = app
            .request(
                Method::POST,
                "/v1/votes",
                Some(token),
                Some(json!({"question": "Paint the lobby?", "options": ["yes", "no", " "]})),
            )
            .await?;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.json["options"], json!(["yes", "no"]));
        Ok(response.json["id"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test]
    async fn residents_vote_once_and_results_add_up() -> anyhow::Result<()> {
        let app = TestApp::new();
        let site = app.site("Oak", "OAKS1234").await?;
        let (_, admin) = app.site_admin(&site).await?;
        let (_, alice) = app.resident(&site, "1").await?;
        let (_, bob) = app.resident(&site, "2").await?;
        let id = open_vote(&app, &admin).await?;
        let ballots = format!("/v1/votes/{id}/ballots");

        let first = app
            .request(Method::POST, &ballots, Some(&alice), Some(json!({"choice": 0})))
            .await?;
        assert_eq!(first.status, StatusCode::NO_CONTENT);
        let again = app
            .request(Method::POST, &ballots, Some(&alice), Some(json!({"choice": 1})))
            .await?;
        assert_eq!(again.status, StatusCode::CONFLICT);
        let out_of_range = app
            .request(Method::POST, &ballots, Some(&bob), Some(json!({"choice": 2})))
            .await?;
        assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);
        app.request(Method::POST, &ballots, Some(&bob), Some(json!({"choice": 1})))
            .await?;
        let by_admin = app
            .request(Method::POST, &ballots, Some(&admin), Some(json!({"choice": 0})))
            .await?;
        assert_eq!(by_admin.status, StatusCode::FORBIDDEN);

        let results = app
            .request(Method::GET, &format!("/v1/votes/{id}/results"), Some(&alice), None)
            .await?;
        assert_eq!(results.status, StatusCode::OK);
        assert_eq!(results.json["total"], 2);
        assert_eq!(results.json["options"][0]["ballots"], 1);
        assert_eq!(results.json["options"][1]["option"], "no");
        Ok(())
    }

    #[tokio::test]
    async fn votes_from_other_sites_are_invisible() -> anyhow::Result<()> {
        let app = TestApp::new();
        let own = app.site("Oak", "OAKS1234").await?;
        let other = app.site("Elm", "ELMS5678").await?;
        let (_, other_admin) = app.site_admin(&other).await?;
        let (_, resident) = app.resident(&own, "1").await?;
        let id = open_vote(&app, &other_admin).await?;

        let ballot = app
            .request(
                Method::POST,
                &format!("/v1/votes/{id}/ballots"),
                Some(&resident),
                Some(json!({"choice": 0})),
            )
            .await?;
        assert_eq!(ballot.status, StatusCode::NOT_FOUND);

        let listed = app.request(Method::GET, "/v1/votes", Some(&resident), None).await?;
        assert_eq!(listed.json.as_array().map(Vec::len), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_bad_vote_definitions() -> anyhow::Result<()> {
        let app = TestApp::new();
        let site = app.site("Oak", "OAKS1234").await?;
        let (_, admin) = app.site_admin(&site).await?;

        let single = app
            .request(
                Method::POST,
                "/v1/votes",
                Some(&admin),
                Some(json!({"question": "Only one?", "options": ["yes"]})),
            )
            .await?;
        assert_eq!(single.status, StatusCode::BAD_REQUEST);

        let past = Utc::now() - Duration::hours(1);
        let closed = app
            .request(
                Method::POST,
                "/v1/votes",
                Some(&admin),
                Some(json!({"question": "Too late?", "options": ["yes", "no"], "closesAt": past})),
            )
            .await?;
        assert_eq!(closed.status, StatusCode::BAD_REQUEST);
        Ok(())
    }
}
