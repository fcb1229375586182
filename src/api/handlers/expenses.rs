//! Site expense ledger.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{
    body::JsonBody,
    active_site, non_negative, required_text,
    types::{CreateExpenseRequest, ErrorResponse, ExpenseResponse, SiteFilter},
    ApiResult,
};
use crate::{
    auth::{scope, AuthContext},
    events::{EventHub, EventKind, SiteEvent},
    store::{NewExpense, SharedStore},
};

#[utoipa::path(
    get,
    path = "/v1/expenses",
    params(SiteFilter),
    responses(
        (status = 200, description = "Expenses, newest first.", body = [ExpenseResponse]),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "expenses"
)]
pub async fn list_expenses(
    Query(filter): Query<SiteFilter>,
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<ExpenseResponse>>> {
    let scope = scope::read_scope(&ctx, filter.site_id)?;
    let rows = store.list_expenses(scope).await?;
    Ok(Json(rows.into_iter().map(ExpenseResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/expenses",
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense recorded.", body = ExpenseResponse),
        (status = 400, description = "Invalid input.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential.", body = ErrorResponse),
        (status = 403, description = "Admins only.", body = ErrorResponse),
        (status = 404, description = "Site not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "expenses"
)]
pub async fn create_expense(
    Extension(ctx): Extension<AuthContext>,
    Extension(store): Extension<SharedStore>,
    Extension(events): Extension<Arc<EventHub>>,
    JsonBody(payload): JsonBody<CreateExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    let site_id = scope::write_target(&ctx, payload.site_id)?;
    let category = required_text(&payload.category, "category")?;
    let amount_cents = non_negative(payload.amount_cents, "amountCents")?;
    active_site(store.as_ref(), site_id).await?;

    let row = store
        .insert_expense(NewExpense {
            site_id,
            category,
            description: payload.description.trim().to_string(),
            amount_cents,
            incurred_on: payload.incurred_on,
        })
        .await?;
    events.publish(SiteEvent::now(site_id, EventKind::ExpenseCreated, row.id));
    Ok((StatusCode::CREATED, Json(ExpenseResponse::from(row))))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn admins_record_and_everyone_reads() -> anyhow::Result<()> {
        let app = TestApp::new();
        let site = app.site("Oak", "OAKS1234").await?;
        let other = app.site("Elm", "ELMS5678").await?;
        let (_, admin) = app.site_admin(&site).await?;
        let (_, other_admin) = app.site_admin(&other).await?;
        let (_, resident) = app.resident(&site, "1").await?;

        let body = json!({"category": "cleaning", "amountCents": 120_000, "incurredOn": "2024-05-01"});
        let created = app
            .request(Method::POST, "/v1/expenses", Some(&admin), Some(body.clone()))
            .await?;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.json["description"], "");

        let denied = app
            .request(Method::POST, "/v1/expenses", Some(&resident), Some(body))
            .await?;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);

        let listed = app.request(Method::GET, "/v1/expenses", Some(&resident), None).await?;
        assert_eq!(listed.json.as_array().map(Vec::len), Some(1));
        assert_eq!(listed.json[0]["category"], "cleaning");

        let elsewhere = app
            .request(Method::GET, "/v1/expenses", Some(&other_admin), None)
            .await?;
        assert_eq!(elsewhere.json.as_array().map(Vec::len), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_negative_amounts() -> anyhow::Result<()> {
        let app = TestApp::new();
        let site = app.site("Oak", "OAKS1234").await?;
        let (_, admin) = app.site_admin(&site).await?;
        let response = app
            .request(
                Method::POST,
                "/v1/expenses",
                Some(&admin),
                Some(json!({"category": "repairs", "amountCents": -5, "incurredOn": "2024-05-01"})),
            )
            .await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        Ok(())
    }
}
