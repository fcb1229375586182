//! JSON request bodies whose rejections use the API error shape.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::AuthError;

/// Like [`axum::Json`], but a missing, malformed, or mistyped body is a
/// `validation_failed` error (400) instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!("rejected body: {rejection}");
                Err(AuthError::ValidationFailed(rejection_message(&rejection)))
            }
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "expected a JSON body with content-type application/json".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON".to_string(),
        other => other.body_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    fn request(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder
            .body(Body::from(body.to_string()))
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn well_formed_bodies_pass_through() {
        let body = JsonBody::<Named>::from_request(
            request(Some("application/json"), r#"{"name":"Ada"}"#),
            &(),
        )
        .await;
        assert!(matches!(body, Ok(JsonBody(named)) if named.name == "Ada"));
    }

    #[tokio::test]
    async fn missing_fields_are_validation_failures() {
        let body =
            JsonBody::<Named>::from_request(request(Some("application/json"), "{}"), &()).await;
        assert!(matches!(
            body,
            Err(AuthError::ValidationFailed(message)) if message.contains("name")
        ));
    }

    #[tokio::test]
    async fn syntax_and_content_type_errors_are_validation_failures() {
        let broken =
            JsonBody::<Named>::from_request(request(Some("application/json"), "{"), &()).await;
        assert!(matches!(broken, Err(AuthError::ValidationFailed(_))));

        let untyped = JsonBody::<Named>::from_request(request(None, r#"{"name":"Ada"}"#), &()).await;
        assert!(matches!(untyped, Err(AuthError::ValidationFailed(_))));
    }
}
