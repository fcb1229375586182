//! Live site events over a websocket. The stream is scoped by the caller's
//! credential exactly like reads.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::ApiResult;
use crate::{
    auth::{scope, AuthContext},
    events::{EventHub, SiteEvent, Subscription},
};

pub async fn subscribe(
    ws: WebSocketUpgrade,
    Extension(ctx): Extension<AuthContext>,
    Extension(events): Extension<Arc<EventHub>>,
) -> ApiResult<Response> {
    let scope = scope::read_scope(&ctx, None)?;
    let subscription = events.subscribe(scope);
    let user_id = ctx.user_id();
    Ok(ws.on_upgrade(move |socket| async move {
        debug!(%user_id, "event stream opened");
        forward(socket, subscription).await;
        debug!(%user_id, "event stream closed");
    }))
}

async fn forward(mut socket: WebSocket, mut subscription: Subscription) {
    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let Some(frame) = frame(&event) else {
                    continue;
                };
                if socket.send(frame).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn frame(event: &SiteEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json)),
        Err(err) => {
            warn!("Failed to encode site event: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use super::frame;
    use crate::events::{EventKind, SiteEvent};
    use axum::{
        extract::ws::Message,
        http::{Method, StatusCode},
    };
    use uuid::Uuid;

    #[test]
    fn frames_are_camel_case_json() {
        let event = SiteEvent::now(Uuid::new_v4(), EventKind::DuePaid, Uuid::new_v4());
        let Some(Message::Text(text)) = frame(&event) else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["kind"], "due_paid");
        assert_eq!(value["siteId"], event.site_id.to_string());
    }

    #[tokio::test]
    async fn stream_requires_a_credential() -> anyhow::Result<()> {
        let app = TestApp::new();
        let response = app.request(Method::GET, "/v1/events", None, None).await?;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        // Past the guard, the plain request fails the websocket handshake instead.
        let site = app.site("Oak", "OAKS1234").await?;
        let (_, token) = app.resident(&site, "1").await?;
        let response = app.request(Method::GET, "/v1/events", Some(&token), None).await?;
        assert_ne!(response.status, StatusCode::UNAUTHORIZED);
        assert_ne!(response.status, StatusCode::FORBIDDEN);
        Ok(())
    }
}
