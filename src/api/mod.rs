use crate::{
    api::handlers::{events, health, root},
    auth::{account, RoleSet, TokenCodec},
    events::{EventHub, DEFAULT_EVENT_CAPACITY},
    store::{postgres::PgStore, SharedStore},
    APP_USER_AGENT,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, SERVER},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, options},
    Extension, Router,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod guard;
pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Process-wide collaborators handed to every handler as extensions.
#[derive(Clone)]
pub struct Services {
    pub store: SharedStore,
    pub codec: Arc<TokenCodec>,
    pub events: Arc<EventHub>,
}

/// Server settings that do not come from the store.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub frontend_base_url: String,
    /// Seeds a platform admin at startup when both are set.
    pub bootstrap_admin: Option<(String, SecretString)>,
}

/// Assemble the full application: documented routes, the undocumented extras,
/// and the shared layers. CORS is left to the caller.
pub fn app(services: &Services) -> Router {
    // Build the router from OpenAPI-wired routes, then extend it with non-doc routes like `/`,
    // preflight-only `OPTIONS /health`, and the websocket event stream.
    let (router, openapi) = router().split_for_parts();
    router
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi))
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .route(
            "/v1/events",
            get(events::subscribe).route_layer(middleware::from_fn_with_state(
                RoleSet::ANY,
                guard::enforce,
            )),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::if_not_present(
                    SERVER,
                    HeaderValue::from_static(APP_USER_AGENT),
                ))
                .layer(Extension(services.store.clone()))
                .layer(Extension(services.codec.clone()))
                .layer(Extension(services.events.clone())),
        )
}

/// Start the server
/// # Errors
/// Return error if the secret is unusable, the database is unreachable, or the listener fails
pub async fn new(port: u16, dsn: String, settings: ServerSettings) -> Result<()> {
    // A bad secret must stop startup before anything listens.
    let codec = Arc::new(TokenCodec::new(
        &settings.jwt_secret,
        settings.token_ttl_seconds,
    )?);

    let store = PgStore::connect(&dsn).await?;
    let store: SharedStore = Arc::new(store);

    if let Some((email, password)) = &settings.bootstrap_admin {
        let admin = account::ensure_platform_admin(
            store.as_ref(),
            email,
            password.expose_secret().to_string(),
        )
        .await
        .context("Failed to bootstrap platform admin")?;
        info!(user_id = %admin.id, "platform admin ready");
    }

    let events = Arc::new(EventHub::new(DEFAULT_EVENT_CAPACITY));

    let frontend_origin = frontend_origin(&settings.frontend_base_url)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin));

    let app = app(&Services {
        store,
        codec,
        events: events.clone(),
    })
    .layer(cors);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Gracefully shutdown");
            // Closes open event streams so the server can drain.
            events.shutdown();
        })
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;
    use super::handlers::test_support::TestApp;
    use axum::http::{header::SERVER, Method, StatusCode};

    #[test]
    fn frontend_origin_drops_path_and_keeps_port() {
        let origin = frontend_origin("https://app.sitewarden.dev:8443/login?next=1");
        assert_eq!(
            origin.ok().as_ref().and_then(|value| value.to_str().ok()),
            Some("https://app.sitewarden.dev:8443")
        );
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("data:text/plain,hi").is_err());
    }

    #[tokio::test]
    async fn responses_carry_server_and_request_id() -> anyhow::Result<()> {
        let app = TestApp::new();
        let response = app.request(Method::GET, "/", None, None).await?;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.headers.get(SERVER).and_then(|value| value.to_str().ok()),
            Some(crate::APP_USER_AGENT)
        );
        assert!(response.headers.contains_key("x-request-id"));
        Ok(())
    }

    #[tokio::test]
    async fn docs_serve_the_generated_document() -> anyhow::Result<()> {
        let app = TestApp::new();
        let response = app.request(Method::GET, "/docs/openapi.json", None, None).await?;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.json["paths"]["/v1/auth/login"].is_object());
        Ok(())
    }
}
