//! In-process application harness for handler tests.

use anyhow::{anyhow, Result};
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    api::{app, Services},
    auth::{Role, TokenCodec},
    events::EventHub,
    store::{memory::MemoryStore, NewSite, NewUser, Site, Store, User},
};

const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hs256";
// Seeded identities never log in with a password; tokens are issued directly.
const UNUSABLE_HASH: &str = "not-a-password-hash";

pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `Null` when the body is not JSON.
    pub json: Value,
}

pub(crate) struct TestApp {
    pub store: Arc<MemoryStore>,
    pub codec: Arc<TokenCodec>,
    pub events: Arc<EventHub>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let codec = Arc::new(
            TokenCodec::new(&SecretString::from(TEST_SECRET), 3600).expect("test codec"),
        );
        let events = Arc::new(EventHub::default());
        let router = app(&Services {
            store: store.clone(),
            codec: codec.clone(),
            events: events.clone(),
        });
        Self {
            store,
            codec,
            events,
            router,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        Ok(TestResponse {
            status,
            headers,
            body,
            json,
        })
    }

    pub async fn site(&self, name: &str, join_code: &str) -> Result<Site> {
        Ok(self
            .store
            .insert_site(NewSite::for_tests(name, join_code))
            .await?)
    }

    pub async fn platform_admin(&self) -> Result<(User, String)> {
        let email = format!("root-{}@x.com", Uuid::new_v4().simple());
        self.seed(email, Role::PlatformAdmin, None, None).await
    }

    pub async fn site_admin(&self, site: &Site) -> Result<(User, String)> {
        let email = format!("admin-{}@x.com", Uuid::new_v4().simple());
        self.seed(email, Role::SiteAdmin, Some(site.id), None).await
    }

    pub async fn resident(&self, site: &Site, unit: &str) -> Result<(User, String)> {
        let email = format!("resident-{unit}@x.com");
        self.seed(email, Role::Resident, Some(site.id), Some(unit))
            .await
    }

    async fn seed(
        &self,
        email: String,
        role: Role,
        site_id: Option<Uuid>,
        unit: Option<&str>,
    ) -> Result<(User, String)> {
        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash: UNUSABLE_HASH.to_string(),
                role,
                site_id,
                first_name: "Test".to_string(),
                last_name: role.as_str().to_string(),
                phone: None,
                building: None,
                unit: unit.map(str::to_string),
            })
            .await?;
        let ctx = user
            .auth_context()
            .ok_or_else(|| anyhow!("seeded user breaks the role/site invariant"))?;
        let token = self.codec.issue(&ctx)?.token;
        Ok((user, token))
    }
}
