//! Request/response types for the HTTP API.
//!
//! These payloads are shared between handlers and `OpenAPI` generation. Bodies
//! are camelCase; stored rows are converted with `From` so password hashes
//! never reach a response.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{
    account::{Authenticated, Session},
    Role,
};
use crate::store::{Announcement, Complaint, Due, Expense, Site, User, Vote};

/// Optional site filter; only honored for the platform admin.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SiteFilter {
    pub site_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "joinCode")]
    pub tenant_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(alias = "joinCode")]
    pub tenant_code: String,
    #[serde(default)]
    pub building: Option<String>,
    pub unit: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
    #[serde(default, alias = "joinCode")]
    pub tenant_code: Option<String>,
}

/// Same shape whether or not the email is known.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub site_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub building: Option<String>,
    pub unit: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            site_id: user.site_id,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            building: user.building,
            unit: user.unit,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

impl From<Authenticated> for AuthResponse {
    fn from(authenticated: Authenticated) -> Self {
        Self {
            token: authenticated.token.token,
            expires_at: authenticated.token.expires_at,
            user: authenticated.user.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserResponse,
    pub role: Role,
    pub site: Option<SiteResponse>,
    /// `platform` or `site`.
    pub dashboard: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            role: session.user.role,
            user: session.user.into(),
            site: session.site.map(SiteResponse::from),
            dashboard: session.dashboard.as_str().to_string(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    #[serde(default = "default_building_count")]
    pub building_count: i32,
    #[serde(default)]
    pub unit_count: i32,
    #[serde(default)]
    pub monthly_due_cents: i64,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    /// Active residents allowed per unit; defaults to 1.
    #[serde(default)]
    pub unit_capacity: Option<i32>,
}

const fn default_building_count() -> i32 {
    1
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteResponse {
    pub id: Uuid,
    pub join_code: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub building_count: i32,
    pub unit_count: i32,
    pub monthly_due_cents: i64,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub unit_capacity: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Site> for SiteResponse {
    fn from(site: Site) -> Self {
        Self {
            id: site.id,
            join_code: site.join_code,
            name: site.name,
            address: site.address,
            city: site.city,
            building_count: site.building_count,
            unit_count: site.unit_count,
            monthly_due_cents: site.monthly_due_cents,
            contact_email: site.contact_email,
            contact_phone: site.contact_phone,
            unit_capacity: site.unit_capacity,
            active: site.active,
            created_at: site.created_at,
        }
    }
}

/// What an unauthenticated visitor may learn from a join code.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteLookupResponse {
    pub name: String,
    pub city: String,
    pub building_count: i32,
    pub unit_count: i32,
}

impl From<Site> for SiteLookupResponse {
    fn from(site: Site) -> Self {
        Self {
            name: site.name,
            city: site.city,
            building_count: site.building_count,
            unit_count: site.unit_count,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    #[serde(default)]
    pub site_id: Option<Uuid>,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementResponse {
    pub id: Uuid,
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<Announcement> for AnnouncementResponse {
    fn from(row: Announcement) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            author_id: row.author_id,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateComplaintRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateComplaintStatusRequest {
    /// `open`, `in_progress`, or `resolved`.
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintResponse {
    pub id: Uuid,
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Complaint> for ComplaintResponse {
    fn from(row: Complaint) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            author_id: row.author_id,
            title: row.title,
            description: row.description,
            status: row.status.as_str().to_string(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDueRequest {
    #[serde(default)]
    pub site_id: Option<Uuid>,
    pub user_id: Uuid,
    /// Billing month, `YYYY-MM`.
    pub period: String,
    /// Defaults to the site's monthly due.
    #[serde(default)]
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DueResponse {
    pub id: Uuid,
    pub site_id: Uuid,
    pub user_id: Uuid,
    pub period: String,
    pub amount_cents: i64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Due> for DueResponse {
    fn from(row: Due) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            user_id: row.user_id,
            period: row.period,
            amount_cents: row.amount_cents,
            paid: row.paid_at.is_some(),
            paid_at: row.paid_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    #[serde(default)]
    pub site_id: Option<Uuid>,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub amount_cents: i64,
    pub incurred_on: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseResponse {
    pub id: Uuid,
    pub site_id: Uuid,
    pub category: String,
    pub description: String,
    pub amount_cents: i64,
    pub incurred_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<Expense> for ExpenseResponse {
    fn from(row: Expense) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            category: row.category,
            description: row.description,
            amount_cents: row.amount_cents,
            incurred_on: row.incurred_on,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoteRequest {
    #[serde(default)]
    pub site_id: Option<Uuid>,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BallotRequest {
    /// Zero-based index into the vote's options.
    pub choice: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub id: Uuid,
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub closes_at: Option<DateTime<Utc>>,
    pub open: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Vote> for VoteResponse {
    fn from(row: Vote) -> Self {
        Self {
            open: row.is_open_at(Utc::now()),
            id: row.id,
            site_id: row.site_id,
            author_id: row.author_id,
            question: row.question,
            options: row.options,
            closes_at: row.closes_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub option: String,
    pub ballots: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteResultsResponse {
    pub vote_id: Uuid,
    pub question: String,
    pub open: bool,
    pub total: i64,
    pub options: Vec<OptionTally>,
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `unit_taken`.
    pub error: String,
    pub message: String,
}
