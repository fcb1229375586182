//! Rows as the store returns them, plus insert payloads.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::auth::{AuthContext, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
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
    /// Active residents allowed per `{building, unit}`.
    pub unit_capacity: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSite {
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
}

#[cfg(test)]
impl NewSite {
    pub(crate) fn for_tests(name: &str, join_code: &str) -> Self {
        Self {
            join_code: join_code.to_string(),
            name: name.to_string(),
            address: "1 Test Street".to_string(),
            city: "Testville".to_string(),
            building_count: 2,
            unit_count: 40,
            monthly_due_cents: 15_000,
            contact_email: Some("office@site.test".to_string()),
            contact_phone: Some("+90 555 000 0000".to_string()),
            unit_capacity: 1,
        }
    }
}

/// A stored identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
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

impl User {
    /// Context a credential for this identity would carry; `None` if the row
    /// breaks the role/site invariant.
    #[must_use]
    pub fn auth_context(&self) -> Option<AuthContext> {
        AuthContext::new(self.id, self.email.clone(), self.role, self.site_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    /// Already normalized with [`super::normalize_email`].
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub site_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Already normalized with [`super::normalize_unit_label`].
    pub building: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub id: Uuid,
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    /// Must match the `complaint_status` values in `sql/schema.sql`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complaint {
    pub id: Uuid,
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Due {
    pub id: Uuid,
    pub site_id: Uuid,
    pub user_id: Uuid,
    /// Billing month, `YYYY-MM`.
    pub period: String,
    pub amount_cents: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDue {
    pub site_id: Uuid,
    pub user_id: Uuid,
    pub period: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    pub id: Uuid,
    pub site_id: Uuid,
    pub category: String,
    pub description: String,
    pub amount_cents: i64,
    pub incurred_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub site_id: Uuid,
    pub category: String,
    pub description: String,
    pub amount_cents: i64,
    pub incurred_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub id: Uuid,
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.closes_at.map_or(true, |closes_at| now < closes_at)
    }
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub site_id: Uuid,
    pub author_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub closes_at: Option<DateTime<Utc>>,
}
