//! Persistence boundary.
//!
//! Every site-owned query takes a [`SiteScope`] built by `auth::scope`, so the
//! tenant filter is applied by the store and never re-derived from request
//! input. Uniqueness rules (join codes, `{site, email}`, unit capacity, one
//! ballot per vote) are enforced here: by unique indexes and row locks in
//! Postgres, and under a single write lock in memory.

pub mod memory;
mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::SiteScope;

pub use models::{
    Announcement, Complaint, ComplaintStatus, Due, Expense, NewAnnouncement, NewComplaint, NewDue,
    NewExpense, NewSite, NewUser, NewVote, Site, User, Vote,
};

/// Uniqueness rules a write can trip over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    JoinCode,
    UserEmail,
    UnitCapacity,
    DuePeriod,
    Ballot,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    Conflict(Constraint),

    #[error("could not find a free {0}")]
    Exhausted(&'static str),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type SharedStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap liveness probe for `/health`.
    async fn ping(&self) -> StoreResult<()>;

    // Sites

    async fn insert_site(&self, site: NewSite) -> StoreResult<Site>;
    async fn find_site(&self, id: Uuid) -> StoreResult<Option<Site>>;
    /// Exact match on the normalized (upper-case) code, active or not.
    async fn find_site_by_code(&self, code: &str) -> StoreResult<Option<Site>>;
    async fn list_sites(&self) -> StoreResult<Vec<Site>>;
    async fn join_code_exists(&self, code: &str) -> StoreResult<bool>;
    /// Soft-deletes the site and every identity bound to it.
    async fn deactivate_site(&self, id: Uuid) -> StoreResult<Option<Site>>;

    // Identities

    /// Inserts an identity without any occupancy check.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    /// Inserts a resident if `{site, building, unit}` has fewer than
    /// `unit_capacity` active residents, atomically with the count.
    async fn insert_resident(&self, user: NewUser, unit_capacity: i32) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_site_user_by_email(&self, site_id: Uuid, email: &str)
        -> StoreResult<Option<User>>;
    async fn find_platform_admin_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Site-bound identities only; platform admins are never listed.
    async fn list_members(&self, scope: SiteScope) -> StoreResult<Vec<User>>;
    async fn set_user_active(
        &self,
        scope: SiteScope,
        id: Uuid,
        active: bool,
    ) -> StoreResult<Option<User>>;
    async fn set_password_hash(
        &self,
        scope: SiteScope,
        id: Uuid,
        password_hash: &str,
    ) -> StoreResult<Option<User>>;

    // Announcements

    async fn insert_announcement(&self, announcement: NewAnnouncement)
        -> StoreResult<Announcement>;
    async fn list_announcements(&self, scope: SiteScope) -> StoreResult<Vec<Announcement>>;
    async fn delete_announcement(&self, scope: SiteScope, id: Uuid) -> StoreResult<bool>;

    // Complaints

    async fn insert_complaint(&self, complaint: NewComplaint) -> StoreResult<Complaint>;
    async fn list_complaints(
        &self,
        scope: SiteScope,
        author_id: Option<Uuid>,
    ) -> StoreResult<Vec<Complaint>>;
    async fn find_complaint(&self, scope: SiteScope, id: Uuid) -> StoreResult<Option<Complaint>>;
    async fn set_complaint_status(
        &self,
        scope: SiteScope,
        id: Uuid,
        status: ComplaintStatus,
    ) -> StoreResult<Option<Complaint>>;

    // Dues

    async fn insert_due(&self, due: NewDue) -> StoreResult<Due>;
    async fn list_dues(&self, scope: SiteScope, user_id: Option<Uuid>) -> StoreResult<Vec<Due>>;
    async fn mark_due_paid(
        &self,
        scope: SiteScope,
        id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<Due>>;

    // Expenses

    async fn insert_expense(&self, expense: NewExpense) -> StoreResult<Expense>;
    async fn list_expenses(&self, scope: SiteScope) -> StoreResult<Vec<Expense>>;

    // Votes

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote>;
    async fn list_votes(&self, scope: SiteScope) -> StoreResult<Vec<Vote>>;
    async fn find_vote(&self, scope: SiteScope, id: Uuid) -> StoreResult<Option<Vote>>;
    async fn insert_ballot(&self, vote_id: Uuid, user_id: Uuid, choice: i32) -> StoreResult<()>;
    /// Ballot count per option index, `options_len` entries long.
    async fn tally(&self, vote_id: Uuid, options_len: usize) -> StoreResult<Vec<i64>>;
}

/// Case-folded email used for lookups and uniqueness.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Case-folded unit label; empty strings collapse to `None`.
#[must_use]
pub fn normalize_unit_label(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_uppercase)
}
