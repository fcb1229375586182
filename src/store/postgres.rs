//! Postgres-backed store.
//!
//! Schema lives in `sql/schema.sql`. Uniqueness is enforced by the indexes
//! there; violations are mapped back to [`Constraint`] by constraint name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use std::time::Duration;
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use super::{
    Announcement, Complaint, ComplaintStatus, Constraint, Due, Expense, NewAnnouncement,
    NewComplaint, NewDue, NewExpense, NewSite, NewUser, NewVote, Site, Store, StoreError,
    StoreResult, User, Vote,
};
use crate::auth::{Role, SiteScope};

const SITE_COLUMNS: &str = "id, join_code, name, address, city, building_count, unit_count, \
    monthly_due_cents, contact_email, contact_phone, unit_capacity, active, created_at";

const USER_COLUMNS: &str = "id, email, password_hash, role, site_id, first_name, last_name, \
    phone, building, unit, active, created_at";

const COMPLAINT_COLUMNS: &str =
    "id, site_id, author_id, title, description, status, created_at, updated_at";

const DUE_COLUMNS: &str = "id, site_id, user_id, period, amount_cents, paid_at, created_at";

const VOTE_COLUMNS: &str = "id, site_id, author_id, question, options, closes_at, created_at";

fn query_span(operation: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation
    )
}

/// Postgres unique violations become [`StoreError::Conflict`]; everything else
/// is passed through.
fn classify(err: sqlx::Error) -> StoreError {
    let constraint = match &err {
        sqlx::Error::Database(db_err) if db_err.code().is_some_and(|code| code == "23505") => {
            match db_err.constraint() {
                Some("sites_join_code_key") => Some(Constraint::JoinCode),
                Some("users_site_email_key" | "users_platform_email_key") => {
                    Some(Constraint::UserEmail)
                }
                Some("dues_site_user_period_key") => Some(Constraint::DuePeriod),
                Some("ballots_pkey") => Some(Constraint::Ballot),
                _ => None,
            }
        }
        _ => None,
    };
    constraint.map_or(StoreError::Database(err), StoreError::Conflict)
}

fn site_from_row(row: &PgRow) -> StoreResult<Site> {
    Ok(Site {
        id: row.try_get("id")?,
        join_code: row.try_get("join_code")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        building_count: row.try_get("building_count")?,
        unit_count: row.try_get("unit_count")?,
        monthly_due_cents: row.try_get("monthly_due_cents")?,
        contact_email: row.try_get("contact_email")?,
        contact_phone: row.try_get("contact_phone")?,
        unit_capacity: row.try_get("unit_capacity")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    let role = Role::parse(&role).ok_or_else(|| StoreError::Corrupt(format!("role {role}")))?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        site_id: row.try_get("site_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        building: row.try_get("building")?,
        unit: row.try_get("unit")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn announcement_from_row(row: &PgRow) -> StoreResult<Announcement> {
    Ok(Announcement {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
    })
}

fn complaint_from_row(row: &PgRow) -> StoreResult<Complaint> {
    let status: String = row.try_get("status")?;
    let status = ComplaintStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("complaint status {status}")))?;
    Ok(Complaint {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn due_from_row(row: &PgRow) -> StoreResult<Due> {
    Ok(Due {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        user_id: row.try_get("user_id")?,
        period: row.try_get("period")?,
        amount_cents: row.try_get("amount_cents")?,
        paid_at: row.try_get("paid_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn expense_from_row(row: &PgRow) -> StoreResult<Expense> {
    Ok(Expense {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        amount_cents: row.try_get("amount_cents")?,
        incurred_on: row.try_get("incurred_on")?,
        created_at: row.try_get("created_at")?,
    })
}

fn vote_from_row(row: &PgRow) -> StoreResult<Vote> {
    Ok(Vote {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        author_id: row.try_get("author_id")?,
        question: row.try_get("question")?,
        options: row.try_get("options")?,
        closes_at: row.try_get("closes_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn collect<T>(rows: &[PgRow], map: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_users(&self, query: &str, bind: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query(query)
            .bind(bind)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(info_span!("db.ping", db.system = "postgresql", db.operation = "PING"))
            .await?;
        Ok(())
    }

    async fn insert_site(&self, site: NewSite) -> StoreResult<Site> {
        let query = format!(
            "INSERT INTO sites (join_code, name, address, city, building_count, unit_count, \
             monthly_due_cents, contact_email, contact_phone, unit_capacity) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {SITE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&site.join_code)
            .bind(&site.name)
            .bind(&site.address)
            .bind(&site.city)
            .bind(site.building_count)
            .bind(site.unit_count)
            .bind(site.monthly_due_cents)
            .bind(&site.contact_email)
            .bind(&site.contact_phone)
            .bind(site.unit_capacity)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .map_err(classify)?;
        site_from_row(&row)
    }

    async fn find_site(&self, id: Uuid) -> StoreResult<Option<Site>> {
        let query = format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        row.as_ref().map(site_from_row).transpose()
    }

    async fn find_site_by_code(&self, code: &str) -> StoreResult<Option<Site>> {
        let query = format!("SELECT {SITE_COLUMNS} FROM sites WHERE join_code = $1");
        let row = sqlx::query(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        row.as_ref().map(site_from_row).transpose()
    }

    async fn list_sites(&self) -> StoreResult<Vec<Site>> {
        let query = format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY created_at DESC");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        collect(&rows, site_from_row)
    }

    async fn join_code_exists(&self, code: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM sites WHERE join_code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn deactivate_site(&self, id: Uuid) -> StoreResult<Option<Site>> {
        let mut tx = self.pool.begin().await?;
        let query = format!("UPDATE sites SET active = FALSE WHERE id = $1 RETURNING {SITE_COLUMNS}");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("UPDATE"))
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        sqlx::query("UPDATE users SET active = FALSE WHERE site_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE"))
            .await?;
        tx.commit().await?;
        site_from_row(&row).map(Some)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let query = format!(
            "INSERT INTO users (email, password_hash, role, site_id, first_name, last_name, \
             phone, building, unit) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.site_id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(&user.building)
            .bind(&user.unit)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .map_err(classify)?;
        user_from_row(&row)
    }

    async fn insert_resident(&self, user: NewUser, unit_capacity: i32) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        // Serializes registrations per site so the count below cannot race.
        sqlx::query("SELECT id FROM sites WHERE id = $1 FOR UPDATE")
            .bind(user.site_id)
            .execute(&mut *tx)
            .instrument(query_span("SELECT"))
            .await?;

        let occupants: i64 = sqlx::query(
            "SELECT COUNT(*) FROM users WHERE site_id = $1 AND role = 'resident' AND active \
             AND building IS NOT DISTINCT FROM $2 AND unit IS NOT DISTINCT FROM $3",
        )
        .bind(user.site_id)
        .bind(&user.building)
        .bind(&user.unit)
        .fetch_one(&mut *tx)
        .instrument(query_span("SELECT"))
        .await?
        .try_get(0)?;
        if occupants >= i64::from(unit_capacity) {
            return Err(StoreError::Conflict(Constraint::UnitCapacity));
        }

        let query = format!(
            "INSERT INTO users (email, password_hash, role, site_id, first_name, last_name, \
             phone, building, unit) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.site_id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(&user.building)
            .bind(&user.unit)
            .fetch_one(&mut *tx)
            .instrument(query_span("INSERT"))
            .await
            .map_err(classify)?;
        tx.commit().await?;
        user_from_row(&row)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_users(&query, id).await
    }

    async fn find_site_user_by_email(
        &self,
        site_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE site_id = $1 AND email = $2");
        let row = sqlx::query(&query)
            .bind(site_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_platform_admin_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE site_id IS NULL AND role = 'superadmin' \
             AND email = $1"
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_members(&self, scope: SiteScope) -> StoreResult<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE site_id IS NOT NULL \
             AND ($1::uuid IS NULL OR site_id = $1) ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(scope.site_id())
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        collect(&rows, user_from_row)
    }

    async fn set_user_active(
        &self,
        scope: SiteScope,
        id: Uuid,
        active: bool,
    ) -> StoreResult<Option<User>> {
        let query = format!(
            "UPDATE users SET active = $3 WHERE id = $2 AND site_id IS NOT NULL \
             AND ($1::uuid IS NULL OR site_id = $1) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(id)
            .bind(active)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE"))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_password_hash(
        &self,
        scope: SiteScope,
        id: Uuid,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        let query = format!(
            "UPDATE users SET password_hash = $3 WHERE id = $2 AND site_id IS NOT NULL \
             AND ($1::uuid IS NULL OR site_id = $1) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(id)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE"))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_announcement(
        &self,
        announcement: NewAnnouncement,
    ) -> StoreResult<Announcement> {
        let row = sqlx::query(
            "INSERT INTO announcements (site_id, author_id, title, body) VALUES ($1, $2, $3, $4) \
             RETURNING id, site_id, author_id, title, body, created_at",
        )
        .bind(announcement.site_id)
        .bind(announcement.author_id)
        .bind(&announcement.title)
        .bind(&announcement.body)
        .fetch_one(&self.pool)
        .instrument(query_span("INSERT"))
        .await?;
        announcement_from_row(&row)
    }

    async fn list_announcements(&self, scope: SiteScope) -> StoreResult<Vec<Announcement>> {
        let rows = sqlx::query(
            "SELECT id, site_id, author_id, title, body, created_at FROM announcements \
             WHERE ($1::uuid IS NULL OR site_id = $1) ORDER BY created_at DESC",
        )
        .bind(scope.site_id())
        .fetch_all(&self.pool)
        .instrument(query_span("SELECT"))
        .await?;
        collect(&rows, announcement_from_row)
    }

    async fn delete_announcement(&self, scope: SiteScope, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM announcements WHERE id = $2 AND ($1::uuid IS NULL OR site_id = $1)",
        )
        .bind(scope.site_id())
        .bind(id)
        .execute(&self.pool)
        .instrument(query_span("DELETE"))
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_complaint(&self, complaint: NewComplaint) -> StoreResult<Complaint> {
        let query = format!(
            "INSERT INTO complaints (site_id, author_id, title, description) \
             VALUES ($1, $2, $3, $4) RETURNING {COMPLAINT_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(complaint.site_id)
            .bind(complaint.author_id)
            .bind(&complaint.title)
            .bind(&complaint.description)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT"))
            .await?;
        complaint_from_row(&row)
    }

    async fn list_complaints(
        &self,
        scope: SiteScope,
        author_id: Option<Uuid>,
    ) -> StoreResult<Vec<Complaint>> {
        let query = format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE ($1::uuid IS NULL OR site_id = $1) \
             AND ($2::uuid IS NULL OR author_id = $2) ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(author_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        collect(&rows, complaint_from_row)
    }

    async fn find_complaint(&self, scope: SiteScope, id: Uuid) -> StoreResult<Option<Complaint>> {
        let query = format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = $2 \
             AND ($1::uuid IS NULL OR site_id = $1)"
        );
        let row = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        row.as_ref().map(complaint_from_row).transpose()
    }

    async fn set_complaint_status(
        &self,
        scope: SiteScope,
        id: Uuid,
        status: ComplaintStatus,
    ) -> StoreResult<Option<Complaint>> {
        let query = format!(
            "UPDATE complaints SET status = $3, updated_at = NOW() WHERE id = $2 \
             AND ($1::uuid IS NULL OR site_id = $1) RETURNING {COMPLAINT_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE"))
            .await?;
        row.as_ref().map(complaint_from_row).transpose()
    }

    async fn insert_due(&self, due: NewDue) -> StoreResult<Due> {
        let query = format!(
            "INSERT INTO dues (site_id, user_id, period, amount_cents) VALUES ($1, $2, $3, $4) \
             RETURNING {DUE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(due.site_id)
            .bind(due.user_id)
            .bind(&due.period)
            .bind(due.amount_cents)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .map_err(classify)?;
        due_from_row(&row)
    }

    async fn list_dues(&self, scope: SiteScope, user_id: Option<Uuid>) -> StoreResult<Vec<Due>> {
        let query = format!(
            "SELECT {DUE_COLUMNS} FROM dues WHERE ($1::uuid IS NULL OR site_id = $1) \
             AND ($2::uuid IS NULL OR user_id = $2) ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        collect(&rows, due_from_row)
    }

    async fn mark_due_paid(
        &self,
        scope: SiteScope,
        id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<Due>> {
        let query = format!(
            "UPDATE dues SET paid_at = COALESCE(paid_at, $3) WHERE id = $2 \
             AND ($1::uuid IS NULL OR site_id = $1) RETURNING {DUE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(id)
            .bind(paid_at)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE"))
            .await?;
        row.as_ref().map(due_from_row).transpose()
    }

    async fn insert_expense(&self, expense: NewExpense) -> StoreResult<Expense> {
        let row = sqlx::query(
            "INSERT INTO expenses (site_id, category, description, amount_cents, incurred_on) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, site_id, category, description, amount_cents, incurred_on, created_at",
        )
        .bind(expense.site_id)
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.incurred_on)
        .fetch_one(&self.pool)
        .instrument(query_span("INSERT"))
        .await?;
        expense_from_row(&row)
    }

    async fn list_expenses(&self, scope: SiteScope) -> StoreResult<Vec<Expense>> {
        let rows = sqlx::query(
            "SELECT id, site_id, category, description, amount_cents, incurred_on, created_at \
             FROM expenses WHERE ($1::uuid IS NULL OR site_id = $1) ORDER BY created_at DESC",
        )
        .bind(scope.site_id())
        .fetch_all(&self.pool)
        .instrument(query_span("SELECT"))
        .await?;
        collect(&rows, expense_from_row)
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let query = format!(
            "INSERT INTO votes (site_id, author_id, question, options, closes_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {VOTE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(vote.site_id)
            .bind(vote.author_id)
            .bind(&vote.question)
            .bind(&vote.options)
            .bind(vote.closes_at)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT"))
            .await?;
        vote_from_row(&row)
    }

    async fn list_votes(&self, scope: SiteScope) -> StoreResult<Vec<Vote>> {
        let query = format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE ($1::uuid IS NULL OR site_id = $1) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(scope.site_id())
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        collect(&rows, vote_from_row)
    }

    async fn find_vote(&self, scope: SiteScope, id: Uuid) -> StoreResult<Option<Vote>> {
        let query = format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE id = $2 AND ($1::uuid IS NULL OR site_id = $1)"
        );
        let row = sqlx::query(&query)
            .bind(scope.site_id())
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT"))
            .await?;
        row.as_ref().map(vote_from_row).transpose()
    }

    async fn insert_ballot(&self, vote_id: Uuid, user_id: Uuid, choice: i32) -> StoreResult<()> {
        sqlx::query("INSERT INTO ballots (vote_id, user_id, choice) VALUES ($1, $2, $3)")
            .bind(vote_id)
            .bind(user_id)
            .bind(choice)
            .execute(&self.pool)
            .instrument(query_span("INSERT"))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn tally(&self, vote_id: Uuid, options_len: usize) -> StoreResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT choice, COUNT(*) AS ballots FROM ballots WHERE vote_id = $1 GROUP BY choice",
        )
        .bind(vote_id)
        .fetch_all(&self.pool)
        .instrument(query_span("SELECT"))
        .await?;

        let mut counts = vec![0_i64; options_len];
        for row in rows {
            let choice: i32 = row.try_get("choice")?;
            let ballots: i64 = row.try_get("ballots")?;
            if let Some(count) = usize::try_from(choice)
                .ok()
                .and_then(|index| counts.get_mut(index))
            {
                *count = ballots;
            }
        }
        Ok(counts)
    }
}
