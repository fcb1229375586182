//! In-process store backed by a single `RwLock`.
//!
//! Used by the test suite and for embedding; mirrors the Postgres constraints
//! so both backends reject the same writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Announcement, Complaint, ComplaintStatus, Constraint, Due, Expense, NewAnnouncement,
    NewComplaint, NewDue, NewExpense, NewSite, NewUser, NewVote, Site, Store, StoreError,
    StoreResult, User, Vote,
};
use crate::auth::{Role, SiteScope};

#[derive(Debug, Default)]
struct State {
    sites: Vec<Site>,
    users: Vec<User>,
    announcements: Vec<Announcement>,
    complaints: Vec<Complaint>,
    dues: Vec<Due>,
    expenses: Vec<Expense>,
    votes: Vec<Vote>,
    ballots: HashMap<(Uuid, Uuid), i32>,
}

impl State {
    fn email_taken(&self, site_id: Option<Uuid>, email: &str) -> bool {
        self.users
            .iter()
            .any(|user| user.site_id == site_id && user.email == email)
    }

    fn push_user(&mut self, user: NewUser) -> User {
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            site_id: user.site_id,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            building: user.building,
            unit: user.unit,
            active: true,
            created_at: Utc::now(),
        };
        self.users.push(row.clone());
        row
    }

    fn scoped_user_mut(&mut self, scope: SiteScope, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|user| {
            user.id == id && user.site_id.is_some_and(|site_id| scope.contains(site_id))
        })
    }
}

/// Newest first, like the `ORDER BY created_at DESC` in Postgres.
fn newest_first<T: Clone>(rows: &[T], keep: impl Fn(&T) -> bool) -> Vec<T> {
    rows.iter().rev().filter(|row| keep(row)).cloned().collect()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_site(&self, site: NewSite) -> StoreResult<Site> {
        let mut state = self.state.write().await;
        if state.sites.iter().any(|row| row.join_code == site.join_code) {
            return Err(StoreError::Conflict(Constraint::JoinCode));
        }
        let row = Site {
            id: Uuid::new_v4(),
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
            active: true,
            created_at: Utc::now(),
        };
        state.sites.push(row.clone());
        Ok(row)
    }

    async fn find_site(&self, id: Uuid) -> StoreResult<Option<Site>> {
        let state = self.state.read().await;
        Ok(state.sites.iter().find(|site| site.id == id).cloned())
    }

    async fn find_site_by_code(&self, code: &str) -> StoreResult<Option<Site>> {
        let state = self.state.read().await;
        Ok(state.sites.iter().find(|site| site.join_code == code).cloned())
    }

    async fn list_sites(&self) -> StoreResult<Vec<Site>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.sites, |_| true))
    }

    async fn join_code_exists(&self, code: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.sites.iter().any(|site| site.join_code == code))
    }

    async fn deactivate_site(&self, id: Uuid) -> StoreResult<Option<Site>> {
        let mut state = self.state.write().await;
        let Some(site) = state.sites.iter_mut().find(|site| site.id == id) else {
            return Ok(None);
        };
        site.active = false;
        let site = site.clone();
        for user in state.users.iter_mut().filter(|user| user.site_id == Some(id)) {
            user.active = false;
        }
        Ok(Some(site))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.email_taken(user.site_id, &user.email) {
            return Err(StoreError::Conflict(Constraint::UserEmail));
        }
        Ok(state.push_user(user))
    }

    async fn insert_resident(&self, user: NewUser, unit_capacity: i32) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.email_taken(user.site_id, &user.email) {
            return Err(StoreError::Conflict(Constraint::UserEmail));
        }
        let occupants = state
            .users
            .iter()
            .filter(|row| {
                row.active
                    && row.role == Role::Resident
                    && row.site_id == user.site_id
                    && row.building == user.building
                    && row.unit == user.unit
            })
            .count();
        if occupants >= usize::try_from(unit_capacity).unwrap_or(0) {
            return Err(StoreError::Conflict(Constraint::UnitCapacity));
        }
        Ok(state.push_user(user))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_site_user_by_email(
        &self,
        site_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.site_id == Some(site_id) && user.email == email)
            .cloned())
    }

    async fn find_platform_admin_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.role == Role::PlatformAdmin && user.email == email)
            .cloned())
    }

    async fn list_members(&self, scope: SiteScope) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.users, |user| {
            user.site_id.is_some_and(|site_id| scope.contains(site_id))
        }))
    }

    async fn set_user_active(
        &self,
        scope: SiteScope,
        id: Uuid,
        active: bool,
    ) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;
        Ok(state.scoped_user_mut(scope, id).map(|user| {
            user.active = active;
            user.clone()
        }))
    }

    async fn set_password_hash(
        &self,
        scope: SiteScope,
        id: Uuid,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;
        Ok(state.scoped_user_mut(scope, id).map(|user| {
            user.password_hash = password_hash.to_string();
            user.clone()
        }))
    }

    async fn insert_announcement(
        &self,
        announcement: NewAnnouncement,
    ) -> StoreResult<Announcement> {
        let row = Announcement {
            id: Uuid::new_v4(),
            site_id: announcement.site_id,
            author_id: announcement.author_id,
            title: announcement.title,
            body: announcement.body,
            created_at: Utc::now(),
        };
        self.state.write().await.announcements.push(row.clone());
        Ok(row)
    }

    async fn list_announcements(&self, scope: SiteScope) -> StoreResult<Vec<Announcement>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.announcements, |row| {
            scope.contains(row.site_id)
        }))
    }

    async fn delete_announcement(&self, scope: SiteScope, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.announcements.len();
        state
            .announcements
            .retain(|row| !(row.id == id && scope.contains(row.site_id)));
        Ok(state.announcements.len() != before)
    }

    async fn insert_complaint(&self, complaint: NewComplaint) -> StoreResult<Complaint> {
        let now = Utc::now();
        let row = Complaint {
            id: Uuid::new_v4(),
            site_id: complaint.site_id,
            author_id: complaint.author_id,
            title: complaint.title,
            description: complaint.description,
            status: ComplaintStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.complaints.push(row.clone());
        Ok(row)
    }

    async fn list_complaints(
        &self,
        scope: SiteScope,
        author_id: Option<Uuid>,
    ) -> StoreResult<Vec<Complaint>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.complaints, |row| {
            scope.contains(row.site_id) && author_id.map_or(true, |author| row.author_id == author)
        }))
    }

    async fn find_complaint(&self, scope: SiteScope, id: Uuid) -> StoreResult<Option<Complaint>> {
        let state = self.state.read().await;
        Ok(state
            .complaints
            .iter()
            .find(|row| row.id == id && scope.contains(row.site_id))
            .cloned())
    }

    async fn set_complaint_status(
        &self,
        scope: SiteScope,
        id: Uuid,
        status: ComplaintStatus,
    ) -> StoreResult<Option<Complaint>> {
        let mut state = self.state.write().await;
        Ok(state
            .complaints
            .iter_mut()
            .find(|row| row.id == id && scope.contains(row.site_id))
            .map(|row| {
                row.status = status;
                row.updated_at = Utc::now();
                row.clone()
            }))
    }

    async fn insert_due(&self, due: NewDue) -> StoreResult<Due> {
        let mut state = self.state.write().await;
        let duplicate = state.dues.iter().any(|row| {
            row.site_id == due.site_id && row.user_id == due.user_id && row.period == due.period
        });
        if duplicate {
            return Err(StoreError::Conflict(Constraint::DuePeriod));
        }
        let row = Due {
            id: Uuid::new_v4(),
            site_id: due.site_id,
            user_id: due.user_id,
            period: due.period,
            amount_cents: due.amount_cents,
            paid_at: None,
            created_at: Utc::now(),
        };
        state.dues.push(row.clone());
        Ok(row)
    }

    async fn list_dues(&self, scope: SiteScope, user_id: Option<Uuid>) -> StoreResult<Vec<Due>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.dues, |row| {
            scope.contains(row.site_id) && user_id.map_or(true, |user| row.user_id == user)
        }))
    }

    async fn mark_due_paid(
        &self,
        scope: SiteScope,
        id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<Due>> {
        let mut state = self.state.write().await;
        Ok(state
            .dues
            .iter_mut()
            .find(|row| row.id == id && scope.contains(row.site_id))
            .map(|row| {
                row.paid_at.get_or_insert(paid_at);
                row.clone()
            }))
    }

    async fn insert_expense(&self, expense: NewExpense) -> StoreResult<Expense> {
        let row = Expense {
            id: Uuid::new_v4(),
            site_id: expense.site_id,
            category: expense.category,
            description: expense.description,
            amount_cents: expense.amount_cents,
            incurred_on: expense.incurred_on,
            created_at: Utc::now(),
        };
        self.state.write().await.expenses.push(row.clone());
        Ok(row)
    }

    async fn list_expenses(&self, scope: SiteScope) -> StoreResult<Vec<Expense>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.expenses, |row| scope.contains(row.site_id)))
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let row = Vote {
            id: Uuid::new_v4(),
            site_id: vote.site_id,
            author_id: vote.author_id,
            question: vote.question,
            options: vote.options,
            closes_at: vote.closes_at,
            created_at: Utc::now(),
        };
        self.state.write().await.votes.push(row.clone());
        Ok(row)
    }

    async fn list_votes(&self, scope: SiteScope) -> StoreResult<Vec<Vote>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.votes, |row| scope.contains(row.site_id)))
    }

    async fn find_vote(&self, scope: SiteScope, id: Uuid) -> StoreResult<Option<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .iter()
            .find(|row| row.id == id && scope.contains(row.site_id))
            .cloned())
    }

    async fn insert_ballot(&self, vote_id: Uuid, user_id: Uuid, choice: i32) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.ballots.contains_key(&(vote_id, user_id)) {
            return Err(StoreError::Conflict(Constraint::Ballot));
        }
        state.ballots.insert((vote_id, user_id), choice);
        Ok(())
    }

    async fn tally(&self, vote_id: Uuid, options_len: usize) -> StoreResult<Vec<i64>> {
        let state = self.state.read().await;
        let mut counts = vec![0_i64; options_len];
        let voters: HashSet<_> = state
            .ballots
            .iter()
            .filter(|((vote, _), _)| *vote == vote_id)
            .map(|((_, user), choice)| (*user, *choice))
            .collect();
        for (_, choice) in voters {
            if let Some(count) = usize::try_from(choice)
                .ok()
                .and_then(|index| counts.get_mut(index))
            {
                *count += 1;
            }
        }
        Ok(counts)
    }
}
