//! `PgStore` against a real database.
//!
//! Skipped unless `SITEWARDEN_TEST_DSN` points at a disposable Postgres; the
//! schema is applied once per run and every test works in its own sites.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use sitewarden::{
    auth::{join_code, Role, SiteScope},
    store::{
        postgres::PgStore, Constraint, NewDue, NewExpense, NewSite, NewUser, NewVote, Site,
        Store, StoreError,
    },
};
use sqlx::{Connection, PgConnection};
use tokio::sync::OnceCell;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

static SCHEMA: OnceCell<()> = OnceCell::const_new();

fn test_dsn() -> Option<String> {
    match std::env::var("SITEWARDEN_TEST_DSN") {
        Ok(dsn) => Some(dsn),
        Err(_) => {
            eprintln!("Skipping integration test: SITEWARDEN_TEST_DSN is not set");
            None
        }
    }
}

async fn store() -> Result<Option<PgStore>> {
    let Some(dsn) = test_dsn() else {
        return Ok(None);
    };
    SCHEMA
        .get_or_try_init(|| apply_schema(&dsn))
        .await?;
    Ok(Some(PgStore::connect(&dsn).await?))
}

async fn apply_schema(dsn: &str) -> Result<()> {
    let mut connection = PgConnection::connect(dsn)
        .await
        .context("failed to connect for schema setup")?;

    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(&mut connection)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }

    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        current.push_str(line);
        current.push('\n');

        if line.trim().ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

async fn new_site(store: &PgStore, unit_capacity: i32) -> Result<Site> {
    let code = join_code::random_code(&mut rand::thread_rng());
    Ok(store
        .insert_site(NewSite {
            join_code: code,
            name: "Integration Court".to_string(),
            address: "1 Test Street".to_string(),
            city: "Testville".to_string(),
            building_count: 1,
            unit_count: 10,
            monthly_due_cents: 10_000,
            contact_email: None,
            contact_phone: None,
            unit_capacity,
        })
        .await?)
}

fn resident(site: &Site, email: &str, unit: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "unused".to_string(),
        role: Role::Resident,
        site_id: Some(site.id),
        first_name: "Test".to_string(),
        last_name: "Resident".to_string(),
        phone: None,
        building: None,
        unit: Some(unit.to_string()),
    }
}

#[tokio::test]
async fn duplicate_join_codes_are_conflicts() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let site = new_site(&store, 1).await?;

    let mut copy = NewSite {
        join_code: site.join_code.clone(),
        name: "Copy".to_string(),
        address: String::new(),
        city: String::new(),
        building_count: 1,
        unit_count: 1,
        monthly_due_cents: 0,
        contact_email: None,
        contact_phone: None,
        unit_capacity: 1,
    };
    let result = store.insert_site(copy.clone()).await;
    assert!(matches!(result, Err(StoreError::Conflict(Constraint::JoinCode))));

    copy.join_code = join_code::random_code(&mut rand::thread_rng());
    assert!(store.insert_site(copy).await.is_ok());
    assert!(store.join_code_exists(&site.join_code).await?);
    Ok(())
}

#[tokio::test]
async fn emails_are_unique_per_site() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let a = new_site(&store, 2).await?;
    let b = new_site(&store, 2).await?;

    store.insert_user(resident(&a, "same@x.com", "1")).await?;
    let again = store.insert_user(resident(&a, "same@x.com", "2")).await;
    assert!(matches!(again, Err(StoreError::Conflict(Constraint::UserEmail))));
    assert!(store.insert_user(resident(&b, "same@x.com", "1")).await.is_ok());

    let found = store.find_site_user_by_email(b.id, "same@x.com").await?;
    assert_eq!(found.map(|user| user.site_id), Some(Some(b.id)));
    Ok(())
}

#[tokio::test]
async fn concurrent_registrations_respect_unit_capacity() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let site = new_site(&store, 1).await?;

    let (first, second) = tokio::join!(
        store.insert_resident(resident(&site, "first@x.com", "7"), site.unit_capacity),
        store.insert_resident(resident(&site, "second@x.com", "7"), site.unit_capacity),
    );
    let taken = [&first, &second]
        .iter()
        .filter(|result| matches!(result, Err(StoreError::Conflict(Constraint::UnitCapacity))))
        .count();
    assert_eq!(taken, 1);
    assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
    Ok(())
}

#[tokio::test]
async fn scoped_updates_skip_foreign_sites() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let own = new_site(&store, 1).await?;
    let other = new_site(&store, 1).await?;
    let victim = store.insert_user(resident(&other, "victim@x.com", "1")).await?;

    let result = store
        .set_user_active(SiteScope::Site(own.id), victim.id, false)
        .await?;
    assert!(result.is_none());

    let members = store.list_members(SiteScope::Site(other.id)).await?;
    assert!(members.iter().any(|user| user.id == victim.id && user.active));
    Ok(())
}

#[tokio::test]
async fn dues_bill_once_per_period_and_keep_first_payment() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let site = new_site(&store, 1).await?;
    let user = store.insert_user(resident(&site, "payer@x.com", "1")).await?;
    let due = NewDue {
        site_id: site.id,
        user_id: user.id,
        period: "2024-05".to_string(),
        amount_cents: 10_000,
    };

    let row = store.insert_due(due.clone()).await?;
    let again = store.insert_due(due).await;
    assert!(matches!(again, Err(StoreError::Conflict(Constraint::DuePeriod))));

    let scope = SiteScope::Site(site.id);
    let first_paid = store.mark_due_paid(scope, row.id, Utc::now()).await?;
    let later = Utc::now() + Duration::hours(1);
    let second_paid = store.mark_due_paid(scope, row.id, later).await?;
    let first_at = first_paid.and_then(|due| due.paid_at);
    assert!(first_at.is_some());
    assert_eq!(second_paid.and_then(|due| due.paid_at), first_at);

    let foreign = store
        .mark_due_paid(SiteScope::Site(new_site(&store, 1).await?.id), row.id, later)
        .await?;
    assert!(foreign.is_none());
    Ok(())
}

#[tokio::test]
async fn ballots_are_unique_and_tallied() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let site = new_site(&store, 2).await?;
    let alice = store.insert_user(resident(&site, "alice@x.com", "1")).await?;
    let bob = store.insert_user(resident(&site, "bob@x.com", "2")).await?;
    let vote = store
        .insert_vote(NewVote {
            site_id: site.id,
            author_id: alice.id,
            question: "Paint the lobby?".to_string(),
            options: vec!["yes".to_string(), "no".to_string()],
            closes_at: None,
        })
        .await?;

    store.insert_ballot(vote.id, alice.id, 0).await?;
    store.insert_ballot(vote.id, bob.id, 0).await?;
    let twice = store.insert_ballot(vote.id, bob.id, 1).await;
    assert!(matches!(twice, Err(StoreError::Conflict(Constraint::Ballot))));

    assert_eq!(store.tally(vote.id, vote.options.len()).await?, vec![2, 0]);
    Ok(())
}

#[tokio::test]
async fn expenses_list_newest_first() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let site = new_site(&store, 1).await?;
    for category in ["cleaning", "repairs"] {
        store
            .insert_expense(NewExpense {
                site_id: site.id,
                category: category.to_string(),
                description: String::new(),
                amount_cents: 500,
                incurred_on: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default(),
            })
            .await?;
    }

    let rows = store.list_expenses(SiteScope::Site(site.id)).await?;
    let categories: Vec<_> = rows.iter().map(|row| row.category.as_str()).collect();
    assert_eq!(categories, ["repairs", "cleaning"]);
    Ok(())
}
