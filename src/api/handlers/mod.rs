//! API handlers for SiteWarden.
//!
//! Guarded handlers receive the verified [`crate::auth::AuthContext`] as an
//! extension set by [`crate::api::guard::enforce`] and derive every site
//! filter from it through [`crate::auth::scope`].

pub mod announcements;
pub mod auth;
pub mod body;
pub mod complaints;
pub mod dues;
pub mod events;
pub mod expenses;
pub mod health;
pub mod members;
pub mod root;
pub mod sites;
pub mod types;
pub mod votes;

use uuid::Uuid;

use crate::{
    auth::AuthError,
    store::{Site, Store},
};

pub type ApiResult<T> = Result<T, AuthError>;

/// Target site of a write; deactivated sites accept no new records.
pub(crate) async fn active_site(store: &dyn Store, site_id: Uuid) -> ApiResult<Site> {
    store
        .find_site(site_id)
        .await?
        .filter(|site| site.active)
        .ok_or(AuthError::NotFound)
}

/// Trim a required text field.
pub(crate) fn required_text(value: &str, field: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(AuthError::validation(format!("{field} is required")))
    } else {
        Ok(value.to_string())
    }
}

/// Amounts are stored in cents and never negative.
pub(crate) fn non_negative(amount: i64, field: &str) -> ApiResult<i64> {
    if amount < 0 {
        Err(AuthError::validation(format!("{field} must not be negative")))
    } else {
        Ok(amount)
    }
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims() {
        assert!(matches!(required_text("  x ", "title"), Ok(value) if value == "x"));
        assert!(matches!(
            required_text("   ", "title"),
            Err(AuthError::ValidationFailed(message)) if message == "title is required"
        ));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(non_negative(0, "amountCents").is_ok());
        assert!(non_negative(-1, "amountCents").is_err());
    }
}
