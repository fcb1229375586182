//! # SiteWarden (Multi-tenant Property Management API)
//!
//! `sitewarden` serves the API behind a property-management application: a
//! platform admin manages *sites* (apartment complexes), and each site has
//! site admins and residents who track dues, expenses, complaints,
//! announcements, and votes.
//!
//! ## Roles and Tenancy
//!
//! Every identity holds exactly one role:
//!
//! - **Platform admin** (`superadmin`): never bound to a site, may operate
//!   across all sites, but must name the target site explicitly for writes.
//! - **Site admin** (`admin`) and **resident** (`resident`): bound to exactly
//!   one site. Every read and write they perform is filtered by the site id
//!   carried in their verified token, never by client input.
//!
//! ## Credentials
//!
//! Login and registration return an HS256 bearer token
//! (`{userId, email, role, siteId, iat, exp}`). Verification is purely
//! cryptographic, so deactivating an identity takes effect at token expiry;
//! the lifetime is configurable and session bootstrap re-checks the store.
//!
//! ## Join Codes
//!
//! Sites are joined with an 8-character `[A-Z0-9]` code, generated at site
//! creation and matched case-insensitively. Public lookups by join code only
//! expose non-sensitive metadata.

pub mod api;
pub mod auth;
pub mod cli;
pub mod events;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
