//! Tenant scoping.
//!
//! Site-bound roles always read and write inside the site from their verified
//! context; any site id supplied by the client is ignored for them, even when
//! it matches. Only the platform admin may name a site, and must do so for
//! writes.

use tracing::debug;
use uuid::Uuid;

use super::{AuthContext, AuthError};

/// Row filter applied to every site-owned query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteScope {
    /// Platform admin listing across all sites.
    AllSites,
    Site(Uuid),
}

impl SiteScope {
    /// Site filter for SQL binds; `None` means unfiltered.
    #[must_use]
    pub fn site_id(self) -> Option<Uuid> {
        match self {
            Self::AllSites => None,
            Self::Site(id) => Some(id),
        }
    }

    #[must_use]
    pub fn contains(self, site_id: Uuid) -> bool {
        match self {
            Self::AllSites => true,
            Self::Site(id) => id == site_id,
        }
    }
}

/// Scope for reads. `requested` only matters for the platform admin.
///
/// # Errors
/// Returns [`AuthError::Unauthenticated`] if a site-bound context lacks a site.
pub fn read_scope(ctx: &AuthContext, requested: Option<Uuid>) -> Result<SiteScope, AuthError> {
    if ctx.is_platform_admin() {
        return Ok(requested.map_or(SiteScope::AllSites, SiteScope::Site));
    }
    own_site(ctx, requested).map(SiteScope::Site)
}

/// Site that a write lands in.
///
/// # Errors
/// Returns [`AuthError::ValidationFailed`] when the platform admin does not name a site.
pub fn write_target(ctx: &AuthContext, requested: Option<Uuid>) -> Result<Uuid, AuthError> {
    if ctx.is_platform_admin() {
        return requested.ok_or_else(|| AuthError::validation("siteId is required"));
    }
    own_site(ctx, requested)
}

/// Identity-level filter: residents only see their own records.
#[must_use]
pub fn owner_filter(ctx: &AuthContext) -> Option<Uuid> {
    match ctx.role() {
        super::Role::Resident => Some(ctx.user_id()),
        _ => None,
    }
}

fn own_site(ctx: &AuthContext, requested: Option<Uuid>) -> Result<Uuid, AuthError> {
    let site_id = ctx.site_id().ok_or(AuthError::Unauthenticated)?;
    if let Some(requested) = requested.filter(|requested| *requested != site_id) {
        debug!(
            user_id = %ctx.user_id(),
            %requested,
            "ignoring client-supplied site id outside the caller's site"
        );
    }
    Ok(site_id)
}
