//! Roles and the allow-lists used by the guard.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    /// Operates the platform; never bound to a site.
    #[serde(rename = "superadmin")]
    PlatformAdmin,
    /// Manages a single site.
    #[serde(rename = "admin")]
    SiteAdmin,
    /// Lives in a single site.
    #[serde(rename = "resident")]
    Resident,
}

impl Role {
    /// Canonical string used in tokens and in the `users.role` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlatformAdmin => "superadmin",
            Self::SiteAdmin => "admin",
            Self::Resident => "resident",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "superadmin" => Some(Self::PlatformAdmin),
            "admin" => Some(Self::SiteAdmin),
            "resident" => Some(Self::Resident),
            _ => None,
        }
    }

    /// Only the platform admin exists outside of a site.
    #[must_use]
    pub const fn is_site_bound(self) -> bool {
        !matches!(self, Self::PlatformAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allow-list of roles for a guarded route. An empty set admits any
/// authenticated role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(&'static [Role]);

impl RoleSet {
    pub const ANY: Self = Self(&[]);
    pub const PLATFORM: Self = Self(&[Role::PlatformAdmin]);
    pub const ADMINS: Self = Self(&[Role::PlatformAdmin, Role::SiteAdmin]);
    pub const SITE_ADMIN: Self = Self(&[Role::SiteAdmin]);
    pub const RESIDENT: Self = Self(&[Role::Resident]);

    #[must_use]
    pub const fn new(roles: &'static [Role]) -> Self {
        Self(roles)
    }

    #[must_use]
    pub fn permits(&self, role: Role) -> bool {
        self.0.is_empty() || self.0.contains(&role)
    }

    #[must_use]
    pub fn roles(&self) -> &'static [Role] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 3] = [Role::PlatformAdmin, Role::SiteAdmin, Role::Resident];

    #[test]
    fn role_strings_round_trip() {
        for role in ALL_ROLES {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn role_serializes_as_wire_name() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Role::PlatformAdmin)?, "\"superadmin\"");
        let role: Role = serde_json::from_str("\"resident\"")?;
        assert_eq!(role, Role::Resident);
        Ok(())
    }

    #[test]
    fn empty_set_permits_every_role() {
        for role in ALL_ROLES {
            assert!(RoleSet::ANY.permits(role));
        }
    }

    #[test]
    fn non_empty_set_permits_only_members() {
        let sets = [
            RoleSet::PLATFORM,
            RoleSet::ADMINS,
            RoleSet::SITE_ADMIN,
            RoleSet::RESIDENT,
        ];
        for set in sets {
            for role in ALL_ROLES {
                assert_eq!(set.permits(role), set.roles().contains(&role));
            }
        }
    }

    #[test]
    fn only_platform_admin_is_unscoped() {
        assert!(!Role::PlatformAdmin.is_site_bound());
        assert!(Role::SiteAdmin.is_site_bound());
        assert!(Role::Resident.is_site_bound());
    }
}
