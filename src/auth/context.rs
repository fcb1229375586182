//! Verified per-request identity.

use uuid::Uuid;

use super::Role;

/// Identity derived from a verified credential. Never persisted.
///
/// Construction enforces the tenancy invariant: platform admins carry no
/// site, every other role carries exactly one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Uuid,
    email: String,
    role: Role,
    site_id: Option<Uuid>,
}

impl AuthContext {
    /// Returns `None` when `role` and `site_id` disagree.
    #[must_use]
    pub fn new(user_id: Uuid, email: String, role: Role, site_id: Option<Uuid>) -> Option<Self> {
        if role.is_site_bound() != site_id.is_some() {
            return None;
        }
        Some(Self {
            user_id,
            email,
            role,
            site_id,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Site the identity belongs to; `None` only for the platform admin.
    #[must_use]
    pub fn site_id(&self) -> Option<Uuid> {
        self.site_id
    }

    #[must_use]
    pub fn is_platform_admin(&self) -> bool {
        self.role == Role::PlatformAdmin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_admin_without_site_is_valid() {
        let ctx = AuthContext::new(Uuid::new_v4(), "root@x.com".into(), Role::PlatformAdmin, None);
        assert!(ctx.is_some_and(|ctx| ctx.is_platform_admin() && ctx.site_id().is_none()));
    }

    #[test]
    fn platform_admin_with_site_is_rejected() {
        let ctx = AuthContext::new(
            Uuid::new_v4(),
            "root@x.com".into(),
            Role::PlatformAdmin,
            Some(Uuid::new_v4()),
        );
        assert!(ctx.is_none());
    }

    #[test]
    fn site_roles_require_a_site() {
        for role in [Role::SiteAdmin, Role::Resident] {
            assert!(AuthContext::new(Uuid::new_v4(), "a@x.com".into(), role, None).is_none());
            assert!(
                AuthContext::new(Uuid::new_v4(), "a@x.com".into(), role, Some(Uuid::new_v4()))
                    .is_some()
            );
        }
    }
}
