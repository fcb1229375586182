//! Login, registration, session bootstrap, and identity provisioning.
//!
//! Every path that can reveal whether an email exists returns the same
//! [`AuthError::InvalidCredentials`]; join code problems are reported as
//! [`AuthError::InvalidJoinCode`] since site codes are semi-public.

use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    join_code,
    password::{hash_blocking, verify_blocking, verify_dummy_blocking, MIN_PASSWORD_LENGTH},
    token::IssuedToken,
    AuthContext, AuthError, Role, SiteScope, TokenCodec,
};
use crate::store::{normalize_email, normalize_unit_label, NewUser, Site, Store, User};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Required for site identities; omitted only by the platform admin.
    pub join_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub join_code: String,
    pub building: Option<String>,
    pub unit: String,
}

/// Input for identities created by an administrator rather than self-registration.
#[derive(Debug, Clone)]
pub struct Provision {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Identity plus a freshly issued credential.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub token: IssuedToken,
}

/// Which client surface an identity lands on after sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dashboard {
    Platform,
    Site,
}

impl Dashboard {
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::PlatformAdmin => Self::Platform,
            Role::SiteAdmin | Role::Resident => Self::Site,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Site => "site",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub site: Option<Site>,
    pub dashboard: Dashboard,
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn required(value: &str, field: &str) -> Result<String, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn checked_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AuthError::validation("email is required"));
    }
    if !valid_email(&email) {
        return Err(AuthError::validation("email is invalid"));
    }
    Ok(email)
}

/// Enforce the minimum password policy.
///
/// # Errors
/// Returns [`AuthError::ValidationFailed`] when the password is too short.
pub fn check_password_policy(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Resolve a join code to an active site.
///
/// # Errors
/// [`AuthError::InvalidJoinCode`] when the code is malformed, unknown, or
/// belongs to a deactivated site.
pub async fn resolve_join_code(store: &dyn Store, raw: &str) -> Result<Site, AuthError> {
    let code = join_code::normalize(raw).ok_or(AuthError::InvalidJoinCode)?;
    match store.find_site_by_code(&code).await? {
        Some(site) if site.active => Ok(site),
        _ => Err(AuthError::InvalidJoinCode),
    }
}

fn issue_for(codec: &TokenCodec, user: User) -> Result<Authenticated, AuthError> {
    let ctx = user
        .auth_context()
        .ok_or_else(|| AuthError::Internal(format!("identity {} has no valid scope", user.id)))?;
    let token = codec
        .issue(&ctx)
        .map_err(|err| AuthError::Internal(err.to_string()))?;
    Ok(Authenticated { user, token })
}

/// Exchange email and password for a credential.
///
/// # Errors
/// [`AuthError::InvalidCredentials`] for unknown, inactive, or wrong-password
/// identities; [`AuthError::InvalidJoinCode`] for a bad join code.
pub async fn login(
    store: &dyn Store,
    codec: &TokenCodec,
    request: LoginRequest,
) -> Result<Authenticated, AuthError> {
    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(AuthError::validation("email and password are required"));
    }

    let user = match optional(request.join_code.as_deref()) {
        Some(code) => {
            let site = resolve_join_code(store, &code).await?;
            store.find_site_user_by_email(site.id, &email).await?
        }
        None => store.find_platform_admin_by_email(&email).await?,
    };

    let Some(user) = user.filter(|user| user.active) else {
        verify_dummy_blocking(request.password).await?;
        debug!("login rejected: no active identity");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_blocking(request.password, user.password_hash.clone()).await? {
        debug!(user_id = %user.id, "login rejected: password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    info!(user_id = %user.id, role = %user.role, "login succeeded");
    issue_for(codec, user)
}

/// Self-registration as a resident of the site named by the join code.
///
/// # Errors
/// [`AuthError::ValidationFailed`], [`AuthError::InvalidJoinCode`],
/// [`AuthError::AlreadyExists`], or [`AuthError::UnitTaken`].
pub async fn register(
    store: &dyn Store,
    codec: &TokenCodec,
    registration: Registration,
) -> Result<Authenticated, AuthError> {
    let first_name = required(&registration.first_name, "firstName")?;
    let last_name = required(&registration.last_name, "lastName")?;
    let email = checked_email(&registration.email)?;
    check_password_policy(&registration.password)?;
    let unit = normalize_unit_label(Some(&registration.unit))
        .ok_or_else(|| AuthError::validation("unit is required"))?;
    let building = normalize_unit_label(registration.building.as_deref());

    let site = resolve_join_code(store, &registration.join_code).await?;
    if store.find_site_user_by_email(site.id, &email).await?.is_some() {
        return Err(AuthError::AlreadyExists);
    }

    let password_hash = hash_blocking(registration.password).await?;
    let user = store
        .insert_resident(
            NewUser {
                email,
                password_hash,
                role: Role::Resident,
                site_id: Some(site.id),
                first_name,
                last_name,
                phone: optional(registration.phone.as_deref()),
                building,
                unit: Some(unit),
            },
            site.unit_capacity,
        )
        .await?;

    info!(user_id = %user.id, site_id = %site.id, "resident registered");
    issue_for(codec, user)
}

/// Re-read the identity behind a verified context.
///
/// The guard trusts the token alone; this is where deactivated identities and
/// sites are noticed.
///
/// # Errors
/// [`AuthError::Unauthenticated`] when the identity or its site is gone,
/// inactive, or no longer matches the credential's role and site.
pub async fn bootstrap_session(store: &dyn Store, ctx: &AuthContext) -> Result<Session, AuthError> {
    let user = store
        .find_user(ctx.user_id())
        .await?
        .filter(|user| user.active && user.role == ctx.role() && user.site_id == ctx.site_id())
        .ok_or(AuthError::Unauthenticated)?;

    let site = match user.site_id {
        Some(site_id) => Some(
            store
                .find_site(site_id)
                .await?
                .filter(|site| site.active)
                .ok_or(AuthError::Unauthenticated)?,
        ),
        None => None,
    };

    Ok(Session {
        dashboard: Dashboard::for_role(user.role),
        user,
        site,
    })
}

/// Create an administrator for `site_id`, which must be an active site.
///
/// # Errors
/// [`AuthError::NotFound`] for unknown or inactive sites, plus validation and
/// uniqueness errors.
pub async fn provision_site_admin(
    store: &dyn Store,
    site_id: Uuid,
    provision: Provision,
) -> Result<User, AuthError> {
    let first_name = required(&provision.first_name, "firstName")?;
    let last_name = required(&provision.last_name, "lastName")?;
    let email = checked_email(&provision.email)?;
    check_password_policy(&provision.password)?;

    store
        .find_site(site_id)
        .await?
        .filter(|site| site.active)
        .ok_or(AuthError::NotFound)?;

    let password_hash = hash_blocking(provision.password).await?;
    let user = store
        .insert_user(NewUser {
            email,
            password_hash,
            role: Role::SiteAdmin,
            site_id: Some(site_id),
            first_name,
            last_name,
            phone: optional(provision.phone.as_deref()),
            building: None,
            unit: None,
        })
        .await?;

    info!(user_id = %user.id, %site_id, "site admin provisioned");
    Ok(user)
}

/// Make sure a platform admin with `email` exists; used at startup.
///
/// An existing identity is left untouched, including its password.
///
/// # Errors
/// Validation and store errors.
pub async fn ensure_platform_admin(
    store: &dyn Store,
    email: &str,
    password: String,
) -> Result<User, AuthError> {
    let email = checked_email(email)?;
    if let Some(existing) = store.find_platform_admin_by_email(&email).await? {
        debug!(user_id = %existing.id, "platform admin already present");
        return Ok(existing);
    }
    check_password_policy(&password)?;

    let password_hash = hash_blocking(password).await?;
    let user = store
        .insert_user(NewUser {
            email,
            password_hash,
            role: Role::PlatformAdmin,
            site_id: None,
            first_name: "Platform".to_string(),
            last_name: "Admin".to_string(),
            phone: None,
            building: None,
            unit: None,
        })
        .await?;

    info!(user_id = %user.id, "platform admin created");
    Ok(user)
}

/// Administrative password reset inside `scope`.
///
/// # Errors
/// [`AuthError::NotFound`] when the identity is outside `scope`.
pub async fn reset_password(
    store: &dyn Store,
    scope: SiteScope,
    user_id: Uuid,
    password: String,
) -> Result<User, AuthError> {
    check_password_policy(&password)?;
    let password_hash = hash_blocking(password).await?;
    store
        .set_password_hash(scope, user_id, &password_hash)
        .await?
        .ok_or(AuthError::NotFound)
}
