use super::{
    guard,
    handlers::{
        announcements, auth, complaints, dues, expenses, health, members, sites, votes,
    },
};
use crate::auth::RoleSet;
use axum::middleware;
use utoipa::openapi::{
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    tag::TagBuilder,
    ComponentsBuilder, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI document.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Route group whose handlers all run behind the guard with `roles`.
fn guarded(roles: RoleSet, router: OpenApiRouter) -> OpenApiRouter {
    router.route_layer(middleware::from_fn_with_state(roles, guard::enforce))
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints to the group matching their allowed roles so they are
/// served, guarded, and documented at once. Routes added outside (like `/` or
/// `/v1/events`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // Session bootstrap verifies its own credential so it can answer 401 with a body.
    let public = OpenApiRouter::new()
        .routes(routes!(health::health))
        .routes(routes!(auth::login))
        .routes(routes!(auth::register))
        .routes(routes!(auth::forgot_password))
        .routes(routes!(auth::session))
        .routes(routes!(sites::lookup_site));

    let any_role = guarded(
        RoleSet::ANY,
        OpenApiRouter::new()
            .routes(routes!(announcements::list_announcements))
            .routes(routes!(complaints::list_complaints))
            .routes(routes!(complaints::get_complaint))
            .routes(routes!(dues::list_dues))
            .routes(routes!(expenses::list_expenses))
            .routes(routes!(votes::list_votes))
            .routes(routes!(votes::vote_results)),
    );

    let platform = guarded(
        RoleSet::PLATFORM,
        OpenApiRouter::new()
            .routes(routes!(sites::create_site))
            .routes(routes!(sites::list_sites))
            .routes(routes!(sites::delete_site))
            .routes(routes!(sites::create_site_admin)),
    );

    let admins = guarded(
        RoleSet::ADMINS,
        OpenApiRouter::new()
            .routes(routes!(sites::get_site))
            .routes(routes!(members::list_members))
            .routes(routes!(members::delete_member))
            .routes(routes!(members::reset_password))
            .routes(routes!(announcements::create_announcement))
            .routes(routes!(announcements::delete_announcement))
            .routes(routes!(dues::create_due))
            .routes(routes!(dues::pay_due))
            .routes(routes!(expenses::create_expense))
            .routes(routes!(votes::create_vote)),
    );

    let site_admin = guarded(
        RoleSet::SITE_ADMIN,
        OpenApiRouter::new().routes(routes!(complaints::update_complaint_status)),
    );

    let resident = guarded(
        RoleSet::RESIDENT,
        OpenApiRouter::new()
            .routes(routes!(complaints::create_complaint))
            .routes(routes!(votes::cast_ballot)),
    );

    OpenApiRouter::with_openapi(cargo_openapi())
        .merge(public)
        .merge(any_role)
        .merge(platform)
        .merge(admins)
        .merge(site_admin)
        .merge(resident)
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    // Tags and the bearer scheme survive the route merges that fill in paths.
    OpenApiBuilder::new()
        .info(info)
        .tags(Some(tags()))
        .components(Some(
            ComponentsBuilder::new()
                .security_scheme(
                    "bearer",
                    SecurityScheme::Http(
                        HttpBuilder::new()
                            .scheme(HttpAuthScheme::Bearer)
                            .bearer_format("JWT")
                            .build(),
                    ),
                )
                .build(),
        ))
        .build()
}

fn tags() -> Vec<Tag> {
    [
        ("health", "Service health"),
        ("auth", "Login, registration, and session bootstrap"),
        ("sites", "Site lifecycle and join codes"),
        ("members", "Member administration"),
        ("announcements", "Site announcements"),
        ("complaints", "Resident complaints"),
        ("dues", "Monthly dues"),
        ("expenses", "Site expenses"),
        ("votes", "Site votes"),
    ]
    .into_iter()
    .map(|(name, description)| {
        TagBuilder::new()
            .name(name)
            .description(Some(description))
            .build()
    })
    .collect()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    non_empty(value)
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact.unwrap_or_default();
        assert_eq!(contact.name.as_deref(), Some("Team SiteWarden"));
        assert_eq!(contact.email.as_deref(), Some("team@sitewarden.dev"));

        let license = doc.info.license;
        assert!(license.is_some_and(|license| license.name == "BSD-3-Clause"));
    }

    #[test]
    fn parse_author_handles_missing_parts() {
        assert_eq!(parse_author("Ada <ada@x.com>"), (Some("Ada"), Some("ada@x.com")));
        assert_eq!(parse_author("<ada@x.com>"), (None, Some("ada@x.com")));
        assert_eq!(parse_author("Ada"), (Some("Ada"), None));
    }

    #[test]
    fn openapi_documents_guarded_and_public_paths() {
        let doc = openapi();
        let tags = doc.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        for path in [
            "/health",
            "/v1/auth/login",
            "/v1/auth/session",
            "/v1/sites/{id}/admins",
            "/v1/complaints/{id}/status",
            "/v1/votes/{id}/results",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert!(!doc.paths.paths.contains_key("/v1/events"));

        let components = doc.components.unwrap_or_default();
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[test]
    fn shared_paths_keep_every_method() {
        let doc = openapi();
        let announcements = doc.paths.paths.get("/v1/announcements");
        assert!(announcements.is_some_and(|item| item.get.is_some() && item.post.is_some()));
    }

    #[test]
    fn merged_routes_keep_tags_and_security_scheme() {
        let doc = openapi();
        let tags = doc.tags.unwrap_or_default();
        assert_eq!(tags.len(), 9);
        assert!(tags.iter().any(|tag| {
            tag.name == "votes" && tag.description.as_deref() == Some("Site votes")
        }));

        let components = doc.components.unwrap_or_default();
        assert!(components.security_schemes.contains_key("bearer"));
        assert!(components.schemas.contains_key("LoginRequest"));
    }
}
