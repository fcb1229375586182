//! Token, CORS, and bootstrap-admin flags.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_BOOTSTRAP_ADMIN_EMAIL: &str = "bootstrap-admin-email";
pub const ARG_BOOTSTRAP_ADMIN_PASSWORD: &str = "bootstrap-admin-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 signing secret for bearer tokens (at least 32 bytes)")
                .env("SITEWARDEN_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Bearer token lifetime in seconds")
                .env("SITEWARDEN_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL allowed by CORS")
                .env("SITEWARDEN_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_ADMIN_EMAIL)
                .long(ARG_BOOTSTRAP_ADMIN_EMAIL)
                .help("Create this platform admin at startup if missing")
                .env("SITEWARDEN_BOOTSTRAP_ADMIN_EMAIL")
                .requires(ARG_BOOTSTRAP_ADMIN_PASSWORD),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_ADMIN_PASSWORD)
                .long(ARG_BOOTSTRAP_ADMIN_PASSWORD)
                .help("Initial password for the bootstrap platform admin")
                .env("SITEWARDEN_BOOTSTRAP_ADMIN_PASSWORD")
                .hide_env_values(true)
                .requires(ARG_BOOTSTRAP_ADMIN_EMAIL),
        )
}

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub bootstrap_admin: Option<(String, SecretString)>,
}

impl Options {
    /// # Errors
    /// Returns an error if the signing secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .map(|secret| SecretString::from(secret.as_str()))
            .context("missing required argument: --jwt-secret")?;
        let token_ttl_seconds = matches
            .get_one::<i64>(ARG_TOKEN_TTL_SECONDS)
            .copied()
            .unwrap_or(604_800);
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        let bootstrap_admin = matches
            .get_one::<String>(ARG_BOOTSTRAP_ADMIN_EMAIL)
            .zip(matches.get_one::<String>(ARG_BOOTSTRAP_ADMIN_PASSWORD))
            .map(|(email, password)| (email.clone(), SecretString::from(password.as_str())));

        Ok(Self {
            jwt_secret,
            token_ttl_seconds,
            frontend_base_url,
            bootstrap_admin,
        })
    }
}
