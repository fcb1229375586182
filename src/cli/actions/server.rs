use crate::{
    api::{self, ServerSettings},
    cli::telemetry,
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub bootstrap_admin: Option<(String, SecretString)>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is invalid, the database is unreachable, or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        token_ttl_seconds = args.token_ttl_seconds,
        bootstrap_admin = args.bootstrap_admin.is_some(),
        "starting server"
    );

    let settings = ServerSettings {
        jwt_secret: args.jwt_secret,
        token_ttl_seconds: args.token_ttl_seconds,
        frontend_base_url: args.frontend_base_url,
        bootstrap_admin: args.bootstrap_admin,
    };
    let result = api::new(args.port, args.dsn, settings).await;

    telemetry::shutdown_tracer();
    result
}
