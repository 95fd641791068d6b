/// Mint a session token for local testing of the /api routes.
///
/// Usage: mint-session --email a@vitbhopal.ac.in [--ttl 3600]
///   Reads AUTH_JWT_SECRET from the environment (or .env).

use clap::Parser;
use uuid::Uuid;

use placementsync_api::services::auth::issue_session_token;

#[derive(Parser)]
#[command(name = "mint-session", about = "Print a signed session token for an email")]
struct Args {
    /// Email the token is issued for
    #[arg(long)]
    email: String,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = 3600)]
    ttl: u64,

    /// Subject UUID (random if omitted)
    #[arg(long)]
    user_id: Option<Uuid>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let secret = std::env::var("AUTH_JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("Missing required env var: AUTH_JWT_SECRET"))?;

    let user_id = args.user_id.unwrap_or_else(Uuid::new_v4);
    let token = issue_session_token(user_id, &args.email, &secret, args.ttl)?;
    tracing::info!("Issued token for {} (sub {}) valid {}s", args.email, user_id, args.ttl);
    println!("{token}");

    Ok(())
}
