//! Sets the custom admin claim on one directory account.
//!
//! Only the claim is written; the profile flag is left alone, so the account
//! shows up in the admin listing with `firestoreIsAdmin: false` until an admin
//! grants through the API.

use anyhow::{Result, bail};
use archive_store::{db, services::user_directory::UserDirectory};
use clap::Parser;
use std::{env, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Set or clear the isAdmin custom claim")]
struct Args {
    /// Account uid
    uid: String,

    /// Clear the claim instead of setting it
    #[arg(long)]
    revoke: bool,

    /// Database URL (overrides ARCHIVE_STORE_DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let database_url = args.database_url.unwrap_or_else(|| {
        env::var("ARCHIVE_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/archive_store.db".into())
    });

    let pool = db::connect(&database_url).await?;
    db::run_migrations(&pool).await?;
    let users = UserDirectory::new(Arc::new(pool));

    let is_admin = !args.revoke;
    if !users.set_admin_claim(&args.uid, is_admin).await? {
        bail!("no account with uid {}", args.uid);
    }
    println!("claim isAdmin={} set for {}", is_admin, args.uid);
    Ok(())
}
