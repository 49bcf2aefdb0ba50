use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// HMAC secret shared with the identity provider.
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_ttl: Duration,
    pub upload_ttl: Duration,
    /// Base of the signed upload URLs handed to clients.
    pub public_base_url: String,
    /// Blob-deletion endpoint used by permanent deletes. Local deletion when unset.
    pub delete_proxy_url: Option<String>,
}

// the secret stays out of logs
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_ttl", &self.token_ttl)
            .field("upload_ttl", &self.upload_ttl)
            .field("public_base_url", &self.public_base_url)
            .field("delete_proxy_url", &self.delete_proxy_url)
            .finish_non_exhaustive()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Quiz archive metadata and blob service")]
pub struct Args {
    /// Host to bind to (overrides ARCHIVE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ARCHIVE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where blobs are stored (overrides ARCHIVE_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides ARCHIVE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Identity token issuer (overrides ARCHIVE_STORE_JWT_ISSUER)
    #[arg(long)]
    pub jwt_issuer: Option<String>,

    /// Public base URL for signed uploads (overrides ARCHIVE_STORE_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Blob-deletion proxy URL (overrides ARCHIVE_STORE_DELETE_PROXY_URL)
    #[arg(long)]
    pub delete_proxy_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn env_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    /// Merge already parsed CLI args over the environment.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("ARCHIVE_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parsed("ARCHIVE_STORE_PORT", 3000u16)?;
        let env_storage =
            env::var("ARCHIVE_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/blobs".into());
        let env_db = env::var("ARCHIVE_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/archive_store.db".into());
        let env_issuer =
            env::var("ARCHIVE_STORE_JWT_ISSUER").unwrap_or_else(|_| "archive-store".into());
        let token_ttl = env_parsed("ARCHIVE_STORE_TOKEN_TTL_SECS", 3600u64)?;
        let upload_ttl = env_parsed("ARCHIVE_STORE_UPLOAD_TTL_SECS", 900u64)?;

        let Some(jwt_secret) = env_optional("ARCHIVE_STORE_JWT_SECRET") else {
            bail!("ARCHIVE_STORE_JWT_SECRET must be set");
        };

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or_else(|| env_optional("ARCHIVE_STORE_PUBLIC_BASE_URL"))
            .unwrap_or_else(|| format!("http://{}:{}", host, port));

        Ok(Self {
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            jwt_secret,
            jwt_issuer: args.jwt_issuer.unwrap_or(env_issuer),
            token_ttl: Duration::from_secs(token_ttl),
            upload_ttl: Duration::from_secs(upload_ttl),
            public_base_url,
            delete_proxy_url: args
                .delete_proxy_url
                .or_else(|| env_optional("ARCHIVE_STORE_DELETE_PROXY_URL")),
            host,
            port,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
