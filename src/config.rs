//! Runtime configuration, loaded from the environment and overridable by CLI flags.

use clap::Parser;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub fast_store_url: String,
    pub document_store_url: String,
    pub document_store_db: String,
    pub session_ttl_hours: i64,
    pub default_question_seconds: u32,
    pub cors_origins: Vec<String>,
}

/// Command-line overrides for [`Config`].
///
/// Flags take precedence over environment variables when supplied; any flag
/// left unset falls back to the corresponding environment variable and then
/// to a built-in default.
#[derive(Debug, Parser)]
#[command(author, version, about = "Real-time multiplayer quiz session engine")]
pub struct Cli {
    /// Address to bind the HTTP/WebSocket listener on.
    #[arg(long)]
    pub bind: Option<String>,

    /// Fast store (Redis) connection string.
    #[arg(long)]
    pub fast_store_url: Option<String>,

    /// Document store (MongoDB) connection string.
    #[arg(long)]
    pub document_store_url: Option<String>,

    /// `tracing-subscriber` env-filter directive, e.g. `info` or `debug`.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Config {
    /// Build configuration from environment variables, applying CLI overrides.
    ///
    /// Fails if a required value (fast store / document store URL) is missing
    /// from both the CLI and the environment.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let bind_addr = cli
            .bind
            .clone()
            .or_else(|| std::env::var("BIND_ADDR").ok())
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let fast_store_url = cli
            .fast_store_url
            .clone()
            .or_else(|| std::env::var("FAST_STORE_URL").ok())
            .ok_or_else(|| anyhow::anyhow!("FAST_STORE_URL is not set"))?;

        let document_store_url = cli
            .document_store_url
            .clone()
            .or_else(|| std::env::var("DOCUMENT_STORE_URL").ok())
            .ok_or_else(|| anyhow::anyhow!("DOCUMENT_STORE_URL is not set"))?;

        let document_store_db =
            std::env::var("DOCUMENT_STORE_DB").unwrap_or_else(|_| "quiz".to_string());

        let session_ttl_hours = std::env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6);

        let default_question_seconds = std::env::var("DEFAULT_QUESTION_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bind_addr,
            fast_store_url,
            document_store_url,
            document_store_db,
            session_ttl_hours,
            default_question_seconds,
            cors_origins,
        })
    }

    /// The `tracing-subscriber` env-filter directive to initialize logging with.
    pub fn log_level(cli: &Cli) -> String {
        cli.log_level
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }
}
