/// Configuration management for the API server
///
/// Settings are layered with the `config` crate:
///
/// 1. Built-in defaults
/// 2. Optional `ecometer.toml` in the working directory
/// 3. Environment variables (a `.env` file is loaded first via `dotenvy`)
///
/// All layers use the same flat keys; environment names are the upper-case
/// form of the file keys (`api_port` / `API_PORT`).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required unless `STORAGE=memory`)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8000)
/// - `API_CORS_ORIGINS`: Comma-separated origins, `*` for any (default: http://localhost:3000,http://localhost:3001)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `JWT_ALGORITHM`: HS256, HS384 or HS512 (default: HS256)
/// - `JWT_TTL_MINUTES`: Access token lifetime, at most one year (default: 480)
/// - `LOG_LEVEL`: Default filter when `RUST_LOG` is unset (default: info)
/// - `LOG_FORMAT`: `text` or `json` (default: text)
/// - `STORAGE`: `postgres` or `memory` (default: postgres)
///
/// # Example
///
/// ```no_run
/// use ecometer_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use chrono::Duration;
use ecometer_shared::auth::jwt::{parse_algorithm, TokenIssuer};
use serde::{Deserialize, Serialize};

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime (one year)
pub const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Storage backend
    pub storage: StorageBackend,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL (empty with in-memory storage)
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Signing algorithm name
    pub algorithm: String,

    /// Access token lifetime in minutes
    pub ttl_minutes: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL via sqlx
    Postgres,

    /// Process memory; data is lost on exit
    Memory,
}

/// Flat key set shared by the file and environment layers
#[derive(Debug, Deserialize)]
struct Settings {
    api_host: String,
    api_port: u16,
    api_cors_origins: String,
    api_production: bool,
    #[serde(default)]
    database_url: String,
    database_max_connections: u32,
    #[serde(default)]
    jwt_secret: String,
    jwt_algorithm: String,
    jwt_ttl_minutes: i64,
    log_level: String,
    log_format: LogFormat,
    storage: StorageBackend,
}

fn builder_with_defaults() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("api_host", "0.0.0.0")?
        .set_default("api_port", 8000)?
        .set_default("api_cors_origins", "http://localhost:3000,http://localhost:3001")?
        .set_default("api_production", false)?
        .set_default("database_max_connections", 10)?
        .set_default("jwt_algorithm", "HS256")?
        .set_default("jwt_ttl_minutes", 480)?
        .set_default("log_level", "info")?
        .set_default("log_format", "text")?
        .set_default("storage", "postgres")?)
}

impl Config {
    /// Loads configuration from defaults, `ecometer.toml` and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A value cannot be parsed
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - `JWT_ALGORITHM` is not an HMAC algorithm
    /// - `DATABASE_URL` is missing with PostgreSQL storage
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_environment(None)
    }

    /// Layers `vars` (or the process environment when `None`) over the file
    ///
    /// Typed keys are parsed from their string form, except `JWT_SECRET`,
    /// which is taken verbatim so digit-only secrets keep every character.
    fn from_environment(vars: Option<config::Map<String, String>>) -> anyhow::Result<Self> {
        let raw_secret = match &vars {
            Some(vars) => vars.get("JWT_SECRET").cloned(),
            None => std::env::var("JWT_SECRET").ok(),
        };

        let settings = builder_with_defaults()?
            .add_source(config::File::with_name("ecometer").required(false))
            .add_source(config::Environment::default().try_parsing(true).source(vars))
            .set_override_option("jwt_secret", raw_secret)?
            .build()
            .context("Failed to read configuration")?;

        Self::from_settings(settings)
    }

    /// Loads configuration from a TOML document layered over the defaults
    ///
    /// The environment is not consulted.
    pub fn from_toml(document: &str) -> anyhow::Result<Self> {
        let settings = builder_with_defaults()?
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()
            .context("Failed to read configuration")?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
        let raw: Settings = settings
            .try_deserialize()
            .context("Invalid configuration value")?;

        let config = Self {
            api: ApiConfig {
                host: raw.api_host,
                port: raw.api_port,
                cors_origins: raw
                    .api_cors_origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect(),
                production: raw.api_production,
            },
            database: DatabaseConfig {
                url: raw.database_url,
                max_connections: raw.database_max_connections,
            },
            jwt: JwtConfig {
                secret: raw.jwt_secret,
                algorithm: raw.jwt_algorithm,
                ttl_minutes: raw.jwt_ttl_minutes,
            },
            logging: LoggingConfig {
                level: raw.log_level,
                format: raw.log_format,
            },
            storage: raw.storage,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET environment variable is required");
        }
        if self.jwt.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LEN);
        }

        parse_algorithm(&self.jwt.algorithm)?;

        if self.jwt.ttl_minutes <= 0 {
            anyhow::bail!("JWT_TTL_MINUTES must be positive");
        }
        if self.jwt.ttl_minutes > MAX_TTL_MINUTES {
            anyhow::bail!("JWT_TTL_MINUTES must be at most {}", MAX_TTL_MINUTES);
        }

        if self.storage == StorageBackend::Postgres && self.database.url.is_empty() {
            anyhow::bail!("DATABASE_URL environment variable is required");
        }

        Ok(())
    }

    /// Builds the token issuer from the JWT settings
    pub fn token_issuer(&self) -> anyhow::Result<TokenIssuer> {
        let algorithm = parse_algorithm(&self.jwt.algorithm)?;

        Ok(TokenIssuer::new(
            &self.jwt.secret,
            algorithm,
            Duration::minutes(self.jwt.ttl_minutes),
        ))
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_LINE: &str = "jwt_secret = \"test-secret-key-at-least-32-bytes-long\"\n";

    #[test]
    fn test_defaults() {
        let config = Config::from_toml(&format!(
            "{SECRET_LINE}database_url = \"postgresql://localhost/ecometer\"\n"
        ))
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(
            config.api.cors_origins,
            vec!["http://localhost:3000", "http://localhost:3001"]
        );
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.jwt.algorithm, "HS256");
        assert_eq!(config.jwt.ttl_minutes, 480);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.storage, StorageBackend::Postgres);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_toml(&format!(
            "{SECRET_LINE}\
             storage = \"memory\"\n\
             api_port = 9090\n\
             api_cors_origins = \"*\"\n\
             jwt_algorithm = \"HS512\"\n\
             jwt_ttl_minutes = 30\n\
             log_format = \"json\"\n"
        ))
        .unwrap();

        assert_eq!(config.api.port, 9090);
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.token_issuer().unwrap().ttl().num_minutes(), 30);
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = Config::from_toml("storage = \"memory\"\njwt_secret = \"short\"\n").unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_missing_secret_rejected() {
        assert!(Config::from_toml("storage = \"memory\"\n").is_err());
    }

    #[test]
    fn test_asymmetric_algorithm_rejected() {
        let result = Config::from_toml(&format!(
            "{SECRET_LINE}storage = \"memory\"\njwt_algorithm = \"RS256\"\n"
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = Config::from_toml(SECRET_LINE).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_unknown_storage_rejected() {
        assert!(Config::from_toml(&format!("{SECRET_LINE}storage = \"redis\"\n")).is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        let at_cap = Config::from_toml(&format!(
            "{SECRET_LINE}storage = \"memory\"\njwt_ttl_minutes = {MAX_TTL_MINUTES}\n"
        ))
        .unwrap();
        assert_eq!(
            at_cap.token_issuer().unwrap().ttl().num_minutes(),
            MAX_TTL_MINUTES
        );

        for ttl in [MAX_TTL_MINUTES + 1, i64::MAX] {
            let err = Config::from_toml(&format!(
                "{SECRET_LINE}storage = \"memory\"\njwt_ttl_minutes = {ttl}\n"
            ))
            .unwrap_err();
            assert!(err.to_string().contains("at most"), "{}", err);
        }
    }

    #[test]
    fn test_digit_only_secret_from_environment_kept_verbatim() {
        let secret = "000123456789012345678901234567890123456789";
        let vars = config::Map::from([
            ("JWT_SECRET".to_string(), secret.to_string()),
            ("STORAGE".to_string(), "memory".to_string()),
            ("API_PORT".to_string(), "9000".to_string()),
        ]);

        let config = Config::from_environment(Some(vars)).unwrap();
        assert_eq!(config.jwt.secret, secret);
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_toml(&format!("{SECRET_LINE}storage = \"memory\"\n")).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("test-secret-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
