//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "medrecords";
const ENV_PREFIX: &str = "MEDRECORDS";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CACHE_PREFIX: &str = "medrecords-cache";
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_MEMORY_CAPACITY: usize = 1024;
const DEFAULT_JWT_ALGORITHM: &str = "RS256";
const DEFAULT_JWT_PRIVATE_KEY_PATH: &str = "certs/jwt-private.pem";
const DEFAULT_JWT_PUBLIC_KEY_PATH: &str = "certs/jwt-public.pem";
const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: u64 = 15;
const DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS: u64 = 7;
const DEFAULT_PASSWORD_HASH_COST: u32 = 12;
const MIN_PASSWORD_HASH_COST: u32 = 4;
const MAX_PASSWORD_HASH_COST: u32 = 31;
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_METRICS_REFRESH_SECS: u64 = 300;

/// Command-line arguments for the medrecords binary.
#[derive(Debug, Parser)]
#[command(name = "medrecords", version, about = "Medical records administration server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MEDRECORDS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the Redis URL used for response caching.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the cache entry lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the metrics refresh interval.
    #[arg(long = "metrics-refresh-interval-seconds", value_name = "SECONDS")]
    pub metrics_refresh_interval_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
    pub uploads: UploadSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub api_prefix: String,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub redis_url: Option<String>,
    pub prefix: String,
    pub ttl: Duration,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub algorithm: Algorithm,
    pub keys: JwtKeys,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub password_hash_cost: u32,
}

/// Where signing material comes from; chosen by the algorithm family.
#[derive(Clone)]
pub enum JwtKeys {
    Pem {
        private_key_path: PathBuf,
        public_key_path: PathBuf,
    },
    Secret(String),
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtKeys::Pem {
                private_key_path,
                public_key_path,
            } => f
                .debug_struct("Pem")
                .field("private_key_path", private_key_path)
                .field("public_key_path", public_key_path)
                .finish(),
            JwtKeys::Secret(_) => f.write_str("Secret(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub refresh_interval: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    auth: RawAuthSettings,
    uploads: RawUploadSettings,
    metrics: RawMetricsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(seconds) = overrides.metrics_refresh_interval_seconds {
            self.metrics.refresh_interval_seconds = Some(seconds);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            auth,
            uploads,
            metrics,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            auth: build_auth_settings(auth)?,
            uploads: build_upload_settings(uploads)?,
            metrics: build_metrics_settings(metrics)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let api_prefix = normalize_prefix(
        server
            .api_prefix
            .as_deref()
            .unwrap_or(DEFAULT_API_PREFIX),
    )
    .map_err(|reason| LoadError::invalid("server.api_prefix", reason))?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        api_prefix,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let prefix = cache
        .prefix
        .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string());
    if prefix.trim().is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(LoadError::invalid(
            "cache.prefix",
            "must be non-empty and contain no whitespace",
        ));
    }

    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let memory_capacity = NonZeroUsize::new(
        cache
            .memory_capacity
            .unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("cache.memory_capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        redis_url: non_blank(cache.redis_url),
        prefix,
        ttl: Duration::from_secs(ttl_seconds),
        memory_capacity,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let algorithm_name = auth
        .algorithm
        .unwrap_or_else(|| DEFAULT_JWT_ALGORITHM.to_string());
    let algorithm = Algorithm::from_str(algorithm_name.trim())
        .map_err(|err| LoadError::invalid("auth.algorithm", format!("failed to parse: {err}")))?;

    let keys = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            let secret = non_blank(auth.secret).ok_or_else(|| {
                LoadError::invalid("auth.secret", "required for HMAC algorithms")
            })?;
            JwtKeys::Secret(secret)
        }
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => JwtKeys::Pem {
            private_key_path: auth
                .private_key_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JWT_PRIVATE_KEY_PATH)),
            public_key_path: auth
                .public_key_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JWT_PUBLIC_KEY_PATH)),
        },
        other => {
            return Err(LoadError::invalid(
                "auth.algorithm",
                format!("{other:?} is not supported; use RS256/384/512 or HS256/384/512"),
            ));
        }
    };

    let access_minutes = auth
        .access_token_expire_minutes
        .unwrap_or(DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES);
    if access_minutes == 0 {
        return Err(LoadError::invalid(
            "auth.access_token_expire_minutes",
            "must be greater than zero",
        ));
    }

    let refresh_days = auth
        .refresh_token_expire_days
        .unwrap_or(DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS);
    if refresh_days == 0 {
        return Err(LoadError::invalid(
            "auth.refresh_token_expire_days",
            "must be greater than zero",
        ));
    }

    let password_hash_cost = auth
        .password_hash_cost
        .unwrap_or(DEFAULT_PASSWORD_HASH_COST);
    if !(MIN_PASSWORD_HASH_COST..=MAX_PASSWORD_HASH_COST).contains(&password_hash_cost) {
        return Err(LoadError::invalid(
            "auth.password_hash_cost",
            format!("must be between {MIN_PASSWORD_HASH_COST} and {MAX_PASSWORD_HASH_COST}"),
        ));
    }

    Ok(AuthSettings {
        algorithm,
        keys,
        access_token_ttl: Duration::from_secs(access_minutes * 60),
        refresh_token_ttl: Duration::from_secs(refresh_days * 24 * 60 * 60),
        password_hash_cost,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings { max_request_bytes })
}

fn build_metrics_settings(metrics: RawMetricsSettings) -> Result<MetricsSettings, LoadError> {
    let refresh_seconds = metrics
        .refresh_interval_seconds
        .unwrap_or(DEFAULT_METRICS_REFRESH_SECS);
    if refresh_seconds == 0 {
        return Err(LoadError::invalid(
            "metrics.refresh_interval_seconds",
            "must be greater than zero",
        ));
    }

    Ok(MetricsSettings {
        enabled: metrics.enabled.unwrap_or(true),
        refresh_interval: Duration::from_secs(refresh_seconds),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    api_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    redis_url: Option<String>,
    prefix: Option<String>,
    ttl_seconds: Option<u64>,
    memory_capacity: Option<usize>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    algorithm: Option<String>,
    private_key_path: Option<PathBuf>,
    public_key_path: Option<PathBuf>,
    secret: Option<String>,
    access_token_expire_minutes: Option<u64>,
    refresh_token_expire_days: Option<u64>,
    password_hash_cost: Option<u32>,
}

impl std::fmt::Debug for RawAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAuthSettings")
            .field("algorithm", &self.algorithm)
            .field("private_key_path", &self.private_key_path)
            .field("public_key_path", &self.public_key_path)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMetricsSettings {
    enabled: Option<bool>,
    refresh_interval_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn normalize_prefix(prefix: &str) -> Result<String, String> {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !trimmed.starts_with('/') {
        return Err(format!("`{prefix}` must start with `/`"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(format!("`{prefix}` must not contain whitespace"));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
