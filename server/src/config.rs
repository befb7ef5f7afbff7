//! Service configuration.

use std::time::Duration;

use currency_common::PathPolicy;

/// Exposed-path and file mirror configuration.
#[derive(Debug, Clone)]
pub struct ExposeConfig {
    /// Resolve the exposed path from the flag resolver.
    pub use_flagd: bool,
    /// Path exposed in static mode.
    pub static_path: String,
    /// Path validation policy.
    pub policy: PathPolicy,
    /// File mirror listen port.
    pub http_port: u16,
}

impl Default for ExposeConfig {
    fn default() -> Self {
        Self {
            use_flagd: true,
            static_path: "/tmp/log.txt".to_string(),
            policy: PathPolicy::default(),
            http_port: 8081,
        }
    }
}

/// Flag resolver configuration.
#[derive(Debug, Clone)]
pub struct FlagdConfig {
    pub host: String,
    pub port: u16,
    /// Flag holding the exposed path.
    pub flag_key: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for FlagdConfig {
    fn default() -> Self {
        Self {
            host: "flagd.mem".to_string(),
            port: 8013,
            flag_key: "exposed_path".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Rate store configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    /// Table holding `code` and `rate` columns.
    pub rates_table: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Bound on a single rate query.
    pub query_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "currency-db".to_string(),
            port: 5432,
            name: "currency".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            rates_table: "currency".to_string(),
            connect_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
        }
    }
}

impl DatabaseConfig {
    /// Postgres connection URL.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Conversion API listen address.
    pub listen_addr: String,
    /// Conversion API listen port.
    pub listen_port: u16,
    /// Interval between poller ticks.
    pub poll_interval: Duration,
    /// Exposed path configuration.
    pub expose: ExposeConfig,
    /// Flag resolver configuration.
    pub flagd: FlagdConfig,
    /// Rate store configuration.
    pub database: DatabaseConfig,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 7001,
            poll_interval: Duration::from_secs(10),
            expose: ExposeConfig::default(),
            flagd: FlagdConfig::default(),
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("CURRENCY_PORT").and_then(|v| v.parse().ok()) {
            config.listen_port = port;
        }

        if let Some(secs) = lookup("POLL_TIME").and_then(|v| v.parse().ok()) {
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        // Exposed path
        if let Some(value) = lookup("EXPOSE_USE_FLAGD") {
            config.expose.use_flagd = parse_bool(&value);
        }

        if let Some(path) = lookup("EXPOSE_STATIC_PATH") {
            config.expose.static_path = path;
        }

        if let Some(value) = lookup("EXPOSE_REQUIRE_ABSOLUTE") {
            config.expose.policy.require_absolute = value == "1";
        }

        if let Some(prefix) = lookup("EXPOSE_ALLOW_PREFIX") {
            config.expose.policy.allow_prefix = prefix;
        }

        if let Some(port) = lookup("EXPOSE_HTTP_PORT").and_then(|v| v.parse().ok()) {
            config.expose.http_port = port;
        }

        // Flag resolver
        if let Some(host) = lookup("FLAGD_HOST") {
            config.flagd.host = host;
        }

        if let Some(port) = lookup("FLAGD_PORT").and_then(|v| v.parse().ok()) {
            config.flagd.port = port;
        }

        if let Some(key) = lookup("EXPOSED_FLAG_KEY") {
            config.flagd.flag_key = key;
        }

        if let Some(ms) = lookup("FLAGD_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.flagd.timeout = Duration::from_millis(ms);
        }

        // Database
        if let Some(host) = lookup("DB_HOST") {
            config.database.host = host;
        }

        if let Some(port) = lookup("DB_PORT").and_then(|v| v.parse().ok()) {
            config.database.port = port;
        }

        if let Some(name) = lookup("DB_NAME") {
            config.database.name = name;
        }

        if let Some(user) = lookup("DB_USER") {
            config.database.user = user;
        }

        if let Some(password) = lookup("DB_PASS") {
            config.database.password = password;
        }

        if let Some(table) = lookup("RATES_TABLE") {
            config.database.rates_table = table;
        }

        if let Some(ms) = lookup("DB_QUERY_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.database.query_timeout = Duration::from_millis(ms);
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.expose.http_port == 0 {
            return Err("File mirror port cannot be 0".to_string());
        }

        if self.listen_port == self.expose.http_port {
            return Err("Conversion API and file mirror cannot share a port".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("Poll interval cannot be zero".to_string());
        }

        if self.flagd.timeout.is_zero() || self.database.query_timeout.is_zero() {
            return Err("Source timeouts cannot be zero".to_string());
        }

        if self.expose.use_flagd && self.flagd.flag_key.is_empty() {
            return Err("Flag key cannot be empty in dynamic mode".to_string());
        }

        if self.database.rates_table.is_empty() {
            return Err("Rates table cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Parse a boolean switch: `1`, `true`, `yes`, `on` (any case) are true.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
