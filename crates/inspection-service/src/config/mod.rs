use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub peers: PeersConfig,
    pub templates: TemplatesConfig,
    pub kafka: KafkaConfig,
    pub events: EventsConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let telemetry = TelemetryConfig {
            log_level: var_or("APP_LOG_LEVEL", "info"),
            format: LogFormat::from_str(&var_or("APP_LOG_FORMAT", "compact"))?,
        };

        let peers = PeersConfig {
            analyzer_url: var_or("ANALYZER_SERVICE_URL", "http://localhost:8081"),
            brigade_url: var_or("BRIGADE_SERVICE_URL", "http://localhost:8082"),
            file_url: var_or("FILE_SERVICE_URL", "http://localhost:8083"),
            subscriber_url: var_or("SUBSCRIBER_SERVICE_URL", "http://localhost:8084"),
            task_url: var_or("TASK_SERVICE_URL", "http://localhost:8085"),
            timeout_secs: parse_var("PEER_TIMEOUT_SECS", 60)?,
        };

        let templates = TemplatesConfig {
            universal: var_or("TEMPLATE_UNIVERSAL", "templates/universal.docx"),
            control: var_or("TEMPLATE_CONTROL", "templates/control.docx"),
        };

        let kafka = KafkaConfig {
            brokers: env::var("KAFKA_BROKERS")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|broker| !broker.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            inspections_topic: var_or("KAFKA_INSPECTIONS_TOPIC", "inspections"),
            tasks_topic: var_or("KAFKA_TASKS_TOPIC", "tasks"),
            consumer_group: var_or("KAFKA_CONSUMER_GROUP", "inspection-service"),
            handler_timeout_secs: parse_var("KAFKA_HANDLER_TIMEOUT_SECS", 120)?,
        };

        let events = EventsConfig {
            channel_capacity: parse_var("EVENT_CHANNEL_CAPACITY", 1024)?,
            drain_timeout_ms: parse_var("EVENT_DRAIN_TIMEOUT_MS", 5000)?,
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .ok()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            acquire_timeout_secs: parse_var("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry,
            peers,
            templates,
            kafka,
            events,
            database,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Base URLs of the peer services.
#[derive(Debug, Clone)]
pub struct PeersConfig {
    pub analyzer_url: String,
    pub brigade_url: String,
    pub file_url: String,
    pub subscriber_url: String,
    pub task_url: String,
    pub timeout_secs: u64,
}

/// Paths of the act templates.
#[derive(Debug, Clone)]
pub struct TemplatesConfig {
    pub universal: String,
    pub control: String,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub inspections_topic: String,
    pub tasks_topic: String,
    pub consumer_group: String,
    pub handler_timeout_secs: u64,
}

impl KafkaConfig {
    pub fn is_configured(&self) -> bool {
        !self.brokers.is_empty()
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

/// Sizing of the outbound event queue.
#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub channel_capacity: usize,
    pub drain_timeout_ms: u64,
}

/// Postgres connection settings; inspections stay in memory when no URL is set.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidLogFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json', got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidLogFormat(_) => None,
        }
    }
}
