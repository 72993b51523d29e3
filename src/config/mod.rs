use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub blobs: BlobConfig,
    pub security: SecurityConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Memory,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    pub backend: BlobBackend,
    /// Directory for the local backend
    pub root: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Shared secret expected in `x-webhook-secret`; empty disables the webhook
    pub webhook_secret: String,
    /// Require access to a file referencing a blob before handing out its URL
    pub strict_blob_access: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => f.write_str("memory"),
            StorageBackend::Postgres => f.write_str("postgres"),
        }
    }
}

impl FromStr for BlobBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BlobBackend::Memory),
            "local" => Ok(BlobBackend::Local),
            other => Err(format!("unknown blob backend '{}'", other)),
        }
    }
}

impl fmt::Display for BlobBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobBackend::Memory => f.write_str("memory"),
            BlobBackend::Local => f.write_str("local"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("FILESHARE_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse().ok())
        {
            self.server.port = port;
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_BACKEND") {
            self.storage.backend = v.parse().unwrap_or(self.storage.backend);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.storage.database_url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.storage.max_connections = v.parse().unwrap_or(self.storage.max_connections);
        }

        // Blob overrides
        if let Ok(v) = env::var("BLOB_BACKEND") {
            self.blobs.backend = v.parse().unwrap_or(self.blobs.backend);
        }
        if let Ok(v) = env::var("BLOB_ROOT") {
            self.blobs.root = v;
        }
        if let Ok(v) = env::var("BLOB_PUBLIC_BASE_URL") {
            self.blobs.public_base_url = v;
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("WEBHOOK_SECRET") {
            self.security.webhook_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_STRICT_BLOB_ACCESS") {
            self.security.strict_blob_access = v.parse().unwrap_or(self.security.strict_blob_access);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        // Sweep overrides
        if let Ok(v) = env::var("SWEEP_ENABLED") {
            self.sweep.enabled = v.parse().unwrap_or(self.sweep.enabled);
        }
        if let Ok(v) = env::var("SWEEP_INTERVAL_SECS") {
            self.sweep.interval_secs = v.parse().unwrap_or(self.sweep.interval_secs);
        }

        self
    }

    /// Development defaults, without reading the environment.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: String::new(),
                max_connections: 10,
            },
            blobs: BlobConfig {
                backend: BlobBackend::Memory,
                root: "./blobs".to_string(),
                public_base_url: "http://localhost:3000/files/".to_string(),
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                webhook_secret: String::new(),
                strict_blob_access: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            sweep: SweepConfig {
                enabled: true,
                interval_secs: 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 3000 },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: String::new(),
                max_connections: 20,
            },
            blobs: BlobConfig {
                backend: BlobBackend::Local,
                root: "/var/lib/fileshare/blobs".to_string(),
                public_base_url: "https://staging.example.com/files/".to_string(),
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                webhook_secret: String::new(),
                strict_blob_access: false,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            sweep: SweepConfig {
                enabled: true,
                interval_secs: 15 * 60,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3000 },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: String::new(),
                max_connections: 50,
            },
            blobs: BlobConfig {
                backend: BlobBackend::Local,
                root: "/var/lib/fileshare/blobs".to_string(),
                public_base_url: "https://app.example.com/files/".to_string(),
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                webhook_secret: String::new(),
                strict_blob_access: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            sweep: SweepConfig {
                enabled: true,
                interval_secs: 60 * 60,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
