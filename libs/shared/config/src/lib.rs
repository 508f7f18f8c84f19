use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which `DataStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Supabase => write!(f, "supabase"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to memory", e);
                StorageBackend::Memory
            }),
            Err(_) if supabase_url.is_empty() => StorageBackend::Memory,
            Err(_) => StorageBackend::Supabase,
        };

        let config = Self {
            supabase_url,
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| {
                    warn!("PORT not set or invalid, using default");
                    3000
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let store_ready = match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
            }
        };

        store_ready && !self.jwt_secret.is_empty()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(backend: StorageBackend) -> AppConfig {
        AppConfig {
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            jwt_secret: "secret".to_string(),
            storage_backend: backend,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }

    #[test]
    fn parses_storage_backend_names() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("Supabase".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn memory_backend_needs_only_jwt_secret() {
        assert!(base_config(StorageBackend::Memory).is_configured());

        let mut config = base_config(StorageBackend::Memory);
        config.jwt_secret.clear();
        assert!(!config.is_configured());
    }

    #[test]
    fn supabase_backend_needs_url_and_key() {
        let mut config = base_config(StorageBackend::Supabase);
        assert!(!config.is_configured());

        config.supabase_url = "http://localhost:54321".to_string();
        config.supabase_service_key = "service-key".to_string();
        assert!(config.is_configured());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
