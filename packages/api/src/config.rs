use session_engine::config::{optional, required};
use session_engine::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    DynamoDb,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "dynamodb" => Ok(StorageBackend::DynamoDb),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub storage: StorageBackend,
    pub jwt_secret: String,
    /// Without an endpoint, notifications are only logged.
    pub websocket_endpoint: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            port: optional("PORT", 3000)?,
            storage: optional("STORAGE_BACKEND", StorageBackend::DynamoDb)?,
            jwt_secret: required("JWT_SECRET")?,
            websocket_endpoint: std::env::var("WEBSOCKET_API_ENDPOINT")
                .ok()
                .filter(|endpoint| !endpoint.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("DynamoDB".parse::<StorageBackend>(), Ok(StorageBackend::DynamoDb));
        assert!("redis".parse::<StorageBackend>().is_err());
    }
}
