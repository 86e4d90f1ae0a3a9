// =============================================================================
// Endpoint descriptors — where one exchange serves price, 24h and kline data
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Base URL plus the three relative paths needed to poll one exchange.
///
/// Descriptors are built once from configuration and never mutated; a symbol
/// refers to its active descriptor by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub base_url: String,
    pub price_path: String,
    pub change_path: String,
    pub kline_path: String,
}

impl EndpointDescriptor {
    /// Public Binance spot REST API.
    pub fn binance() -> Self {
        Self {
            name: "Binance".to_string(),
            base_url: "https://api.binance.com/api/v3/".to_string(),
            price_path: "ticker/price".to_string(),
            change_path: "ticker/24hr".to_string(),
            kline_path: "klines".to_string(),
        }
    }

    pub fn price_url(&self, exchange_symbol: &str) -> String {
        format!("{}{}?symbol={}", self.base_url, self.price_path, exchange_symbol)
    }

    pub fn change_url(&self, exchange_symbol: &str) -> String {
        format!("{}{}?symbol={}", self.base_url, self.change_path, exchange_symbol)
    }

    pub fn kline_url(&self, exchange_symbol: &str, interval: &str, limit: u32) -> String {
        format!(
            "{}{}?symbol={}&interval={}&limit={}",
            self.base_url, self.kline_path, exchange_symbol, interval, limit
        )
    }
}

/// Configured descriptors, looked up by name.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointDescriptor>,
}

impl EndpointRegistry {
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        for (i, ep) in endpoints.iter().enumerate() {
            if endpoints[..i].iter().any(|other| other.name == ep.name) {
                return Err(ConfigError::DuplicateEndpoint {
                    name: ep.name.clone(),
                });
            }
        }
        Ok(Self { endpoints })
    }

    pub fn lookup(&self, name: &str) -> Result<&EndpointDescriptor, ConfigError> {
        self.endpoints
            .iter()
            .find(|ep| ep.name == name)
            .ok_or_else(|| ConfigError::DescriptorNotFound {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|ep| ep.name.as_str())
    }
}
