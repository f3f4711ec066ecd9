use crate::properties::Properties;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_NAME: &str = "db";

/// Connection settings the test suite uses to reach its database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

/// Server under test: its name, configuration properties and data source
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub properties: Properties,
    pub data_source: Option<DataSourceConfig>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, properties: Properties) -> Self {
        Self {
            name: name.into(),
            properties,
            data_source: None,
        }
    }

    /// Primary server named "db"
    pub fn with_properties(properties: Properties) -> Self {
        Self::new(DEFAULT_SERVER_NAME, properties)
    }
}
