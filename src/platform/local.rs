// In-process platforms: nothing to start, only a data source to derive
use crate::errors::Result;
use crate::platform::{DbSetup, PlatformSetup, SetupConfig};
use crate::properties::Properties;
use crate::server::DataSourceConfig;

/// H2 in-memory database
#[derive(Debug, Default, Clone, Copy)]
pub struct H2Setup;

impl H2Setup {
    fn data_source(database_name: &str) -> DataSourceConfig {
        DataSourceConfig {
            url: format!("jdbc:h2:mem:{}", database_name),
            username: "sa".to_string(),
            password: String::new(),
            driver: Some("org.h2.Driver".to_string()),
        }
    }
}

impl PlatformSetup for H2Setup {
    fn is_local(&self) -> bool {
        true
    }

    fn setup(&self, config: &SetupConfig<'_>) -> Result<DbSetup> {
        Ok(DbSetup {
            data_source: Self::data_source(&config.database_name),
            docker: Properties::new(),
        })
    }

    fn setup_extra_db_data_source(&self, config: &SetupConfig<'_>) -> Result<DataSourceConfig> {
        Ok(Self::data_source(&config.database_name))
    }
}

/// SQLite file database in the working directory
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteSetup;

impl SqliteSetup {
    fn data_source(database_name: &str) -> DataSourceConfig {
        DataSourceConfig {
            url: format!("jdbc:sqlite:./{}.db", database_name),
            username: String::new(),
            password: String::new(),
            driver: Some("org.sqlite.JDBC".to_string()),
        }
    }
}

impl PlatformSetup for SqliteSetup {
    fn is_local(&self) -> bool {
        true
    }

    fn setup(&self, config: &SetupConfig<'_>) -> Result<DbSetup> {
        Ok(DbSetup {
            data_source: Self::data_source(&config.database_name),
            docker: Properties::new(),
        })
    }

    fn setup_extra_db_data_source(&self, config: &SetupConfig<'_>) -> Result<DataSourceConfig> {
        Ok(Self::data_source(&config.database_name))
    }
}
