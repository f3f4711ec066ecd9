//! Platform handlers and the table of platforms known to dbstage.
//!
//! Each supported database is a [`PlatformSetup`] implementor selected at
//! runtime by its string key. The table is built once with
//! [`KnownPlatforms::standard`] and handed to the resolver, so tests can
//! substitute a table of fakes.

pub mod docker_setup;
pub mod local;

use crate::docker::DockerPlatform;
use crate::errors::Result;
use crate::properties::Properties;
use crate::server::{DataSourceConfig, ServerConfig};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use docker_setup::{DockerDefaults, DockerSetup};
pub use local::{H2Setup, SqliteSetup};

/// Per-run setup context handed to a platform handler
#[derive(Debug, Clone)]
pub struct SetupConfig<'a> {
    pub db: String,
    pub platform: String,
    pub database_name: String,
    pub server: &'a ServerConfig,
}

impl<'a> SetupConfig<'a> {
    pub fn new(
        db: impl Into<String>,
        platform: impl Into<String>,
        database_name: impl Into<String>,
        server: &'a ServerConfig,
    ) -> Self {
        Self {
            db: db.into(),
            platform: platform.into(),
            database_name: database_name.into(),
            server,
        }
    }

    pub fn properties(&self) -> &'a Properties {
        &self.server.properties
    }

    /// Platform scoped override, e.g. `ebean.test.postgres.port`
    pub fn platform_property(&self, key: &str) -> Option<&'a str> {
        self.properties()
            .get_trimmed(&format!("ebean.test.{}.{}", self.platform, key))
    }
}

/// Result of setting up the primary database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbSetup {
    /// Data source the tests connect with
    pub data_source: DataSourceConfig,
    /// Container launch properties; empty when nothing needs starting
    pub docker: Properties,
}

/// Capability every supported platform implements
pub trait PlatformSetup: Send + Sync {
    /// True when the platform runs in-process and needs no container
    fn is_local(&self) -> bool;

    /// Descriptor the container starter uses for this platform
    fn docker_platform(&self) -> Option<DockerPlatform> {
        None
    }

    fn setup(&self, config: &SetupConfig<'_>) -> Result<DbSetup>;

    /// Data source for a secondary (non-primary) database
    fn setup_extra_db_data_source(&self, config: &SetupConfig<'_>) -> Result<DataSourceConfig>;
}

/// Immutable name -> handler table
#[derive(Clone, Default)]
pub struct KnownPlatforms {
    platforms: BTreeMap<String, Arc<dyn PlatformSetup>>,
}

impl KnownPlatforms {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The eight platforms dbstage can set up out of the box
    pub fn standard() -> Self {
        Self::empty()
            .with("h2", Arc::new(H2Setup))
            .with("sqlite", Arc::new(SqliteSetup))
            .with("postgres", Arc::new(DockerSetup::postgres()))
            .with("postgis", Arc::new(DockerSetup::postgis()))
            .with("mysql", Arc::new(DockerSetup::mysql()))
            .with("sqlserver", Arc::new(DockerSetup::sqlserver()))
            .with("oracle", Arc::new(DockerSetup::oracle()))
            .with("hana", Arc::new(DockerSetup::hana()))
    }

    pub fn with(mut self, name: impl Into<String>, setup: Arc<dyn PlatformSetup>) -> Self {
        self.platforms.insert(name.into(), setup);
        self
    }

    /// Case-sensitive lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn PlatformSetup>> {
        self.platforms.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn PlatformSetup>)> {
        self.platforms.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

impl fmt::Debug for KnownPlatforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
