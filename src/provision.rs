//! Provisioning of the resolved test platform.
//!
//! [`ProvisioningCoordinator`] turns a resolved platform into a ready
//! database: it picks the database name, runs the search index setup and the
//! database setup on two scoped threads, joins both, and records the data
//! source on the [`ServerConfig`]. A failure in one branch never cancels the
//! other; the error is reported once both have finished.

use crate::docker::{ContainerStarter, DockerContainerStarter, DockerPlatform, StartedContainer};
use crate::errors::{DbStageError, Result};
use crate::platform::{DbSetup, KnownPlatforms, SetupConfig};
use crate::properties::{Properties, DB_NAME, DEBUG};
use crate::resolver::{PlatformResolver, Resolution, ResolvedPlatform};
use crate::search::{ElasticSearchSetup, IndexSetup};
use crate::server::{DataSourceConfig, ServerConfig};
use serde::Serialize;
use std::sync::Arc;
use std::thread;

/// Database name used by local platforms when none is configured
pub const DEFAULT_LOCAL_DB_NAME: &str = "test_db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoPlatform,
    UnknownPlatform(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisionOutcome {
    Skipped {
        reason: SkipReason,
    },
    Provisioned {
        platform: String,
        db: String,
        database_name: String,
        data_source: DataSourceConfig,
        container: Option<StartedContainer>,
    },
    ExtraDataSource {
        platform: String,
        db: String,
        data_source: DataSourceConfig,
    },
}

impl ProvisionOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, ProvisionOutcome::Skipped { .. })
    }
}

pub struct ProvisioningCoordinator {
    known: KnownPlatforms,
    index: Arc<dyn IndexSetup>,
    containers: Arc<dyn ContainerStarter>,
}

impl ProvisioningCoordinator {
    pub fn new(
        known: KnownPlatforms,
        index: Arc<dyn IndexSetup>,
        containers: Arc<dyn ContainerStarter>,
    ) -> Self {
        Self {
            known,
            index,
            containers,
        }
    }

    /// Standard platforms, docker CLI containers and ElasticSearch index setup
    pub fn standard() -> Self {
        let containers: Arc<dyn ContainerStarter> = Arc::new(DockerContainerStarter::new());
        let index = Arc::new(ElasticSearchSetup::new(containers.clone()));
        Self::new(KnownPlatforms::standard(), index, containers)
    }

    pub fn known(&self) -> &KnownPlatforms {
        &self.known
    }

    pub fn resolve(&self, db_hint: Option<&str>, properties: &Properties) -> Resolution {
        PlatformResolver::new(&self.known).resolve(db_hint, properties)
    }

    /// Resolve the test platform and, when known, set it up for testing
    pub fn run(&self, db_hint: Option<&str>, server: &mut ServerConfig) -> Result<ProvisionOutcome> {
        match self.resolve(db_hint, &server.properties) {
            Resolution::Unresolved => Ok(ProvisionOutcome::Skipped {
                reason: SkipReason::NoPlatform,
            }),
            Resolution::Unknown { platform, .. } => Ok(ProvisionOutcome::Skipped {
                reason: SkipReason::UnknownPlatform(platform),
            }),
            Resolution::Known(resolved) => self.provision(&resolved, server),
        }
    }

    /// Set up a resolved platform: index and database in parallel
    pub fn provision(
        &self,
        resolved: &ResolvedPlatform,
        server: &mut ServerConfig,
    ) -> Result<ProvisionOutcome> {
        let database_name = determine_database_name(resolved, &server.properties)?;

        let (data_source, container) = {
            let config = SetupConfig::new(&resolved.db, &resolved.platform, &database_name, server);
            self.setup_for_testing(resolved, &config)?
        };

        tracing::info!(
            platform = %resolved.platform,
            db = %resolved.db,
            database = %database_name,
            url = %data_source.url,
            "test platform ready"
        );
        server.data_source = Some(data_source.clone());

        Ok(ProvisionOutcome::Provisioned {
            platform: resolved.platform.clone(),
            db: resolved.db.clone(),
            database_name,
            data_source,
            container,
        })
    }

    /// Configure the data source of a secondary database
    ///
    /// The server config's own name is both the db and the database name.
    /// No index setup runs and no container is started.
    pub fn configure_extra_data_source(
        &self,
        db_hint: Option<&str>,
        server: &mut ServerConfig,
    ) -> Result<ProvisionOutcome> {
        let resolved = match self.resolve(db_hint, &server.properties) {
            Resolution::Unresolved => {
                return Ok(ProvisionOutcome::Skipped {
                    reason: SkipReason::NoPlatform,
                })
            }
            Resolution::Unknown { platform, .. } => {
                return Ok(ProvisionOutcome::Skipped {
                    reason: SkipReason::UnknownPlatform(platform),
                })
            }
            Resolution::Known(resolved) => resolved,
        };

        let name = server.name.clone();
        let data_source = {
            let config = SetupConfig::new(&name, &resolved.platform, &name, server);
            resolved.setup.setup_extra_db_data_source(&config)?
        };

        tracing::debug!(
            "configured dataSource for extraDb name:{} url:{}",
            name,
            data_source.url
        );
        server.data_source = Some(data_source.clone());

        Ok(ProvisionOutcome::ExtraDataSource {
            platform: resolved.platform,
            db: name,
            data_source,
        })
    }

    /// Fork-join of the two setup branches
    fn setup_for_testing(
        &self,
        resolved: &ResolvedPlatform,
        config: &SetupConfig<'_>,
    ) -> Result<(DataSourceConfig, Option<StartedContainer>)> {
        let properties = config.properties();

        let (index, database) = thread::scope(|s| {
            let index = s.spawn(|| self.index.run(properties));
            let database = s.spawn(|| self.setup_database(resolved, config));
            (index.join(), database.join())
        });

        // Both branches have finished; report in argument order
        index.map_err(|_| DbStageError::BranchPanicked("search index"))??;
        database.map_err(|_| DbStageError::BranchPanicked("database"))?
    }

    fn setup_database(
        &self,
        resolved: &ResolvedPlatform,
        config: &SetupConfig<'_>,
    ) -> Result<(DataSourceConfig, Option<StartedContainer>)> {
        let DbSetup {
            data_source,
            docker,
        } = resolved.setup.setup(config)?;

        if docker.is_empty() {
            return Ok((data_source, None));
        }

        if is_debug(config.properties()) {
            tracing::info!("Docker properties: {}", docker);
        } else {
            tracing::debug!("Docker properties: {}", docker);
        }

        let platform = docker_platform(resolved)?;

        // start the docker container with appropriate configuration
        let started = self.containers.start(&docker, platform)?;
        Ok((data_source, Some(started)))
    }
}

fn docker_platform(resolved: &ResolvedPlatform) -> Result<DockerPlatform> {
    resolved
        .setup
        .docker_platform()
        .ok_or_else(|| DbStageError::Setup {
            platform: resolved.platform.clone(),
            message: "returned docker properties but has no docker platform".to_string(),
        })
}

fn is_debug(properties: &Properties) -> bool {
    properties.is_true(DEBUG)
}

/// Explicit `ebean.test.dbName`, else "test_db" for local platforms
pub fn determine_database_name(
    resolved: &ResolvedPlatform,
    properties: &Properties,
) -> Result<String> {
    if let Some(name) = properties.get_trimmed(DB_NAME) {
        return Ok(name.to_string());
    }
    if resolved.setup.is_local() {
        return Ok(DEFAULT_LOCAL_DB_NAME.to_string());
    }
    Err(DbStageError::Config(format!(
        "{} is not set but required for testing configuration with platform {}",
        DB_NAME, resolved.platform
    )))
}
