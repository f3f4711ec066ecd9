// Search index setup, run alongside database provisioning
use crate::docker::{ContainerStarter, DockerPlatform, DEFAULT_STARTUP_TIMEOUT};
use crate::errors::{DbStageError, Result};
use crate::properties::Properties;
use std::sync::Arc;

pub const ELASTIC_VERSION: &str = "ebean.test.elastic.version";
pub const ELASTIC_PORT: &str = "ebean.test.elastic.port";
pub const ELASTIC_IMAGE: &str = "ebean.test.elastic.image";
pub const ELASTIC_CONTAINER: &str = "ebean.test.elastic.containerName";

const DEFAULT_ELASTIC_PORT: &str = "9201";
const DEFAULT_ELASTIC_IMAGE: &str = "docker.elastic.co/elasticsearch/elasticsearch";
const DEFAULT_ELASTIC_CONTAINER: &str = "ut_elastic";

/// Prepares the search index backend for a test run
pub trait IndexSetup: Send + Sync {
    fn run(&self, properties: &Properties) -> Result<()>;
}

/// Starts an ElasticSearch container when a version is configured
pub struct ElasticSearchSetup {
    containers: Arc<dyn ContainerStarter>,
}

impl ElasticSearchSetup {
    pub fn new(containers: Arc<dyn ContainerStarter>) -> Self {
        Self { containers }
    }

    /// Docker properties for the elastic container, None when not configured
    pub fn docker_properties(properties: &Properties) -> Option<Properties> {
        let version = properties.get_trimmed(ELASTIC_VERSION)?;
        let platform = DockerPlatform::ElasticSearch;

        let mut docker = Properties::new();
        docker.set(platform.property("version"), version);
        docker.set(
            platform.property("image"),
            properties.get_or(ELASTIC_IMAGE, DEFAULT_ELASTIC_IMAGE),
        );
        docker.set(
            platform.property("port"),
            properties.get_or(ELASTIC_PORT, DEFAULT_ELASTIC_PORT),
        );
        docker.set(
            platform.property("containerName"),
            properties.get_or(ELASTIC_CONTAINER, DEFAULT_ELASTIC_CONTAINER),
        );
        docker.set(platform.property("startupTimeout"), DEFAULT_STARTUP_TIMEOUT);
        Some(docker)
    }
}

impl IndexSetup for ElasticSearchSetup {
    fn run(&self, properties: &Properties) -> Result<()> {
        let Some(docker) = Self::docker_properties(properties) else {
            tracing::trace!("no elastic version configured, skipping index setup");
            return Ok(());
        };

        self.containers
            .start(&docker, DockerPlatform::ElasticSearch)
            .map_err(|e| DbStageError::IndexSetup(e.to_string()))?;
        Ok(())
    }
}

/// Index setup that does nothing, for suites without a search backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndexSetup;

impl IndexSetup for NoIndexSetup {
    fn run(&self, _properties: &Properties) -> Result<()> {
        Ok(())
    }
}
