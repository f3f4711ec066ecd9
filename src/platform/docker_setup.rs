// Platforms provisioned through a docker container
use crate::docker::{DockerPlatform, DEFAULT_STARTUP_TIMEOUT};
use crate::errors::{DbStageError, Result};
use crate::platform::{DbSetup, PlatformSetup, SetupConfig};
use crate::properties::{Properties, EXTRA_DB, USE_DOCKER};
use crate::server::DataSourceConfig;
use std::fmt;

/// Built-in defaults for one docker platform
#[derive(Clone, Copy)]
pub struct DockerDefaults {
    pub descriptor: DockerPlatform,
    pub port: u16,
    pub image: &'static str,
    pub version: &'static str,
    pub password: &'static str,
    /// Login the image ships with; None means a user named after the database
    pub user: Option<&'static str>,
    pub driver: &'static str,
    pub url: fn(port: u16, database_name: &str) -> String,
}

impl fmt::Debug for DockerDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerDefaults")
            .field("descriptor", &self.descriptor)
            .field("port", &self.port)
            .field("image", &self.image)
            .field("version", &self.version)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Container settings after applying `ebean.test.<platform>.*` overrides
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    port: u16,
    image: String,
    version: String,
    container_name: String,
    username: String,
    password: String,
    startup_timeout: String,
    /// Login shared by the extra databases, when not one login per database
    extra_db_user: Option<String>,
}

/// Shared setup for every container based platform
#[derive(Debug, Clone)]
pub struct DockerSetup {
    defaults: DockerDefaults,
}

impl DockerSetup {
    pub fn new(defaults: DockerDefaults) -> Self {
        Self { defaults }
    }

    pub fn postgres() -> Self {
        Self::new(DockerDefaults {
            descriptor: DockerPlatform::Postgres,
            port: 6432,
            image: "postgres",
            version: "15",
            password: "test",
            user: None,
            driver: "org.postgresql.Driver",
            url: |port, db| format!("jdbc:postgresql://localhost:{}/{}", port, db),
        })
    }

    pub fn postgis() -> Self {
        Self::new(DockerDefaults {
            descriptor: DockerPlatform::Postgis,
            image: "postgis/postgis",
            version: "15-3.3",
            ..Self::postgres().defaults
        })
    }

    pub fn mysql() -> Self {
        Self::new(DockerDefaults {
            descriptor: DockerPlatform::MySql,
            port: 4306,
            image: "mysql",
            version: "8.0",
            password: "test",
            user: None,
            driver: "com.mysql.cj.jdbc.Driver",
            url: |port, db| format!("jdbc:mysql://localhost:{}/{}", port, db),
        })
    }

    pub fn sqlserver() -> Self {
        Self::new(DockerDefaults {
            descriptor: DockerPlatform::SqlServer,
            port: 1433,
            image: "mcr.microsoft.com/mssql/server",
            version: "2019-latest",
            password: "SqlS3rv#r",
            user: Some("sa"),
            driver: "com.microsoft.sqlserver.jdbc.SQLServerDriver",
            url: |port, db| {
                format!(
                    "jdbc:sqlserver://localhost:{};databaseName={};integratedSecurity=false;trustServerCertificate=true",
                    port, db
                )
            },
        })
    }

    pub fn oracle() -> Self {
        Self::new(DockerDefaults {
            descriptor: DockerPlatform::Oracle,
            port: 1521,
            image: "gvenzl/oracle-xe",
            version: "21-slim",
            password: "test",
            user: None,
            driver: "oracle.jdbc.OracleDriver",
            url: |port, _db| format!("jdbc:oracle:thin:@localhost:{}/XEPDB1", port),
        })
    }

    pub fn hana() -> Self {
        Self::new(DockerDefaults {
            descriptor: DockerPlatform::Hana,
            port: 39017,
            image: "saplabs/hanaexpress",
            version: "2.00.061.00.20220519.1",
            password: "HXEHana1",
            user: Some("SYSTEM"),
            driver: "com.sap.db.jdbc.Driver",
            // HXE is the tenant database of HANA express
            url: |port, _db| format!("jdbc:sap://localhost:{}/?databaseName=HXE", port),
        })
    }

    pub fn defaults(&self) -> &DockerDefaults {
        &self.defaults
    }

    fn settings(&self, config: &SetupConfig<'_>) -> Result<Settings> {
        let port = match config.platform_property("port") {
            Some(raw) => raw.parse::<u16>().map_err(|_| DbStageError::Setup {
                platform: config.platform.clone(),
                message: format!("invalid port '{}'", raw),
            })?,
            None => self.defaults.port,
        };

        let value = |key: &str, default: &str| {
            config
                .platform_property(key)
                .unwrap_or(default)
                .to_string()
        };

        Ok(Settings {
            port,
            image: value("image", self.defaults.image),
            version: value("version", self.defaults.version),
            container_name: value("containerName", &format!("ut_{}", config.platform)),
            username: value(
                "username",
                self.defaults.user.unwrap_or(config.database_name.as_str()),
            ),
            password: value("password", self.defaults.password),
            startup_timeout: value("startupTimeout", DEFAULT_STARTUP_TIMEOUT),
            extra_db_user: config
                .platform_property("username")
                .or(self.defaults.user)
                .map(str::to_string),
        })
    }

    fn data_source(&self, settings: &Settings, database_name: &str) -> DataSourceConfig {
        DataSourceConfig {
            url: (self.defaults.url)(settings.port, database_name),
            username: settings.username.clone(),
            password: settings.password.clone(),
            driver: Some(self.defaults.driver.to_string()),
        }
    }

    fn docker_properties(&self, config: &SetupConfig<'_>, settings: &Settings) -> Properties {
        let platform = self.defaults.descriptor;
        let database_name = &config.database_name;
        let mut docker = Properties::from_pairs([
            (platform.property("image"), settings.image.clone()),
            (platform.property("version"), settings.version.clone()),
            (platform.property("containerName"), settings.container_name.clone()),
            (platform.property("port"), settings.port.to_string()),
            (platform.property("dbName"), database_name.to_string()),
            (platform.property("dbUser"), settings.username.clone()),
            (platform.property("dbPassword"), settings.password.clone()),
            (platform.property("startupTimeout"), settings.startup_timeout.clone()),
        ]);

        // extra data sources connect to databases created here
        if let Some(extra) = config.properties().get_trimmed(EXTRA_DB) {
            docker.set(platform.property("extraDb"), extra);
            if let Some(user) = &settings.extra_db_user {
                docker.set(platform.property("extraDbUser"), user.as_str());
            }
        }
        docker
    }
}

impl PlatformSetup for DockerSetup {
    fn is_local(&self) -> bool {
        false
    }

    fn docker_platform(&self) -> Option<DockerPlatform> {
        Some(self.defaults.descriptor)
    }

    fn setup(&self, config: &SetupConfig<'_>) -> Result<DbSetup> {
        let settings = self.settings(config)?;
        let data_source = self.data_source(&settings, &config.database_name);

        // useDocker=false: the database is already running somewhere
        let docker = if config.properties().flag_or(USE_DOCKER, true) {
            self.docker_properties(config, &settings)
        } else {
            tracing::debug!(platform = %config.platform, "docker disabled, using existing database");
            Properties::new()
        };

        Ok(DbSetup {
            data_source,
            docker,
        })
    }

    /// Same container; the database must be listed in `ebean.test.extraDb`
    fn setup_extra_db_data_source(&self, config: &SetupConfig<'_>) -> Result<DataSourceConfig> {
        let settings = self.settings(config)?;
        Ok(self.data_source(&settings, &config.database_name))
    }
}
