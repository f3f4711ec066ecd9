// Docker platform descriptors and the container starting seam
pub mod container;

use crate::errors::{DbStageError, Result};
use crate::properties::Properties;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

pub use container::{parse_timeout, DockerContainerStarter};

/// Password of the container's administrative account (postgres, root, system)
pub const ADMIN_PASSWORD: &str = "admin";

/// Platform-specific hint telling the container starter which image
/// layout, internal port, environment and readiness check to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DockerPlatform {
    Postgres,
    Postgis,
    MySql,
    SqlServer,
    Oracle,
    Hana,
    ElasticSearch,
}

/// How the starter decides a container accepts connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Command run through `docker exec`; ready once it exits successfully
    Exec(Vec<String>),
    /// Log line printed once the service is up, searched in logs since start
    LogMarker(&'static str),
}

/// Skips a bootstrap step when `command` prints `found`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsCheck {
    pub command: Vec<String>,
    pub found: String,
}

/// A `docker exec` command creating a database or login the data source needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapStep {
    pub check: Option<ExistsCheck>,
    pub create: Vec<String>,
}

impl BootstrapStep {
    fn always(create: Vec<String>) -> Self {
        Self {
            check: None,
            create,
        }
    }

    fn unless(command: Vec<String>, found: &str, create: Vec<String>) -> Self {
        Self {
            check: Some(ExistsCheck {
                command,
                found: found.to_string(),
            }),
            create,
        }
    }
}

// sqlcmd moved to mssql-tools18 (which needs -C) in newer images
const SQLCMD_SCRIPT: &str = r#"if [ -x /opt/mssql-tools18/bin/sqlcmd ]; then exec /opt/mssql-tools18/bin/sqlcmd -C "$@"; fi; exec /opt/mssql-tools/bin/sqlcmd "$@""#;

const ORACLE_USER_CHECK: &str = r#"printf "SET HEADING OFF FEEDBACK OFF\nSELECT 'FOUND' FROM all_users WHERE username = UPPER('%s');\nexit\n" "$1" | sqlplus -s -L "system/$2@//localhost/XEPDB1""#;

fn strings<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn psql(sql: String) -> Vec<String> {
    let mut args = strings(["psql", "-U", "postgres", "-v", "ON_ERROR_STOP=1", "-tAc"]);
    args.push(sql);
    args
}

fn sqlcmd(password: &str, sql: String) -> Vec<String> {
    let mut args = strings(["sh", "-c", SQLCMD_SCRIPT, "sqlcmd", "-S", "localhost", "-U", "sa"]);
    args.extend(["-P".to_string(), password.to_string(), "-b".to_string()]);
    args.extend(["-Q".to_string(), sql]);
    args
}

impl DockerPlatform {
    /// Prefix of this platform's keys in a docker property map
    pub fn key(&self) -> &'static str {
        match self {
            DockerPlatform::Postgres => "postgres",
            DockerPlatform::Postgis => "postgis",
            DockerPlatform::MySql => "mysql",
            DockerPlatform::SqlServer => "sqlserver",
            DockerPlatform::Oracle => "oracle",
            DockerPlatform::Hana => "hana",
            DockerPlatform::ElasticSearch => "elastic",
        }
    }

    /// Fully qualified docker property name, e.g. `postgres.port`
    pub fn property(&self, name: &str) -> String {
        format!("{}.{}", self.key(), name)
    }

    /// Port the service listens on inside the container
    pub fn internal_port(&self) -> u16 {
        match self {
            DockerPlatform::Postgres | DockerPlatform::Postgis => 5432,
            DockerPlatform::MySql => 3306,
            DockerPlatform::SqlServer => 1433,
            DockerPlatform::Oracle => 1521,
            DockerPlatform::Hana => 39017,
            DockerPlatform::ElasticSearch => 9200,
        }
    }

    /// Readiness check run after the container is started
    ///
    /// The postgres and mysql images run a socket-only server while their
    /// init scripts execute, so they are checked over TCP instead of by log
    /// line.
    pub fn readiness(&self, spec: &ContainerSpec) -> Readiness {
        match self {
            DockerPlatform::Postgres | DockerPlatform::Postgis => Readiness::Exec(strings([
                "pg_isready",
                "-h",
                "127.0.0.1",
                "-p",
                "5432",
                "-U",
                "postgres",
            ])),
            DockerPlatform::MySql => Readiness::Exec(strings([
                "mysqladmin",
                "ping",
                "-h",
                "127.0.0.1",
                "--protocol=tcp",
                "--silent",
            ])),
            DockerPlatform::SqlServer => Readiness::Exec(sqlcmd(
                spec.db_password.as_deref().unwrap_or_default(),
                "SELECT 1".to_string(),
            )),
            DockerPlatform::Oracle => Readiness::LogMarker("DATABASE IS READY TO USE!"),
            DockerPlatform::Hana => Readiness::LogMarker("Startup finished!"),
            DockerPlatform::ElasticSearch => Readiness::Exec(strings([
                "curl",
                "-fsS",
                "http://localhost:9200/_cluster/health?wait_for_status=yellow&timeout=1s",
            ])),
        }
    }

    /// Environment variables passed to `docker run`
    pub fn environment(&self, spec: &ContainerSpec) -> Vec<(String, String)> {
        let password = spec.db_password.clone().unwrap_or_default();

        let pairs: Vec<(&str, String)> = match self {
            DockerPlatform::Postgres | DockerPlatform::Postgis => {
                vec![("POSTGRES_PASSWORD", ADMIN_PASSWORD.to_string())]
            }
            DockerPlatform::MySql => vec![("MYSQL_ROOT_PASSWORD", ADMIN_PASSWORD.to_string())],
            DockerPlatform::SqlServer => vec![
                ("ACCEPT_EULA", "Y".to_string()),
                ("MSSQL_SA_PASSWORD", password),
            ],
            DockerPlatform::Oracle => vec![("ORACLE_PASSWORD", ADMIN_PASSWORD.to_string())],
            DockerPlatform::Hana => vec![],
            DockerPlatform::ElasticSearch => vec![
                ("discovery.type", "single-node".to_string()),
                ("xpack.security.enabled", "false".to_string()),
            ],
        };

        pairs
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Arguments appended after the image reference
    pub fn command_args(&self, spec: &ContainerSpec) -> Vec<String> {
        match self {
            DockerPlatform::Hana => {
                let mut args = vec!["--agree-to-sap-license".to_string()];
                if let Some(password) = &spec.db_password {
                    args.push("--master-password".to_string());
                    args.push(password.clone());
                }
                args
            }
            _ => Vec::new(),
        }
    }

    /// Commands creating every database and login named in the spec
    ///
    /// Covers the primary database and each `extraDb`. Every step is
    /// idempotent, so it runs again on a reused container. Empty for
    /// platforms whose image ships the login (HANA `SYSTEM`).
    pub fn bootstrap(&self, spec: &ContainerSpec) -> Vec<BootstrapStep> {
        let password = spec.db_password.as_deref().unwrap_or_default();
        spec.databases()
            .into_iter()
            .flat_map(|(db, user)| self.database_steps(db, user, password))
            .collect()
    }

    fn database_steps(&self, db: &str, user: &str, password: &str) -> Vec<BootstrapStep> {
        match self {
            DockerPlatform::Postgres | DockerPlatform::Postgis => {
                let mut steps = Vec::new();
                if user != "postgres" {
                    steps.push(BootstrapStep::unless(
                        psql(format!("SELECT 1 FROM pg_roles WHERE rolname = '{}'", user)),
                        "1",
                        psql(format!(
                            "CREATE ROLE \"{}\" LOGIN PASSWORD '{}'",
                            user, password
                        )),
                    ));
                }
                steps.push(BootstrapStep::unless(
                    psql(format!("SELECT 1 FROM pg_database WHERE datname = '{}'", db)),
                    "1",
                    psql(format!("CREATE DATABASE \"{}\" OWNER \"{}\"", db, user)),
                ));
                steps
            }
            DockerPlatform::MySql => {
                let sql = format!(
                    "CREATE DATABASE IF NOT EXISTS `{db}`; \
                     CREATE USER IF NOT EXISTS '{user}'@'%' IDENTIFIED BY '{password}'; \
                     GRANT ALL PRIVILEGES ON `{db}`.* TO '{user}'@'%'"
                );
                let mut args = strings(["mysql", "-h", "127.0.0.1", "--protocol=tcp", "-uroot"]);
                args.push(format!("-p{}", ADMIN_PASSWORD));
                args.extend(["-e".to_string(), sql]);
                vec![BootstrapStep::always(args)]
            }
            DockerPlatform::SqlServer => {
                let mut sql = format!("IF DB_ID(N'{db}') IS NULL CREATE DATABASE [{db}];");
                if user != "sa" {
                    sql.push_str(&format!(
                        " IF SUSER_ID(N'{user}') IS NULL \
                         CREATE LOGIN [{user}] WITH PASSWORD = N'{password}';"
                    ));
                    sql.push_str(&format!(
                        " USE [{db}]; IF USER_ID(N'{user}') IS NULL \
                         CREATE USER [{user}] FOR LOGIN [{user}];"
                    ));
                    sql.push_str(&format!(" ALTER ROLE db_owner ADD MEMBER [{user}];"));
                }
                vec![BootstrapStep::always(sqlcmd(password, sql))]
            }
            // a schema is a user in XEPDB1
            DockerPlatform::Oracle => {
                let mut check = strings(["sh", "-c", ORACLE_USER_CHECK, "sh"]);
                check.extend([user.to_string(), ADMIN_PASSWORD.to_string()]);
                let mut create = strings(["createAppUser"]);
                create.extend([user.to_string(), password.to_string()]);
                vec![BootstrapStep::unless(check, "FOUND", create)]
            }
            DockerPlatform::Hana | DockerPlatform::ElasticSearch => Vec::new(),
        }
    }
}

impl fmt::Display for DockerPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Container settings read back out of a docker property map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub platform: DockerPlatform,
    pub image: String,
    pub version: String,
    pub container_name: String,
    pub port: u16,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    /// Secondary databases created next to the primary one
    pub extra_dbs: Vec<String>,
    /// Login for the extra databases; each is its own login when None
    pub extra_db_user: Option<String>,
    pub startup_timeout: Duration,
}

pub const DEFAULT_STARTUP_TIMEOUT: &str = "120s";

fn sql_identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// Names and passwords end up inside SQL run in the container
fn validate_credentials(platform: DockerPlatform, spec: &ContainerSpec) -> Result<()> {
    let names = [
        ("dbName", spec.db_name.as_deref()),
        ("dbUser", spec.db_user.as_deref()),
        ("extraDbUser", spec.extra_db_user.as_deref()),
    ]
    .into_iter()
    .chain(spec.extra_dbs.iter().map(|db| ("extraDb", Some(db.as_str()))));

    for (key, value) in names {
        if let Some(value) = value {
            if !sql_identifier_pattern().is_match(value) {
                return Err(DbStageError::Config(format!(
                    "Invalid {} '{}': expected letters, digits and underscores",
                    platform.property(key),
                    value
                )));
            }
        }
    }
    if let Some(password) = &spec.db_password {
        if password.contains(['\'', '"', '\\', '`']) {
            return Err(DbStageError::Config(format!(
                "{} must not contain quotes or backslashes",
                platform.property("dbPassword")
            )));
        }
    }
    Ok(())
}

impl ContainerSpec {
    /// Read and validate a spec; nothing is started if this fails
    pub fn from_properties(properties: &Properties, platform: DockerPlatform) -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            properties
                .get_trimmed(&platform.property(name))
                .map(str::to_string)
                .ok_or_else(|| {
                    DbStageError::Docker(format!(
                        "Missing docker property '{}'",
                        platform.property(name)
                    ))
                })
        };
        let optional = |name: &str| {
            properties
                .get_trimmed(&platform.property(name))
                .map(str::to_string)
        };

        let port_raw = required("port")?;
        let port = port_raw.parse::<u16>().map_err(|_| {
            DbStageError::Docker(format!(
                "Invalid port '{}' for {}",
                port_raw,
                platform.property("port")
            ))
        })?;

        let startup_timeout = parse_timeout(
            properties
                .get_trimmed(&platform.property("startupTimeout"))
                .unwrap_or(DEFAULT_STARTUP_TIMEOUT),
        )?;

        let spec = Self {
            platform,
            image: required("image")?,
            version: required("version")?,
            container_name: required("containerName")?,
            port,
            db_name: optional("dbName"),
            db_user: optional("dbUser"),
            db_password: optional("dbPassword"),
            extra_dbs: optional("extraDb")
                .map(|raw| split_names(&raw))
                .unwrap_or_default(),
            extra_db_user: optional("extraDbUser"),
            startup_timeout,
        };
        validate_credentials(platform, &spec)?;
        Ok(spec)
    }

    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }

    /// (database, login) pairs to create: the primary first, then extras
    pub fn databases(&self) -> Vec<(&str, &str)> {
        let mut databases = Vec::new();
        if let (Some(db), Some(user)) = (self.db_name.as_deref(), self.db_user.as_deref()) {
            databases.push((db, user));
        }
        for db in &self.extra_dbs {
            let user = self.extra_db_user.as_deref().unwrap_or(db.as_str());
            databases.push((db.as_str(), user));
        }
        databases
    }
}

/// Comma separated names, blanks dropped
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// A container that is up and accepting connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedContainer {
    pub name: String,
    pub port: u16,
    pub reused: bool,
}

/// Turns a docker property map into a running (or reused) container
pub trait ContainerStarter: Send + Sync {
    fn start(&self, properties: &Properties, platform: DockerPlatform) -> Result<StartedContainer>;
}
