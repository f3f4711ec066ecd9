/// Shared fakes and helpers for dbstage integration tests
use dbstage::docker::{ContainerStarter, DockerPlatform, StartedContainer};
use dbstage::platform::{DbSetup, PlatformSetup, SetupConfig};
use dbstage::search::IndexSetup;
use dbstage::{DataSourceConfig, DbStageError, Properties, Result};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Lets two branches check that they were running at the same time
#[derive(Default)]
pub struct Rendezvous {
    arrived: AtomicUsize,
}

impl Rendezvous {
    /// Announce arrival, then wait (bounded) for the other branch
    pub fn meet(&self) -> bool {
        self.arrived.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if self.arrived.load(Ordering::SeqCst) >= 2 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

/// The values a platform handler saw in its SetupConfig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenConfig {
    pub db: String,
    pub platform: String,
    pub database_name: String,
}

impl SeenConfig {
    fn from(config: &SetupConfig<'_>) -> Self {
        Self {
            db: config.db.clone(),
            platform: config.platform.clone(),
            database_name: config.database_name.clone(),
        }
    }
}

/// Configurable platform handler that records how it was called
#[derive(Default)]
pub struct FakePlatform {
    pub local: bool,
    pub docker: Properties,
    pub fail: Option<String>,
    pub panic: bool,
    pub delay: Duration,
    pub rendezvous: Option<Arc<Rendezvous>>,
    pub setup_calls: AtomicUsize,
    pub extra_calls: AtomicUsize,
    pub completed: AtomicBool,
    pub met_other_branch: AtomicBool,
    pub seen: Mutex<Vec<SeenConfig>>,
}

impl FakePlatform {
    pub fn local() -> Self {
        Self {
            local: true,
            ..Default::default()
        }
    }

    pub fn remote() -> Self {
        Self::default()
    }

    /// Remote platform whose setup asks for a container
    pub fn with_container() -> Self {
        Self {
            docker: Properties::from_pairs([
                ("postgres.image", "postgres"),
                ("postgres.version", "15"),
                ("postgres.containerName", "ut_fake"),
                ("postgres.port", "6432"),
            ]),
            ..Default::default()
        }
    }

    pub fn setup_calls(&self) -> usize {
        self.setup_calls.load(Ordering::SeqCst)
    }

    pub fn extra_calls(&self) -> usize {
        self.extra_calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn last_seen(&self) -> Option<SeenConfig> {
        self.seen.lock().unwrap().last().cloned()
    }

    fn data_source(config: &SetupConfig<'_>) -> DataSourceConfig {
        DataSourceConfig {
            url: format!("fake://{}", config.database_name),
            username: config.database_name.clone(),
            password: "test".to_string(),
            driver: None,
        }
    }
}

impl PlatformSetup for FakePlatform {
    fn is_local(&self) -> bool {
        self.local
    }

    fn docker_platform(&self) -> Option<DockerPlatform> {
        if self.local {
            None
        } else {
            Some(DockerPlatform::Postgres)
        }
    }

    fn setup(&self, config: &SetupConfig<'_>) -> Result<DbSetup> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(SeenConfig::from(config));

        if let Some(rendezvous) = &self.rendezvous {
            self.met_other_branch
                .store(rendezvous.meet(), Ordering::SeqCst);
        }
        std::thread::sleep(self.delay);
        self.completed.store(true, Ordering::SeqCst);

        if self.panic {
            panic!("fake platform exploded");
        }
        if let Some(message) = &self.fail {
            return Err(DbStageError::Setup {
                platform: config.platform.clone(),
                message: message.clone(),
            });
        }

        Ok(DbSetup {
            data_source: Self::data_source(config),
            docker: self.docker.clone(),
        })
    }

    fn setup_extra_db_data_source(&self, config: &SetupConfig<'_>) -> Result<DataSourceConfig> {
        self.extra_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(SeenConfig::from(config));
        Ok(Self::data_source(config))
    }
}

/// Index setup that records completion
#[derive(Default)]
pub struct FlagIndexSetup {
    pub fail: bool,
    pub delay: Duration,
    pub rendezvous: Option<Arc<Rendezvous>>,
    pub calls: AtomicUsize,
    pub completed: AtomicBool,
    pub met_other_branch: AtomicBool,
}

impl FlagIndexSetup {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

impl IndexSetup for FlagIndexSetup {
    fn run(&self, _properties: &Properties) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(rendezvous) = &self.rendezvous {
            self.met_other_branch
                .store(rendezvous.meet(), Ordering::SeqCst);
        }
        std::thread::sleep(self.delay);
        self.completed.store(true, Ordering::SeqCst);

        if self.fail {
            return Err(DbStageError::IndexSetup("index unavailable".to_string()));
        }
        Ok(())
    }
}

/// Container starter that records requests instead of running docker
#[derive(Default)]
pub struct RecordingStarter {
    pub fail: bool,
    pub calls: Mutex<Vec<(Properties, DockerPlatform)>>,
}

impl RecordingStarter {
    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(Properties, DockerPlatform)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl ContainerStarter for RecordingStarter {
    fn start(&self, properties: &Properties, platform: DockerPlatform) -> Result<StartedContainer> {
        self.calls
            .lock()
            .unwrap()
            .push((properties.clone(), platform));
        if self.fail {
            return Err(DbStageError::Docker("docker daemon not reachable".to_string()));
        }
        Ok(StartedContainer {
            name: properties
                .get(&platform.property("containerName"))
                .unwrap_or("unnamed")
                .to_string(),
            port: properties
                .get(&platform.property("port"))
                .and_then(|p| p.parse().ok())
                .unwrap_or(0),
            reused: false,
        })
    }
}

/// A temporary project directory with an optional application-test.yaml
#[allow(dead_code)]
pub struct TestProject {
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestProject {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create the test config file
    pub fn create_config(&self, content: &str) {
        std::fs::write(self.path().join("application-test.yaml"), content)
            .expect("Failed to write config file");
    }

    /// Run dbstage in this project directory
    pub fn dbstage(&self, args: &[&str]) -> CommandResult {
        let output = Command::new(env!("CARGO_BIN_EXE_dbstage"))
            .args(args)
            .current_dir(self.path())
            .env("RUST_LOG", "off")
            .output()
            .expect("Failed to execute dbstage command");

        CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code(),
        }
    }
}

/// Result of running a command
#[allow(dead_code)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

#[allow(dead_code)]
impl CommandResult {
    pub fn assert_success(&self) {
        if !self.success {
            panic!(
                "Command failed:\nstdout: {}\nstderr: {}\nexit code: {:?}",
                self.stdout, self.stderr, self.exit_code
            );
        }
    }

    pub fn assert_failure(&self) {
        if self.success {
            panic!(
                "Command succeeded when it should have failed:\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
    }

    pub fn assert_stdout_contains(&self, text: &str) {
        assert!(
            self.stdout.contains(text),
            "stdout does not contain '{}'\nstdout: {}",
            text,
            self.stdout
        );
    }

    pub fn assert_stderr_contains(&self, text: &str) {
        assert!(
            self.stderr.contains(text),
            "stderr does not contain '{}'\nstderr: {}",
            text,
            self.stderr
        );
    }
}
