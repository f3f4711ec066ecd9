// Docker container lifecycle for test databases
// Start or reuse a named container, then wait until it accepts connections

use crate::clock::{Clock, Deadline, SystemClock};
use crate::docker::{ContainerSpec, ContainerStarter, DockerPlatform, Readiness, StartedContainer};
use crate::errors::{DbStageError, Result};
use crate::properties::Properties;
use regex::Regex;
use std::process::Command;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// What docker currently knows about a named container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Missing,
}

/// Starts containers by driving the docker CLI directly (no shell)
pub struct DockerContainerStarter {
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl Default for DockerContainerStarter {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerContainerStarter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check if Docker is available on the system
    pub fn is_docker_available(&self) -> bool {
        Command::new("docker")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Look up a container by exact name
    pub fn container_state(&self, name: &str) -> Result<ContainerState> {
        let args = build_state_args(name);
        let stdout = self.execute_command_safe("docker", &args)?;
        Ok(parse_state(&stdout))
    }

    /// Wait until the platform's readiness check passes
    ///
    /// Log markers are only searched in output written since `since`, so a
    /// restarted container is not taken as ready from its previous run.
    fn wait_for_ready(&self, spec: &ContainerSpec, since: Option<u64>) -> Result<()> {
        let readiness = spec.platform.readiness(spec);

        tracing::debug!(
            container = %spec.container_name,
            timeout_secs = spec.startup_timeout.as_secs(),
            "waiting for container to become ready"
        );

        self.poll_until(spec.startup_timeout, || match &readiness {
            Readiness::Exec(command) => self.exec_succeeds(&spec.container_name, command),
            Readiness::LogMarker(marker) => {
                let logs = self.container_logs(&spec.container_name, since)?;
                Ok(logs.contains(marker))
            }
        })
        .map_err(|e| match e {
            DbStageError::Docker(msg) if msg.starts_with("Timed out") => DbStageError::Docker(
                format!("Container '{}' not ready: {}", spec.container_name, msg),
            ),
            other => other,
        })
    }

    /// Poll `check` until it returns true or `timeout` elapses
    pub fn poll_until<F>(&self, timeout: Duration, mut check: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        let deadline = Deadline::after(self.clock.clone(), timeout).ok_or_else(|| {
            DbStageError::Config(format!("Timeout of {}s is too large", timeout.as_secs()))
        })?;
        loop {
            if check()? {
                return Ok(());
            }
            if !deadline.wait(self.poll_interval) {
                return Err(DbStageError::Docker(format!(
                    "Timed out after {}s",
                    timeout.as_secs()
                )));
            }
        }
    }

    /// Create the spec's database and login unless they already exist
    fn bootstrap(&self, spec: &ContainerSpec) -> Result<()> {
        for step in spec.platform.bootstrap(spec) {
            if let Some(check) = &step.check {
                let stdout = self.execute_command_safe(
                    "docker",
                    &build_exec_args(&spec.container_name, &check.command),
                )?;
                if stdout.lines().any(|line| line.trim() == check.found) {
                    continue;
                }
            }
            let create = build_exec_args(&spec.container_name, &step.create);
            self.execute_command_safe("docker", &create)?;
        }

        if let (Some(db), Some(user)) = (&spec.db_name, &spec.db_user) {
            tracing::debug!(container = %spec.container_name, %db, %user, "database ready");
        }
        Ok(())
    }

    /// docker logs writes the container's stderr to our stderr, so read both
    fn container_logs(&self, name: &str, since: Option<u64>) -> Result<String> {
        let output = Command::new("docker")
            .args(build_logs_args(name, since))
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DbStageError::Docker(format!(
                "Failed to read logs of '{}': {}",
                name,
                stderr.trim()
            )));
        }

        let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }

    /// A failing check means "not ready yet", not an error
    fn exec_succeeds(&self, name: &str, command: &[String]) -> Result<bool> {
        let output = Command::new("docker")
            .args(build_exec_args(name, command))
            .output()?;
        Ok(output.status.success())
    }

    /// Execute a command safely without shell injection, returning stdout
    fn execute_command_safe(&self, program: &str, args: &[String]) -> Result<String> {
        let output = Command::new(program).args(args).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DbStageError::Docker(format!(
                "Command failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ContainerStarter for DockerContainerStarter {
    fn start(&self, properties: &Properties, platform: DockerPlatform) -> Result<StartedContainer> {
        let spec = ContainerSpec::from_properties(properties, platform)?;
        validate_container_name(&spec.container_name)?;

        if !self.is_docker_available() {
            return Err(DbStageError::Docker(
                "Docker is not available. Please install Docker.".to_string(),
            ));
        }

        let state = self.container_state(&spec.container_name)?;
        let since = match state {
            ContainerState::Running => {
                tracing::info!(container = %spec.container_name, "reusing running container");
                None
            }
            ContainerState::Stopped => {
                tracing::info!(container = %spec.container_name, "starting existing container");
                let since = unix_now();
                self.execute_command_safe("docker", &build_start_args(&spec.container_name))?;
                Some(since)
            }
            ContainerState::Missing => {
                tracing::info!(
                    container = %spec.container_name,
                    image = %spec.image_ref(),
                    port = spec.port,
                    "creating container"
                );
                let since = unix_now();
                self.execute_command_safe("docker", &build_run_args(&spec))?;
                Some(since)
            }
        };

        self.wait_for_ready(&spec, since)?;
        self.bootstrap(&spec)?;
        tracing::info!(container = %spec.container_name, "container ready");

        Ok(StartedContainer {
            name: spec.container_name,
            port: spec.port,
            reused: state == ContainerState::Running,
        })
    }
}

/// Seconds since the epoch, as accepted by `docker logs --since`
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn container_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("container name pattern is valid")
    })
}

/// Docker container names: alphanumeric start, then [a-zA-Z0-9_.-]
pub fn validate_container_name(name: &str) -> Result<()> {
    if container_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(DbStageError::Docker(format!(
            "Invalid container name '{}'",
            name
        )))
    }
}

/// Build docker ps arguments matching exactly one container name
pub fn build_state_args(name: &str) -> Vec<String> {
    vec![
        "ps".to_string(),
        "-a".to_string(),
        "--filter".to_string(),
        format!("name=^/{}$", name),
        "--format".to_string(),
        "{{.State}}".to_string(),
    ]
}

pub fn build_start_args(name: &str) -> Vec<String> {
    vec!["start".to_string(), name.to_string()]
}

pub fn build_logs_args(name: &str, since: Option<u64>) -> Vec<String> {
    let mut args = vec!["logs".to_string()];
    if let Some(since) = since {
        args.push("--since".to_string());
        args.push(since.to_string());
    }
    args.push(name.to_string());
    args
}

pub fn build_exec_args(name: &str, command: &[String]) -> Vec<String> {
    let mut args = vec!["exec".to_string(), name.to_string()];
    args.extend(command.iter().cloned());
    args
}

/// Build docker run arguments (safe from injection)
pub fn build_run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.container_name.clone(),
        "-p".to_string(),
        format!("{}:{}", spec.port, spec.platform.internal_port()),
    ];

    for (key, value) in spec.platform.environment(spec) {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(spec.image_ref());
    args.extend(spec.platform.command_args(spec));
    args
}

fn parse_state(stdout: &str) -> ContainerState {
    match stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
        None => ContainerState::Missing,
        Some("running") => ContainerState::Running,
        Some(_) => ContainerState::Stopped,
    }
}

/// Longest accepted startup timeout
pub const MAX_STARTUP_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Parse timeout string (e.g., "30s", "2m") into a duration
pub fn parse_timeout(timeout_str: &str) -> Result<Duration> {
    let timeout_str = timeout_str.trim();
    let invalid = || DbStageError::Config(format!("Invalid timeout value: {}", timeout_str));

    let secs = if let Some(num_str) = timeout_str.strip_suffix('s') {
        num_str.trim().parse::<u64>().map_err(|_| invalid())?
    } else if let Some(num_str) = timeout_str.strip_suffix('m') {
        num_str
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid())?
            .checked_mul(60)
            .ok_or_else(invalid)?
    } else {
        // Bare numbers are seconds
        timeout_str.parse::<u64>().map_err(|_| invalid())?
    };

    let timeout = Duration::from_secs(secs);
    if timeout > MAX_STARTUP_TIMEOUT {
        return Err(DbStageError::Config(format!(
            "Timeout {} exceeds the maximum of {}s",
            timeout_str,
            MAX_STARTUP_TIMEOUT.as_secs()
        )));
    }
    Ok(timeout)
}
