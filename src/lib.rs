// Library interface for dbstage
// Exposes platform resolution and provisioning for test harnesses and the CLI

pub mod cli;
pub mod clock;
pub mod docker;
pub mod errors;
pub mod logging;
pub mod platform;
pub mod properties;
pub mod provision;
pub mod resolver;
pub mod search;
pub mod server;

pub use errors::{DbStageError, Result};
pub use platform::{KnownPlatforms, PlatformSetup, SetupConfig};
pub use properties::Properties;
pub use provision::{ProvisionOutcome, ProvisioningCoordinator, SkipReason};
pub use resolver::{PlatformResolver, Resolution, ResolvedPlatform};
pub use server::{DataSourceConfig, ServerConfig};
