use crate::cli::{print_outcome, ConfigArgs};
use crate::errors::Result;
use crate::provision::ProvisioningCoordinator;
use crate::server::ServerConfig;

/// Resolve the test platform from config and provision it
pub fn run(db: Option<&str>, config: &ConfigArgs, json: bool) -> Result<()> {
    let properties = config.load()?;
    let mut server = ServerConfig::with_properties(properties);

    let coordinator = ProvisioningCoordinator::standard();
    let outcome = coordinator.run(db, &mut server)?;

    print_outcome(&outcome, json)
}
