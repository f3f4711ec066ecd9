use crate::cli::{print_outcome, ConfigArgs};
use crate::errors::Result;
use crate::provision::ProvisioningCoordinator;
use crate::server::ServerConfig;

/// Configure the data source of a secondary database named `name`
pub fn run(name: &str, db: Option<&str>, config: &ConfigArgs, json: bool) -> Result<()> {
    let properties = config.load()?;
    let mut server = ServerConfig::new(name, properties);

    let coordinator = ProvisioningCoordinator::standard();
    let outcome = coordinator.configure_extra_data_source(db, &mut server)?;

    print_outcome(&outcome, json)
}
