pub mod completions;
pub mod extra;
pub mod platforms;
pub mod run;

use crate::errors::Result;
use crate::properties::Properties;
use crate::provision::{ProvisionOutcome, SkipReason};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Where properties come from and how to override them
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Directory containing application-test.yaml
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub config: PathBuf,

    /// Override a property, e.g. --set ebean.test.platform=postgres
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Properties> {
        let mut properties = Properties::load(&self.config)?;
        properties.apply_overrides(&self.overrides)?;
        Ok(properties)
    }
}

/// Print a provisioning outcome for humans or as JSON
pub fn print_outcome(outcome: &ProvisionOutcome, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(outcome)?;
        println!("{}", out);
        return Ok(());
    }

    match outcome {
        ProvisionOutcome::Skipped { reason } => match reason {
            SkipReason::NoPlatform => {
                println!("{} ebean.test.platform not set, nothing to set up", "⚠".yellow());
            }
            SkipReason::UnknownPlatform(platform) => {
                println!(
                    "{} Unknown platform '{}', skipping platform setup",
                    "⚠".yellow(),
                    platform
                );
            }
        },
        ProvisionOutcome::Provisioned {
            platform,
            db,
            database_name,
            data_source,
            container,
        } => {
            println!(
                "{} {} ready (db: {}, database: {})",
                "✓".green(),
                platform.bold(),
                db,
                database_name
            );
            println!("  url:      {}", data_source.url);
            println!("  username: {}", data_source.username);
            if let Some(container) = container {
                let how = if container.reused { "reused" } else { "started" };
                println!(
                    "  container: {} on port {} ({})",
                    container.name.cyan(),
                    container.port,
                    how
                );
            }
        }
        ProvisionOutcome::ExtraDataSource {
            platform,
            db,
            data_source,
        } => {
            println!(
                "{} extra data source '{}' configured for {}",
                "✓".green(),
                db,
                platform.bold()
            );
            println!("  url:      {}", data_source.url);
            println!("  username: {}", data_source.username);
        }
    }

    Ok(())
}
