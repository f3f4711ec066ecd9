use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dbstage::cli::{self, ConfigArgs};

#[derive(Parser)]
#[command(name = "dbstage")]
#[command(about = "Resolve and provision the database platform for a test run", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the test platform and provision it
    Run {
        /// Platform to test against, overriding ebean.test.platform
        #[arg(long)]
        db: Option<String>,
        #[command(flatten)]
        config: ConfigArgs,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure the data source of an extra (secondary) database
    Extra {
        /// Name of the extra database's server
        #[arg(long)]
        name: String,
        /// Platform to test against, overriding ebean.test.platform
        #[arg(long)]
        db: Option<String>,
        #[command(flatten)]
        config: ConfigArgs,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the platforms dbstage knows how to set up
    Platforms,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    dbstage::logging::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { db, config, json } => {
            cli::run::run(db.as_deref(), &config, json).context("test platform setup failed")?
        }
        Commands::Extra {
            name,
            db,
            config,
            json,
        } => cli::extra::run(&name, db.as_deref(), &config, json)
            .context("extra data source setup failed")?,
        Commands::Platforms => cli::platforms::run()?,
        Commands::Completions { shell } => cli::completions::run(shell, &mut Cli::command())?,
    }

    Ok(())
}
