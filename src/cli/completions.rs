use crate::errors::Result;
use clap::Command;
use clap_complete::{generate, Shell};

/// Write completions for `shell` to stdout
///
/// ```bash
/// dbstage completions bash > /etc/bash_completion.d/dbstage
/// ```
pub fn run(shell: Shell, cmd: &mut Command) -> Result<()> {
    let name = cmd.get_name().to_string();
    generate(shell, cmd, name, &mut std::io::stdout());
    Ok(())
}
