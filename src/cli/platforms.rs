use crate::errors::Result;
use crate::platform::KnownPlatforms;
use colored::Colorize;

/// List known platforms and how each is provisioned
pub fn run() -> Result<()> {
    let known = KnownPlatforms::standard();

    println!("{:<12} {:<8} {:<10}", "PLATFORM", "KIND", "DOCKER");
    println!("{}", "-".repeat(30));

    for (name, setup) in known.iter() {
        let kind = if setup.is_local() {
            "local".green()
        } else {
            "docker".cyan()
        };
        let docker = setup
            .docker_platform()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<12} {:<8} {:<10}", name, kind, docker);
    }

    Ok(())
}
