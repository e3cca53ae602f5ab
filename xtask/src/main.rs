use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workspace tests, through cargo nextest when requested
    Test {
        #[arg(long)]
        nextest: bool,
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Check formatting and run clippy with warnings denied
    Lint,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Test {
            nextest,
            profile,
            release,
        } => run_tests(nextest, profile, release)?,
        Commands::Lint => run_lint()?,
    }
    Ok(())
}

fn run_tests(nextest: bool, profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    if nextest {
        cmd.arg("nextest").arg("run");
        if let Some(profile) = profile {
            cmd.arg("--profile").arg(profile);
        }
    } else {
        cmd.arg("test");
    }
    cmd.arg("--workspace");
    if release {
        cmd.arg("--release");
    }
    run(cmd, "tests failed")
}

fn run_lint() -> Result<()> {
    let mut fmt = Command::new("cargo");
    fmt.args(["fmt", "--all", "--", "--check"]);
    run(fmt, "cargo fmt found unformatted files")?;

    let mut clippy = Command::new("cargo");
    clippy.args(["clippy", "--workspace", "--all-targets"]);
    clippy.args(["--", "-D", "warnings"]);
    run(clippy, "cargo clippy reported warnings")
}

fn run(mut cmd: Command, failure: &str) -> Result<()> {
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{failure}");
    }
    Ok(())
}
