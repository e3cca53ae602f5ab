use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = ctxtree::cli::Cli::parse();
    ctxtree::init(cli.verbose);
    ctxtree::cli::run(cli)
}
