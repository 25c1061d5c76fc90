use anyhow::Result;
use clap::Parser;
use jenkins_jinny::cli::Cli;
use jenkins_jinny::output;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    output::init_logging();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting Jenkins Jinny");
    cli.execute().await?;

    Ok(())
}
