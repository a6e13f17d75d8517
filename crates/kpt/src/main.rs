mod cli;
mod commands;
mod generate_schema;
mod log;
mod package_io;
mod repositories;

use clap::Parser;
use cli::{CliArgs, Command};
use kpt_porch_core::OrchestratorConfig;
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    log::init(args.verbosity()?);
    run(args).await.map_err(|e| {
        error!("{e:?}");
        e
    })?;
    Ok(())
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = OrchestratorConfig::load(&args.config_file)?;

    match args.command {
        Command::Repo(repo_args) => commands::repo::run(repo_args.command, &args.repositories_file)?,
        Command::Draft(draft_args) => commands::draft::run(draft_args.command, &args.repositories_file, &config).await?,
        Command::Revision(revision_args) => commands::revision::run(revision_args.command, &args.repositories_file, &config).await?,
        Command::Render(render_args) => commands::render::run(render_args, &args.repositories_file, &config).await?,
        Command::Apply(apply_args) => commands::apply::run(apply_args, &args.repositories_file, &config).await?,
        Command::Function(function_args) => commands::function::run(function_args.command).await?,
        Command::Inventory(inventory_args) => commands::inventory::run(inventory_args.command).await?,
        Command::Completions(completions) => completions.run(),
        Command::GenerateSchema => generate_schema::generate_schema_to_disk()?,
    }
    Ok(())
}
