mod cli;
mod commands;
mod config;
mod process;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farsight=info,farsight_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = commands::effective_config(cli.process.clone(), cli.layout.clone())?;

    match cli.command {
        Commands::Watch {
            interval,
            json,
            once,
        } => {
            commands::watch::handle(&config, interval, json, once)?;
        }

        Commands::Info => {
            let source = commands::attach(&config)?;
            commands::info::handle(source, config.layout()?)?;
        }

        Commands::Read { address, size } => {
            let source = commands::attach(&config)?;
            commands::raw::handle_read(source.as_ref(), &address, size)?;
        }

        Commands::Chain {
            base,
            offsets,
            name,
        } => {
            let source = commands::attach(&config)?;
            commands::raw::handle_chain(
                source,
                &config.layout()?,
                &base,
                &offsets,
                name.as_deref(),
            )?;
        }

        Commands::Collection {
            name,
            address,
            limit,
        } => {
            let source = commands::attach(&config)?;
            commands::raw::handle_collection(source, &config.layout()?, &name, &address, limit)?;
        }

        Commands::Layout { path } => {
            commands::layout::handle(&config, path)?;
        }

        Commands::Configure { show } => {
            commands::configure::handle(cli.process, cli.layout, show)?;
        }
    }

    Ok(())
}
