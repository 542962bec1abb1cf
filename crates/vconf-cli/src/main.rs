//! vconf CLI: the `vconf` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    // stdout carries command output; logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("VCONF_LOG").unwrap_or_else(|_| "warn".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let models = cli.models;
    let snapshot = cli.snapshot;

    match cli.command {
        Commands::Dump { json } => commands::dump::run(models, snapshot, json),

        Commands::Get { address, json } => commands::get::run(address, models, snapshot, json),

        Commands::Set {
            address,
            value,
            json,
        } => commands::set::run(address, value, models, snapshot, json),

        Commands::Unset { address, json } => {
            commands::unset::run(address, models, snapshot, json)
        }

        Commands::Snapshot { json } => commands::snapshot::run(models, snapshot, json),

        Commands::Select { selector, json } => {
            commands::select::run(selector, models, snapshot, json)
        }

        Commands::Address { text, json } => commands::address::run(text, json),

        Commands::Depend {
            depender,
            dependee,
            logic,
            json,
        } => commands::depend::run(depender, dependee, logic, models, snapshot, json),
    }
}
