mod assembler;
mod batch;
mod cli;
mod db;
mod error;
mod extract;
mod fmt;
mod models;
mod resolver;
mod review;
mod settings;
mod statement;
mod store;
mod taxonomy;

use clap::Parser;
use tracing_subscriber::{fmt as log_fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, HistoryCommands};

fn main() {
    let cli = Cli::parse();

    // RUST_LOG > --verbose > warnings only
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(log_fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            chart,
            downloads_dir,
        } => cli::init::run(data_dir, chart, downloads_dir),
        Commands::Process {
            inputs,
            year,
            output_dir,
            json,
            reinit_store,
        } => cli::process::run(inputs, year, output_dir, json, reinit_store),
        Commands::Finalize { sheet, reinit_store } => cli::finalize::run(&sheet, reinit_store),
        Commands::Codes { category } => cli::codes::run(category.as_deref()),
        Commands::History { command } => match command {
            HistoryCommands::List => cli::history::list(),
            HistoryCommands::Show { vendor } => cli::history::show(&vendor),
            HistoryCommands::Set {
                vendor,
                gl,
                location,
                program,
                funder,
                dept,
            } => cli::history::set(&vendor, gl, location, program, funder, dept),
            HistoryCommands::Forget { vendor } => cli::history::forget(&vendor),
        },
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
