//! tusup - resumable file uploads over the tus protocol
//!
//! Uploads one file per run in sequential chunks. Interrupted uploads are
//! recorded in a local resume store and continue where the server left
//! off on the next run.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "tusup")]
#[command(about = "Resumable file uploads over the tus protocol")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors, hide progress
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./tusup.toml or ~/.config/tusup/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a file, resuming an earlier attempt when possible
    Upload(cmd::upload::UploadArgs),
    /// Inspect or prune the resume store
    Store(cmd::store::StoreArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let show_progress = match &cli.command {
        Command::Upload(args) => !args.no_progress && !cli.quiet,
        _ => false,
    };
    let progress = tusup_core::ProgressContext::new(show_progress);

    let verbosity = tusup_core::Verbosity::from_flags(cli.quiet, cli.debug);
    let multi = progress.shows_bars().then(|| progress.multi());
    tusup_core::init_logging(verbosity, multi)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    tusup_core::set_http_config(config.http.to_http_config());

    match cli.command {
        Command::Upload(args) => cmd::upload::run(args, &config, &progress),
        Command::Store(args) => cmd::store::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Chunk size",
                &config.upload.chunk_size.to_string(),
            ]);
            table.add_row(vec![
                "Min chunk size",
                &config.upload.min_chunk_size.to_string(),
            ]);
            table.add_row(vec![
                "Extra headers",
                &config.upload.headers.len().to_string(),
            ]);
            table.add_row(vec!["Store type", config.store.kind.name()]);
            table.add_row(vec![
                "Store path",
                &config.store.path_or_default().display().to_string(),
            ]);
            table.add_row(vec![
                "Connect timeout",
                &format!("{}s", config.http.connect_timeout),
            ]);
            table.add_row(vec![
                "Request timeout",
                &format!("{}s", config.http.request_timeout),
            ]);

            eprintln!("\n{table}");
            Ok(ExitCode::SUCCESS)
        }
    }
}
