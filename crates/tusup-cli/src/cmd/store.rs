//! `tusup store` - inspect and prune the resume store

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use tusup_store::{Store, StoreKind};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StoreArgs {
    #[command(subcommand)]
    pub action: StoreAction,

    /// Resume store file (default from config)
    #[arg(long, global = true)]
    pub store_path: Option<PathBuf>,

    /// Resume store backend: auto, kv, json or sqlite
    #[arg(long, global = true)]
    pub store_type: Option<StoreKind>,
}

#[derive(Subcommand, Debug)]
pub enum StoreAction {
    /// List recorded uploads
    List,
    /// Remove the entry for one fingerprint
    Forget {
        fingerprint: String,
    },
    /// Remove every entry
    Clear {
        /// Actually delete (otherwise dry-run)
        #[arg(long)]
        confirm: bool,
    },
}

pub fn run(args: StoreArgs, config: &Config) -> Result<()> {
    let kind = args.store_type.unwrap_or(config.store.kind);
    let path = args
        .store_path
        .unwrap_or_else(|| config.store.path_or_default());

    if kind == StoreKind::None {
        bail!("resume store is disabled (store type \"none\")");
    }
    if !path.exists() {
        eprintln!("No resume store at {}.", path.display());
        return Ok(());
    }

    let store = kind
        .open(&path)
        .with_context(|| format!("Failed to open {kind} store at {}", path.display()))?
        .context("resume store is disabled")?;

    let result = match args.action {
        StoreAction::List => list(store.as_ref()),
        StoreAction::Forget { fingerprint } => forget(store.as_ref(), &fingerprint),
        StoreAction::Clear { confirm } => clear(store.as_ref(), confirm),
    };
    store.close().context("Failed to close resume store")?;
    result
}

fn list(store: &dyn Store) -> Result<()> {
    let entries = store.entries()?;

    if entries.is_empty() {
        eprintln!("No resumable uploads.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Fingerprint").fg(Color::Cyan),
            Cell::new("Upload URL").fg(Color::Cyan),
        ]);

    for (fingerprint, url) in &entries {
        table.add_row(vec![Cell::new(fingerprint), Cell::new(url)]);
    }

    eprintln!("\n{table}");
    eprintln!("{} entries total", entries.len());
    Ok(())
}

fn forget(store: &dyn Store, fingerprint: &str) -> Result<()> {
    if store.get(fingerprint).is_none() {
        eprintln!("No entry for {fingerprint}.");
        return Ok(());
    }
    store.delete(fingerprint)?;
    eprintln!("Removed {fingerprint}");
    Ok(())
}

fn clear(store: &dyn Store, confirm: bool) -> Result<()> {
    let entries = store.entries()?;
    if entries.is_empty() {
        eprintln!("Nothing to clean up.");
        return Ok(());
    }

    if !confirm {
        eprintln!("Would remove {} entries:", entries.len());
        for (fingerprint, _) in &entries {
            eprintln!("  {fingerprint}");
        }
        eprintln!("Run with --confirm to actually delete.");
        return Ok(());
    }

    for (fingerprint, _) in &entries {
        store.delete(fingerprint)?;
    }
    eprintln!("Removed {} entries", entries.len());
    Ok(())
}
