//! Trellis CLI - route table tooling.
//!
//! # Commands
//!
//! - `trellis routes list` - Print the compiled route table
//! - `trellis routes cache` - Compile the table and write the route cache
//! - `trellis routes clear` - Delete the route cache

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use trellis_core::{
    init_tracing, AppConfig, ModuleManifest, RouteCache, RouteTable, RouteTableBuilder,
};

/// Trellis route table tooling
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and manage the route table
    #[command(alias = "r")]
    Routes {
        #[command(subcommand)]
        command: RoutesCommand,
    },
}

#[derive(Subcommand)]
enum RoutesCommand {
    /// Print the compiled route table
    List(ListArgs),
    /// Compile the route table and write the cache
    Cache(ManifestArgs),
    /// Delete the route cache
    Clear,
}

#[derive(Args)]
struct ManifestArgs {
    /// Module manifest (TOML, or JSON with a .json extension)
    #[arg(short, long)]
    manifest: PathBuf,
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RouteRow<'a> {
    method: &'a str,
    route: &'a str,
    controller: &'a str,
    action: &'a str,
    module: &'a str,
    auth: &'a [String],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Routes { command } => match command {
            RoutesCommand::List(args) => {
                let table = build_table(&config, &args.manifest)?;
                print_routes(&table, args.json)?;
            }
            RoutesCommand::Cache(args) => {
                let table = build_table(&config, &args)?;
                let cache = RouteCache::new(&config.routing.cache_path);
                cache.cache(&table).with_context(|| {
                    format!("failed to write {}", cache.path().display())
                })?;
                println!("Cached {} routes to {}", table.len(), cache.path().display());
            }
            RoutesCommand::Clear => {
                let cache = RouteCache::new(&config.routing.cache_path);
                if cache.clear()? {
                    println!("Removed {}", cache.path().display());
                } else {
                    println!("No route cache at {}", cache.path().display());
                }
            }
        },
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn build_table(config: &AppConfig, args: &ManifestArgs) -> Result<RouteTable> {
    let manifest = ModuleManifest::load(&args.manifest)
        .with_context(|| format!("failed to load manifest {}", args.manifest.display()))?;
    let table = RouteTableBuilder::from_config(&config.routing)
        .build(&manifest.modules)
        .context("invalid route declarations")?;
    Ok(table)
}

fn print_routes(table: &RouteTable, json: bool) -> Result<()> {
    let rows: Vec<RouteRow<'_>> = table
        .iter()
        .map(|entry| RouteRow {
            method: entry.method.as_str(),
            route: &entry.route,
            controller: &entry.controller,
            action: &entry.action,
            module: &entry.module,
            auth: entry.guards(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let width = rows.iter().map(|r| r.route.len()).max().unwrap_or(0).max(5);
    println!("{:<7} {:<width$} {:<40} MODULE", "METHOD", "ROUTE", "TARGET");
    for row in &rows {
        let target = format!("{}::{}", row.controller, row.action);
        let guards = if row.auth.is_empty() {
            String::new()
        } else {
            format!(" [{}]", row.auth.join(", "))
        };
        println!(
            "{:<7} {:<width$} {:<40} {}{}",
            row.method.to_uppercase(),
            row.route,
            target,
            row.module,
            guards
        );
    }
    println!("{} routes", rows.len());
    Ok(())
}
