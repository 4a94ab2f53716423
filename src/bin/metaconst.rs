//! metaconst CLI
//!
//! Usage:
//!   metaconst generate --base-url http://localhost:8080/nuxeo --output web/src/constants.ts
//!   metaconst check --snapshot-dir snapshots/
//!   metaconst inspect operations --base-url http://localhost:8080/nuxeo
//!
//! Settings also come from `metaconst.yaml` and `METACONST_*` variables
//! (a `.env` file is honoured); flags win over both.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use metaconst::config::GeneratorConfig;
use metaconst::generator::{resolve_collections, ArtifactStatus, GenerateOptions, Generator, RunMode};
use metaconst::{Collection, MetadataSource};

#[derive(Parser)]
#[command(name = "metaconst")]
#[command(about = "Generate a constants module from repository server metadata")]
#[command(version)]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch metadata and (re)write the constants module
    Generate {
        #[command(flatten)]
        source: SourceArgs,

        /// Render and print statistics without writing
        #[arg(long)]
        dry_run: bool,

        /// Print the rendered module to stdout
        #[arg(long)]
        print: bool,
    },

    /// Exit non-zero when the constants module is missing or out of date
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show the resolved names of one collection
    Inspect {
        /// operations, document-types, schemas or facets
        collection: Collection,

        #[command(flatten)]
        source: SourceArgs,

        /// Print the resolved set as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// YAML configuration file (default: metaconst.yaml if present)
    #[arg(long, short = 'c', env = "METACONST_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL (e.g. http://localhost:8080/nuxeo)
    #[arg(long)]
    base_url: Option<String>,

    /// User for HTTP basic auth; the password comes from METACONST_PASSWORD
    #[arg(long, short = 'u')]
    username: Option<String>,

    /// Read metadata from a snapshot directory instead of the server
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Save fetched collections to this directory
    #[arg(long)]
    save_snapshot_dir: Option<PathBuf>,

    /// Output file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Restrict to these collections (repeatable)
    #[arg(long = "collection")]
    collections: Vec<Collection>,

    /// Keep server record order instead of sorting by key
    #[arg(long)]
    no_canonical_order: bool,

    /// Attempts per request, including the first
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl SourceArgs {
    fn into_config(self) -> Result<GeneratorConfig> {
        let mut config = GeneratorConfig::load(self.config.as_deref())?;

        if let Some(base_url) = self.base_url {
            config.base_url = Some(base_url);
        }
        if let Some(username) = self.username {
            config.username = Some(username);
        }
        if let Some(dir) = self.snapshot_dir {
            config.snapshot_dir = Some(dir);
        }
        if let Some(dir) = self.save_snapshot_dir {
            config.save_snapshot_dir = Some(dir);
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if !self.collections.is_empty() {
            config.collections = self.collections;
        }
        if self.no_canonical_order {
            config.canonical_order = false;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("metaconst={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Generate {
            source,
            dry_run,
            print,
        } => {
            let mode = if dry_run { RunMode::DryRun } else { RunMode::Write };
            generate(source.into_config()?, mode, print).await
        }
        Command::Check { source } => generate(source.into_config()?, RunMode::Check, false).await,
        Command::Inspect {
            collection,
            source,
            json,
        } => inspect(source.into_config()?, collection, json).await,
    }
}

async fn generate(config: GeneratorConfig, mode: RunMode, print: bool) -> Result<ExitCode> {
    let source = config.build_source()?;
    let options = GenerateOptions::new(config.output.clone())
        .with_collections(config.collections.clone())
        .with_canonical_order(config.canonical_order)
        .with_save_snapshot_dir(config.save_snapshot_dir.clone())
        .with_mode(mode);

    let outcome = Generator::new(source, options)
        .run()
        .await
        .context("Generation failed")?;

    if print {
        print!("{}", outcome.artifact.as_str());
    }

    let stats = outcome.artifact.stats();
    eprintln!("Summary");
    for collection in Collection::ALL {
        let s = stats.get(collection);
        eprintln!(
            "  {:<16} {:>5} entries  {:>3} aliases  {:>3} collisions",
            collection.label(),
            s.entries,
            s.aliases,
            s.collisions
        );
    }
    for (collection, reason) in &outcome.unavailable {
        eprintln!("  unavailable: {} ({})", collection, reason);
    }

    let code = match outcome.status {
        ArtifactStatus::Written => {
            eprintln!("Wrote {}", outcome.output.display());
            ExitCode::SUCCESS
        }
        ArtifactStatus::Unchanged => {
            eprintln!("{} is already up to date", outcome.output.display());
            ExitCode::SUCCESS
        }
        ArtifactStatus::Skipped => ExitCode::SUCCESS,
        ArtifactStatus::UpToDate => {
            eprintln!("{} is up to date", outcome.output.display());
            ExitCode::SUCCESS
        }
        ArtifactStatus::Stale => {
            eprintln!(
                "{} is out of date; run `metaconst generate`",
                outcome.output.display()
            );
            ExitCode::FAILURE
        }
    };
    Ok(code)
}

async fn inspect(config: GeneratorConfig, collection: Collection, json: bool) -> Result<ExitCode> {
    let source = config.build_source()?;
    let records = source
        .fetch_collection(collection)
        .await
        .with_context(|| format!("Failed to fetch {}", collection))?;

    let mut sets = resolve_collections(
        std::collections::BTreeMap::from([(collection, records)]),
        config.canonical_order,
    );
    let set = sets
        .remove(&collection)
        .context("Resolved set missing for requested collection")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&set)?);
        return Ok(ExitCode::SUCCESS);
    }

    let width = set
        .entries
        .iter()
        .map(|e| e.final_name.len())
        .max()
        .unwrap_or(0);
    for entry in set.sorted() {
        match &entry.alias_of_key {
            Some(owner) => println!(
                "{:<width$}  {}  (alias of {})",
                entry.final_name,
                entry.source_key,
                owner,
                width = width
            ),
            None => println!("{:<width$}  {}", entry.final_name, entry.source_key, width = width),
        }
    }

    if !set.collisions.is_empty() {
        println!("\nCollisions:");
        for c in &set.collisions {
            println!(
                "  {}: {} -> {} ({})",
                c.source_key, c.candidate_name, c.resolved_name, c.kind
            );
        }
    }
    for diagnostic in &set.diagnostics {
        println!("warning: {}", diagnostic);
    }

    Ok(ExitCode::SUCCESS)
}
