use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tagmerge::config::ensure_database_directory;
use tagmerge::{
    Config, Database, NoEnrichment, RankedResults, RawBatch, ResultAggregator, TaxonomyService,
    TermError, TermIdentity,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// tagmerge - encode concept tags and merge provider search results
#[derive(Parser)]
#[command(name = "tagmerge")]
#[command(about = "Encode concept tags and merge search results from several providers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Parse an encoded term and print it as JSON
    Parse(ParseCommand),
    /// Merge provider result batches into one ranked list
    Search(SearchCommand),
    /// Store an encoded term in the taxonomy
    Save(SaveCommand),
    /// Store an encoded term and link it to a content item
    Tag(TagCommand),
}

#[derive(Parser)]
struct ParseCommand {
    /// Encoded term, e.g. "freebase:/m/04wv_|Moon|film"
    #[arg(value_name = "ENCODED")]
    encoded: String,
}

#[derive(Parser)]
struct SearchCommand {
    /// JSON files, each mapping combined ids to result attributes
    #[arg(value_name = "BATCH", required = true)]
    batches: Vec<PathBuf>,

    /// Comma-separated providers taking part in the search
    #[arg(short, long, value_name = "PROVIDERS")]
    providers: Option<String>,
}

#[derive(Parser)]
struct SaveCommand {
    #[arg(value_name = "ENCODED")]
    encoded: String,
}

#[derive(Parser)]
struct TagCommand {
    /// Id of the content item being tagged
    #[arg(value_name = "CONTENT_ID")]
    content_id: i64,

    #[arg(value_name = "ENCODED")]
    encoded: String,

    /// Field the tag is stored in
    #[arg(short, long, value_name = "NAME", default_value = "tags")]
    field: String,
}

/// Input the CLI refuses, as opposed to a failure while handling it.
#[derive(Debug, Error)]
enum CliError {
    #[error("term {id} cannot be tagged in vocabulary {vocabulary:?}")]
    NotTaggable { id: String, vocabulary: String },
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Parse(cmd) => handle_parse(cmd),
        Commands::Search(cmd) => handle_search(cmd),
        Commands::Save(cmd) => handle_save(cmd),
        Commands::Tag(cmd) => handle_tag(cmd),
    };

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Logs go to stderr so stdout stays valid JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are malformed terms or batches and terms the vocabulary
/// refuses. Internal errors include database failures and I/O errors.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.is::<TermError>() || cause.is::<CliError>() || cause.is::<serde_json::Error>()
    })
}

fn handle_parse(cmd: &ParseCommand) -> Result<()> {
    let term = execute_parse(&cmd.encoded)?;
    print_json(&serde_json::to_value(&term)?)
}

fn handle_search(cmd: &SearchCommand) -> Result<()> {
    let config = Config::from_env()?;
    let service = open_service(&config)?;
    let providers = cmd.providers.as_deref().map(parse_list).unwrap_or_default();

    let ranked = execute_search(&cmd.batches, &providers, &config, &service)?;
    print_json(&serde_json::to_value(&ranked)?)
}

fn handle_save(cmd: &SaveCommand) -> Result<()> {
    let config = Config::from_env()?;
    let service = open_service(&config)?;
    print_json(&execute_save(&cmd.encoded, &service)?)
}

fn handle_tag(cmd: &TagCommand) -> Result<()> {
    let config = Config::from_env()?;
    let service = open_service(&config)?;
    print_json(&execute_tag(cmd.content_id, &cmd.encoded, &cmd.field, &service)?)
}

fn open_service(config: &Config) -> Result<TaxonomyService> {
    ensure_database_directory(&config.database_path)?;
    let db = Database::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database_path.display()
        )
    })?;

    let service = TaxonomyService::from_config(db, config);
    service
        .ensure_vocabulary()
        .context("Failed to prepare vocabulary")?;
    Ok(service)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn execute_parse(encoded: &str) -> Result<TermIdentity> {
    let term = TermIdentity::from_encoded(encoded)
        .with_context(|| format!("Failed to parse term {encoded:?}"))?;
    Ok(term)
}

/// Merges batch files into ranked results, using stored usage as frequency.
fn execute_search(
    batches: &[PathBuf],
    providers: &[String],
    config: &Config,
    service: &TaxonomyService,
) -> Result<RankedResults> {
    let mut search = ResultAggregator::new(providers).with_options(config.payload_options());
    for path in batches {
        let accepted = search.add_raw_results(read_batch(path)?);
        info!(path = %path.display(), accepted, "loaded provider batch");
    }
    Ok(search.finalize(service))
}

/// Reads a batch file; only its top-level shape is checked here.
fn read_batch(path: &Path) -> Result<RawBatch> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    let batch = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid batch file: {}", path.display()))?;
    Ok(batch)
}

fn execute_save(encoded: &str, service: &TaxonomyService) -> Result<Value> {
    let mut term = execute_parse(encoded)?;
    let saved = service
        .save_new_term(&mut term, &NoEnrichment)
        .context("Failed to save term")?
        .ok_or_else(|| CliError::NotTaggable {
            id: term.combined_id().to_string(),
            vocabulary: service.vocabulary().to_string(),
        })?;

    Ok(json!({
        "tid": saved.tid(),
        "is_new": saved.is_new,
        "selection": term.selection_key(),
    }))
}

fn execute_tag(
    content_id: i64,
    encoded: &str,
    field: &str,
    service: &TaxonomyService,
) -> Result<Value> {
    let mut saved = execute_save(encoded, service)?;
    let tid = saved["tid"]
        .as_i64()
        .map(tagmerge::TermId::new)
        .context("saved term has no id")?;

    let linked = service
        .link_term(content_id, tid, field)
        .context("Failed to link term")?;
    saved["linked"] = Value::Bool(linked);
    Ok(saved)
}

/// Parses a comma-separated list, dropping blank entries.
fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
