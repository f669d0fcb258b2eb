pub mod cli;
pub mod data;
pub mod error;
pub mod foreign_keys;
pub mod inference;
pub mod io_utils;
pub mod mapping;
pub mod naming;
pub mod pipeline;
pub mod store;
pub mod transform;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    mapping::MappingFile,
    pipeline::{ImportOptions, Importer},
    store::SqliteStore,
    transform::TransformRegistry,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv2sqlite", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => handle_import(&args),
        Commands::Probe(args) => handle_probe(&args),
        Commands::Transforms(args) => handle_transforms(&args),
    }
}

/// Loads a mapping and builds the registry it needs: built-ins plus the
/// mapping's own transformations file, if it names one.
fn load_mapping_with_registry(path: &Path) -> Result<(MappingFile, TransformRegistry)> {
    let mapping =
        MappingFile::load(path).with_context(|| format!("Loading mapping from {path:?}"))?;
    let mut registry = TransformRegistry::with_builtins();
    if let Some(custom) = mapping.transformations_path() {
        registry
            .load_expressions(&custom)
            .with_context(|| format!("Loading transformations from {custom:?}"))?;
    }
    Ok((mapping, registry))
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let (mapping, registry) = load_mapping_with_registry(&args.mapping)?;
    let importer = Importer::new(mapping, &registry)
        .with_context(|| format!("Validating mapping {:?}", args.mapping))?
        .with_options(ImportOptions {
            sample_rows: args.sample_rows,
        });

    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let input = io_utils::read_table(&args.input, delimiter, encoding, args.has_headers)?;

    let mut store = SqliteStore::open(&args.output)
        .with_context(|| format!("Opening database {:?}", args.output))?;
    let summary = importer
        .run(&mut store, input)
        .with_context(|| format!("Importing {:?} into {:?}", args.input, args.output))?;

    for (table, added) in &summary.lookup_rows_inserted {
        debug!("Lookup table '{table}' gained {added} row(s)");
    }
    info!(
        "Imported {} row(s) into '{}' ({} lookup table(s)) at {:?}",
        summary.rows_inserted,
        summary.table,
        summary.lookup_rows_inserted.len(),
        args.output
    );
    Ok(())
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let input = io_utils::read_table(&args.input, delimiter, encoding, args.has_headers)?;
    let width = input
        .rows
        .first()
        .or(input.headers.as_ref())
        .map(Vec::len)
        .unwrap_or(0);
    let table_name = args.table_name.clone().unwrap_or_else(|| {
        args.input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| *stem != "-")
            .map(naming::sanitize_header)
            .unwrap_or_else(|| "imported".to_string())
    });
    let skeleton = MappingFile::new(
        table_name,
        (0..width).map(mapping::ColumnRule::new).collect(),
    );
    let resolved = skeleton
        .resolve(input.headers.as_deref(), &input.rows, args.sample_rows)
        .with_context(|| format!("Inferring mapping for {:?}", args.input))?;
    let inferred = resolved.to_mapping_file();

    match &args.output {
        Some(path) => {
            inferred
                .save(path)
                .with_context(|| format!("Writing mapping to {path:?}"))?;
            info!(
                "Inferred mapping for {} column(s) written to {:?}",
                inferred.mappings.len(),
                path
            );
        }
        None => println!("{}", inferred.render(false)?),
    }
    Ok(())
}

fn handle_transforms(args: &cli::TransformsArgs) -> Result<()> {
    let registry = match &args.mapping {
        Some(path) => load_mapping_with_registry(path)?.1,
        None => TransformRegistry::with_builtins(),
    };
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
