use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::inference::DEFAULT_SAMPLE_ROWS;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load CSV files into SQLite through a column mapping", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a CSV file into a SQLite database using a mapping descriptor
    Import(ImportArgs),
    /// Infer column names and types and emit a starter mapping descriptor
    Probe(ProbeArgs),
    /// List the transformations available to mapping files
    Transforms(TransformsArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping descriptor (JSON, or YAML for .yml/.yaml)
    #[arg(short = 'm', long = "mapping")]
    pub mapping: PathBuf,
    /// Destination SQLite database file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Treat the first record as a header row
    #[arg(long = "has-headers")]
    pub has_headers: bool,
    /// Rows sampled per column when inferring types (0 means full scan)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination mapping file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Table name written into the mapping (defaults to the input file stem)
    #[arg(long = "table-name")]
    pub table_name: Option<String>,
    /// Treat the first record as a header row
    #[arg(long = "has-headers")]
    pub has_headers: bool,
    /// Rows sampled per column when inferring types (0 means full scan)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransformsArgs {
    /// Mapping whose custom transformations should be listed too
    #[arg(short = 'm', long = "mapping")]
    pub mapping: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_chars() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
