//! CSV input: delimiter and encoding resolution, and loading a whole file
//! into memory as a [`RawTable`].
//!
//! - **Delimiter resolution**: `.tsv` → tab, anything else → comma, unless
//!   overridden.
//! - **Encoding**: input is decoded via `encoding_rs`, defaulting to UTF-8.
//! - **stdin**: the `-` path reads from standard input.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::pipeline::RawTable;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Header handling is done by the caller, so records are read without a
/// header row and with a fixed width.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads every record of `reader`, splitting off the first one as the header
/// row when `has_headers` is set.
pub fn read_table_from_reader<R: Read>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
    has_headers: bool,
) -> Result<RawTable> {
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading record {}", idx + 1))?;
        let decoded =
            decode_record(&record, encoding).with_context(|| format!("Decoding record {}", idx + 1))?;
        rows.push(decoded);
    }
    let headers = if has_headers && !rows.is_empty() {
        Some(rows.remove(0))
    } else {
        None
    };
    debug!(
        "Read {} data row(s){}",
        rows.len(),
        if headers.is_some() { " plus header" } else { "" }
    );
    Ok(RawTable::new(headers, rows))
}

pub fn read_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    has_headers: bool,
) -> Result<RawTable> {
    let mut reader = open_csv_reader_from_path(path, delimiter)?;
    read_table_from_reader(&mut reader, encoding, has_headers)
        .with_context(|| format!("Reading CSV {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn tsv_extension_selects_tab() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }

    #[test]
    fn header_row_is_split_off() {
        let data = "name,city\nAnn,NYC\nBo,LA\n";
        let mut reader = open_csv_reader(data.as_bytes(), b',');
        let table = read_table_from_reader(&mut reader, UTF_8, true).unwrap();
        assert_eq!(
            table.headers,
            Some(vec!["name".to_string(), "city".to_string()])
        );
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn without_headers_every_record_is_data() {
        let data = "1,2\n3,4\n";
        let mut reader = open_csv_reader(data.as_bytes(), b',');
        let table = read_table_from_reader(&mut reader, UTF_8, false).unwrap();
        assert!(table.headers.is_none());
        assert_eq!(table.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn ragged_rows_are_an_error() {
        let data = "1,2\n3\n";
        let mut reader = open_csv_reader(data.as_bytes(), b',');
        assert!(read_table_from_reader(&mut reader, UTF_8, false).is_err());
    }

    #[test]
    fn decodes_legacy_encodings() {
        let (encoded, _, _) = WINDOWS_1252.encode("Caf\u{e9},1\n");
        let mut reader = open_csv_reader(&encoded[..], b',');
        let table = read_table_from_reader(&mut reader, WINDOWS_1252, false).unwrap();
        assert_eq!(table.rows[0][0], "Caf\u{e9}");
    }
}
