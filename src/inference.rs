//! Column kind inference from sampled row values.
//!
//! Each sampled value is classified on its own by [`classify_value`]; the
//! column kind then follows a fixed priority: any text sample makes the column
//! text, otherwise any real sample makes it real, otherwise it is integer.

use crate::{data::Row, mapping::DataKind};

pub const DEFAULT_SAMPLE_ROWS: usize = 1000;

/// Classifies a single raw value.
pub fn classify_value(value: &str) -> DataKind {
    let trimmed = value.trim();
    let unsigned = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);
    if is_all_digits(unsigned) {
        return DataKind::Integer;
    }
    if unsigned.matches('.').count() == 1 && is_all_digits(&unsigned.replacen('.', "", 1)) {
        return DataKind::Real;
    }
    DataKind::Text
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindTally {
    pub integer: usize,
    pub real: usize,
    pub text: usize,
}

impl KindTally {
    pub fn record(&mut self, kind: DataKind) {
        match kind {
            DataKind::Integer => self.integer += 1,
            DataKind::Real => self.real += 1,
            DataKind::Text => self.text += 1,
        }
    }

    pub fn decide(&self) -> DataKind {
        if self.text > 0 {
            DataKind::Text
        } else if self.real > 0 {
            DataKind::Real
        } else {
            DataKind::Integer
        }
    }
}

/// Tallies the first `sample_rows` values of column `index` (0 samples all
/// rows). Rows too short to hold the column count as empty text.
pub fn tally_column(rows: &[Row], index: usize, sample_rows: usize) -> KindTally {
    let limit = if sample_rows == 0 {
        rows.len()
    } else {
        sample_rows.min(rows.len())
    };
    let mut tally = KindTally::default();
    for row in &rows[..limit] {
        let value = row.get(index).map(String::as_str).unwrap_or("");
        tally.record(classify_value(value));
    }
    tally
}

pub fn infer_kind(rows: &[Row], index: usize, sample_rows: usize) -> DataKind {
    tally_column(rows, index, sample_rows).decide()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[&str]) -> Vec<Row> {
        values.iter().map(|v| vec![v.to_string()]).collect()
    }

    #[test]
    fn classify_handles_signs_and_points() {
        assert_eq!(classify_value("42"), DataKind::Integer);
        assert_eq!(classify_value("-42"), DataKind::Integer);
        assert_eq!(classify_value("+0"), DataKind::Integer);
        assert_eq!(classify_value(" 7 "), DataKind::Integer);
        assert_eq!(classify_value("12.5"), DataKind::Real);
        assert_eq!(classify_value("-.5"), DataKind::Real);
        assert_eq!(classify_value("3."), DataKind::Real);
    }

    #[test]
    fn classify_falls_back_to_text() {
        assert_eq!(classify_value(""), DataKind::Text);
        assert_eq!(classify_value("+"), DataKind::Text);
        assert_eq!(classify_value("."), DataKind::Text);
        assert_eq!(classify_value("1.2.3"), DataKind::Text);
        assert_eq!(classify_value("--1"), DataKind::Text);
        assert_eq!(classify_value("1e5"), DataKind::Text);
        assert_eq!(classify_value("abc"), DataKind::Text);
    }

    #[test]
    fn one_text_sample_makes_the_column_text() {
        let rows = column(&["1", "2.5", "abc", "4"]);
        assert_eq!(infer_kind(&rows, 0, DEFAULT_SAMPLE_ROWS), DataKind::Text);
    }

    #[test]
    fn real_wins_over_integer() {
        let rows = column(&["1", "2", "12.5"]);
        assert_eq!(infer_kind(&rows, 0, DEFAULT_SAMPLE_ROWS), DataKind::Real);
    }

    #[test]
    fn samples_only_the_leading_window() {
        let mut values = vec!["1"; 1000];
        values.push("abc");
        let rows = column(&values);
        assert_eq!(infer_kind(&rows, 0, DEFAULT_SAMPLE_ROWS), DataKind::Integer);
        assert_eq!(infer_kind(&rows, 0, 0), DataKind::Text);
    }

    #[test]
    fn empty_row_set_is_integer() {
        assert_eq!(infer_kind(&[], 0, DEFAULT_SAMPLE_ROWS), DataKind::Integer);
    }

    #[test]
    fn tally_counts_every_sample() {
        let rows = column(&["1", "x", "2.0", "3"]);
        let tally = tally_column(&rows, 0, 0);
        assert_eq!(
            tally,
            KindTally {
                integer: 2,
                real: 1,
                text: 1
            }
        );
    }
}
