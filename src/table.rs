// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Aligned text tables of diagnostic records.

use std::fmt;

use crate::diagnostic::DiagnosticRecord;

const HEADER: [&str; 4] = ["Position", "Size", "Purpose", "Data"];

/// Collects records and prints them as
///
/// ```text
/// | Position | Size | Purpose | Data                              |
/// | -------- | ---- | ------- | --------------------------------- |
/// | 0        | 4    | RIFF    | '82 73 70 70' -> 'R I F F' (char) |
/// ```
///
/// Every column is as wide as its widest cell.
#[derive(Debug, Default)]
pub struct Table<'a> {
    records: Vec<DiagnosticRecord<'a>>,
}

impl<'a> Table<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DiagnosticRecord<'a>) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DiagnosticRecord<'a>] {
        &self.records
    }
}

impl<'a> FromIterator<DiagnosticRecord<'a>> for Table<'a> {
    fn from_iter<I: IntoIterator<Item = DiagnosticRecord<'a>>>(iter: I) -> Self {
        Self { records: iter.into_iter().collect() }
    }
}

impl<'a> Extend<DiagnosticRecord<'a>> for Table<'a> {
    fn extend<I: IntoIterator<Item = DiagnosticRecord<'a>>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: [&str; 4], widths: &[usize; 4]) -> fmt::Result {
    for (cell, &width) in cells.iter().zip(widths) {
        write!(f, "| {cell:<width$} ")?;
    }
    writeln!(f, "|")
}

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<[String; 4]> = self
            .records
            .iter()
            .map(|r| [r.offset.to_string(), r.len.to_string(), r.label.to_string(), r.rendering.to_string()])
            .collect();

        let mut widths = HEADER.map(|h| h.chars().count());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        write_row(f, HEADER, &widths)?;
        let rules = widths.map(|w| "-".repeat(w));
        write_row(f, [&rules[0], &rules[1], &rules[2], &rules[3]], &widths)?;
        for row in &rows {
            write_row(f, [&row[0], &row[1], &row[2], &row[3]], &widths)?;
        }
        Ok(())
    }
}

#[test]
fn columns_are_padded_to_the_widest_cell() {
    use crate::diagnostic::ValueKind;

    let data = b"RIFF\x10\0\0\0";
    let table: Table<'_> = [
        DiagnosticRecord::typed(data, 0, 4, "RIFF", ValueKind::Char),
        DiagnosticRecord::typed(data, 4, 4, "fileSize", ValueKind::U32Le),
        DiagnosticRecord::hidden(1000, 16, "chunk data #0"),
    ]
    .into_iter()
    .collect();
    assert_eq!(table.len(), 3);

    let expected = "\
| Position | Size | Purpose       | Data                                    |
| -------- | ---- | ------------- | --------------------------------------- |
| 0        | 4    | RIFF          | '82 73 70 70' -> 'R I F F' (char)       |
| 4        | 4    | fileSize      | '16 0 0 0' -> '16' (32Bit unsigned int) |
| 1000     | 16   | chunk data #0 |                                         |
";
    assert_eq!(table.to_string(), expected);
}

#[test]
fn empty_table_has_header_only() {
    let table = Table::new();
    assert!(table.is_empty());
    assert_eq!(
        table.to_string(),
        "| Position | Size | Purpose | Data |\n| -------- | ---- | ------- | ---- |\n"
    );
}

#[test]
fn latin1_text_counts_as_one_column_per_byte() {
    use crate::diagnostic::ValueKind;

    let data = b"\xe9t\xe9";
    let mut table = Table::new();
    table.push(DiagnosticRecord::typed(data, 0, 3, "chunk data #0", ValueKind::Char));
    let text = table.to_string();
    let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
    assert!(widths.windows(2).all(|w| w[0] == w[1]));
}
