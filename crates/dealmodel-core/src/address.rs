//! Structured cell addressing.
//!
//! Every stage of the generator builds formula text out of these types;
//! column-letter arithmetic lives here and nowhere else.

use serde::{Deserialize, Serialize};

use crate::error::ModelGenError;
use crate::ModelGenResult;

/// A physical cell position on a sheet, 1-based in both dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub fn new(row: u32, col: u32) -> Self {
        CellAddress { row, col }
    }

    /// Shift the address by whole rows/columns. Fails rather than wrap
    /// when the result would fall off the sheet.
    pub fn offset(&self, rows: i64, cols: i64) -> ModelGenResult<CellAddress> {
        let row = self.row as i64 + rows;
        let col = self.col as i64 + cols;
        if row < 1 || col < 1 || row > u32::MAX as i64 || col > u32::MAX as i64 {
            return Err(ModelGenError::InvalidInput {
                field: "offset".into(),
                reason: format!(
                    "offset ({rows}, {cols}) from {} leaves the sheet",
                    self.to_a1()
                ),
            });
        }
        Ok(CellAddress {
            row: row as u32,
            col: col as u32,
        })
    }

    /// A1-style serialisation without a sheet qualifier, e.g. `B7`.
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_label(self.col), self.row)
    }

    /// Sheet-qualified serialisation, e.g. `Assumptions!B7` or
    /// `'Debt Model'!B7` when the sheet name needs quoting.
    pub fn qualify(&self, sheet: &str) -> String {
        format!("{}!{}", quote_sheet(sheet), self.to_a1())
    }
}

/// A rectangular cell range, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        CellRange { start, end }
    }

    /// A single row span from `start_col` to `end_col`.
    pub fn row_span(row: u32, start_col: u32, end_col: u32) -> Self {
        CellRange {
            start: CellAddress::new(row, start_col),
            end: CellAddress::new(row, end_col),
        }
    }

    pub fn to_a1(&self) -> String {
        format!("{}:{}", self.start.to_a1(), self.end.to_a1())
    }

    pub fn qualify(&self, sheet: &str) -> String {
        format!("{}!{}", quote_sheet(sheet), self.to_a1())
    }
}

/// Spreadsheet column label: 1 → A, 26 → Z, 27 → AA.
pub fn column_label(col: u32) -> String {
    debug_assert!(col >= 1);
    let mut n = col;
    let mut label = String::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        label.insert(0, (b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    label
}

fn quote_sheet(sheet: &str) -> String {
    if sheet.contains(' ') {
        format!("'{sheet}'")
    } else {
        sheet.to_string()
    }
}
