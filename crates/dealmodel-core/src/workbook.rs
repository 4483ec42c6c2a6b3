//! Host spreadsheet boundary.
//!
//! The engine issues sheet writes through [`SheetHost`] and never
//! evaluates formulas itself. Writes follow a batched command model:
//! they are queued and only guaranteed readable after `commit()`.
//! [`MemoryWorkbook`] implements the same contract in memory for the
//! CLI, the bindings, and every test.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::CellAddress;
use crate::error::ModelGenError;
use crate::ModelGenResult;

/// Content of a single cell as the engine writes (or reads) it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(Decimal),
    /// Formula text including the leading `=`. Never evaluated here.
    Formula(String),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// The host spreadsheet interface consumed by the engine.
pub trait SheetHost {
    fn create_sheet(&mut self, name: &str) -> ModelGenResult<()>;
    fn delete_sheet_if_exists(&mut self, name: &str) -> ModelGenResult<()>;
    fn write_cell(&mut self, sheet: &str, address: CellAddress, value: CellValue)
        -> ModelGenResult<()>;
    /// Reads committed content only: a dense row-major grid covering
    /// the populated extent of the sheet, `Empty`-padded.
    fn read_used_range(&self, sheet: &str) -> ModelGenResult<Vec<Vec<CellValue>>>;
    /// Flush queued commands; content becomes readable after this.
    fn commit(&mut self) -> ModelGenResult<()>;

    /// Write a horizontal run of cells starting at `start`.
    fn write_row(
        &mut self,
        sheet: &str,
        start: CellAddress,
        values: Vec<CellValue>,
    ) -> ModelGenResult<()> {
        for (i, value) in values.into_iter().enumerate() {
            self.write_cell(sheet, start.offset(0, i as i64)?, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum PendingOp {
    CreateSheet(String),
    DeleteSheetIfExists(String),
    Write(String, CellAddress, CellValue),
}

/// In-memory spreadsheet honouring the batched commit contract.
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    committed: BTreeMap<String, BTreeMap<(u32, u32), CellValue>>,
    pending: Vec<PendingOp>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed sheet names, in name order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.committed.keys().cloned().collect()
    }

    /// Committed content of one cell, if any.
    pub fn cell(&self, sheet: &str, address: CellAddress) -> Option<&CellValue> {
        self.committed
            .get(sheet)?
            .get(&(address.row, address.col))
    }

    /// Committed formula text of one cell, for assertions.
    pub fn formula(&self, sheet: &str, address: CellAddress) -> Option<&str> {
        match self.cell(sheet, address) {
            Some(CellValue::Formula(f)) => Some(f.as_str()),
            _ => None,
        }
    }

    /// Dump all committed sheets as dense grids (CLI `--dump-sheets`).
    pub fn dump(&self) -> BTreeMap<String, Vec<Vec<CellValue>>> {
        self.committed
            .keys()
            .map(|name| {
                let grid = self.read_used_range(name).unwrap_or_default();
                (name.clone(), grid)
            })
            .collect()
    }

    /// Seed a sheet directly into committed state, bypassing the write
    /// queue. Test and CLI helper for the "reopened file" scenario.
    pub fn load_sheet(&mut self, name: &str, rows: Vec<Vec<CellValue>>) {
        let mut cells = BTreeMap::new();
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                if !value.is_empty() {
                    cells.insert((r as u32 + 1, c as u32 + 1), value);
                }
            }
        }
        self.committed.insert(name.to_string(), cells);
    }
}

impl SheetHost for MemoryWorkbook {
    fn create_sheet(&mut self, name: &str) -> ModelGenResult<()> {
        self.pending.push(PendingOp::CreateSheet(name.to_string()));
        Ok(())
    }

    fn delete_sheet_if_exists(&mut self, name: &str) -> ModelGenResult<()> {
        self.pending
            .push(PendingOp::DeleteSheetIfExists(name.to_string()));
        Ok(())
    }

    fn write_cell(
        &mut self,
        sheet: &str,
        address: CellAddress,
        value: CellValue,
    ) -> ModelGenResult<()> {
        self.pending
            .push(PendingOp::Write(sheet.to_string(), address, value));
        Ok(())
    }

    fn read_used_range(&self, sheet: &str) -> ModelGenResult<Vec<Vec<CellValue>>> {
        let cells = self
            .committed
            .get(sheet)
            .ok_or_else(|| ModelGenError::SheetError {
                sheet: sheet.to_string(),
                reason: "sheet does not exist (or is not yet committed)".into(),
            })?;

        let max_row = cells.keys().map(|(r, _)| *r).max().unwrap_or(0);
        let max_col = cells.keys().map(|(_, c)| *c).max().unwrap_or(0);

        let mut grid =
            vec![vec![CellValue::Empty; max_col as usize]; max_row as usize];
        for ((r, c), value) in cells {
            grid[(r - 1) as usize][(c - 1) as usize] = value.clone();
        }
        Ok(grid)
    }

    fn commit(&mut self) -> ModelGenResult<()> {
        let ops = std::mem::take(&mut self.pending);
        for op in ops {
            match op {
                PendingOp::CreateSheet(name) => {
                    if self.committed.contains_key(&name) {
                        return Err(ModelGenError::SheetError {
                            sheet: name,
                            reason: "sheet already exists".into(),
                        });
                    }
                    self.committed.insert(name, BTreeMap::new());
                }
                PendingOp::DeleteSheetIfExists(name) => {
                    self.committed.remove(&name);
                }
                PendingOp::Write(sheet, address, value) => {
                    let cells = self.committed.get_mut(&sheet).ok_or_else(|| {
                        ModelGenError::SheetError {
                            sheet: sheet.clone(),
                            reason: "write to a sheet that was never created".into(),
                        }
                    })?;
                    cells.insert((address.row, address.col), value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_invisible_until_commit() {
        let mut wb = MemoryWorkbook::new();
        wb.create_sheet("Assumptions").unwrap();
        wb.write_cell(
            "Assumptions",
            CellAddress::new(1, 1),
            CellValue::Text("Deal value".into()),
        )
        .unwrap();

        assert!(wb.read_used_range("Assumptions").is_err());

        wb.commit().unwrap();
        let grid = wb.read_used_range("Assumptions").unwrap();
        assert_eq!(grid[0][0], CellValue::Text("Deal value".into()));
    }

    #[test]
    fn test_delete_then_recreate_replaces_content() {
        let mut wb = MemoryWorkbook::new();
        wb.create_sheet("FCF").unwrap();
        wb.write_cell("FCF", CellAddress::new(1, 1), CellValue::Number(dec!(1)))
            .unwrap();
        wb.commit().unwrap();

        wb.delete_sheet_if_exists("FCF").unwrap();
        wb.create_sheet("FCF").unwrap();
        wb.commit().unwrap();

        let grid = wb.read_used_range("FCF").unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn test_create_existing_sheet_fails() {
        let mut wb = MemoryWorkbook::new();
        wb.create_sheet("Projections").unwrap();
        wb.commit().unwrap();
        wb.create_sheet("Projections").unwrap();
        assert!(wb.commit().is_err());
    }

    #[test]
    fn test_used_range_is_dense_and_padded() {
        let mut wb = MemoryWorkbook::new();
        wb.create_sheet("S").unwrap();
        wb.write_cell("S", CellAddress::new(2, 3), CellValue::Number(dec!(7)))
            .unwrap();
        wb.commit().unwrap();

        let grid = wb.read_used_range("S").unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 3);
        assert_eq!(grid[0][0], CellValue::Empty);
        assert_eq!(grid[1][2], CellValue::Number(dec!(7)));
    }

    #[test]
    fn test_write_row() {
        let mut wb = MemoryWorkbook::new();
        wb.create_sheet("S").unwrap();
        wb.write_row(
            "S",
            CellAddress::new(1, 2),
            vec![
                CellValue::Number(dec!(1)),
                CellValue::Number(dec!(2)),
                CellValue::Number(dec!(3)),
            ],
        )
        .unwrap();
        wb.commit().unwrap();

        assert_eq!(
            wb.cell("S", CellAddress::new(1, 4)),
            Some(&CellValue::Number(dec!(3)))
        );
    }
}
