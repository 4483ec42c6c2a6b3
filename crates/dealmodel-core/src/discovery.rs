//! Structure discovery: reverse-engineer row positions from an
//! already-populated sheet when the registry from the original run is
//! gone (e.g. a reopened file).
//!
//! Inherently fuzzy and best-effort. Absence of a marker is a normal
//! state, never an error; callers fall back to a degraded computation
//! or fail with a missing-reference error — never a guessed row.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::CellRange;
use crate::workbook::SheetHost;
use crate::ModelGenResult;

/// The known textual markers scanned for in a sheet's label column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureMarker {
    TotalRevenue,
    Noi,
    TotalOperatingExpenses,
    TotalCapex,
    InterestExpense,
    NetIncome,
}

impl StructureMarker {
    pub const ALL: [StructureMarker; 6] = [
        StructureMarker::TotalRevenue,
        StructureMarker::Noi,
        StructureMarker::TotalOperatingExpenses,
        StructureMarker::TotalCapex,
        StructureMarker::InterestExpense,
        StructureMarker::NetIncome,
    ];

    /// Case-insensitive substrings recognised for this marker.
    fn patterns(&self) -> &'static [&'static str] {
        match self {
            StructureMarker::TotalRevenue => &["total revenue"],
            StructureMarker::Noi => &["noi", "net operating income"],
            StructureMarker::TotalOperatingExpenses => &["total operating expense"],
            StructureMarker::TotalCapex => &["total capex", "capital expenditure"],
            StructureMarker::InterestExpense => &["interest expense"],
            StructureMarker::NetIncome => &["net income"],
        }
    }
}

/// A marker located on a sheet: the 1-based row and the inferred value
/// range (second column through the last populated column of that row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredRow {
    pub row: u32,
    pub range: CellRange,
}

/// Best-effort mapping from markers to rows. Partial by design;
/// ephemeral, recomputed on demand, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetStructure {
    rows: BTreeMap<StructureMarker, DiscoveredRow>,
}

impl SheetStructure {
    pub fn get(&self, marker: StructureMarker) -> Option<&DiscoveredRow> {
        self.rows.get(&marker)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Scan a committed sheet's label column for known markers. Must only
/// run after the commit that produced the sheet's content. First
/// matching row per marker wins.
pub fn discover(host: &dyn SheetHost, sheet: &str) -> ModelGenResult<SheetStructure> {
    let grid = host.read_used_range(sheet)?;
    let mut structure = SheetStructure::default();

    for (row_idx, row) in grid.iter().enumerate() {
        let Some(label) = row.first().and_then(|cell| cell.as_text()) else {
            continue;
        };
        let label = label.to_lowercase();

        for marker in StructureMarker::ALL {
            if structure.rows.contains_key(&marker) {
                continue;
            }
            if marker.patterns().iter().any(|p| label.contains(p)) {
                let row_number = row_idx as u32 + 1;
                let last_col = last_populated_col(row).unwrap_or(2);
                structure.rows.insert(
                    marker,
                    DiscoveredRow {
                        row: row_number,
                        range: CellRange::row_span(row_number, 2, last_col.max(2)),
                    },
                );
            }
        }
    }

    Ok(structure)
}

fn last_populated_col(row: &[crate::workbook::CellValue]) -> Option<u32> {
    row.iter()
        .rposition(|cell| !cell.is_empty())
        .map(|i| i as u32 + 1)
}
