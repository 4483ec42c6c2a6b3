//! Cell reference registry: the symbol table binding semantic keys to
//! physical sheet addresses.
//!
//! The registry is created fresh per full regeneration and reused across
//! the sequential stage calls within that run, so later stages can build
//! formulas against cells written by earlier stages. There is no
//! versioning: once a run resets the registry, any reference cached from
//! a previous run is invalid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address::{CellAddress, CellRange};
use crate::error::ModelGenError;
use crate::ModelGenResult;

/// A registered cell: sheet, anchor address, and an optional range for
/// aggregate rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellReference {
    pub sheet: String,
    pub address: CellAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<CellRange>,
}

impl CellReference {
    pub fn cell(sheet: &str, address: CellAddress) -> Self {
        CellReference {
            sheet: sheet.to_string(),
            address,
            range: None,
        }
    }

    pub fn range(sheet: &str, range: CellRange) -> Self {
        CellReference {
            sheet: sheet.to_string(),
            address: range.start,
            range: Some(range),
        }
    }

    /// Sheet-qualified address of the anchor cell, e.g. `Assumptions!B2`.
    pub fn qualified(&self) -> String {
        self.address.qualify(&self.sheet)
    }

    /// Sheet-qualified range when one is registered, otherwise the
    /// anchor cell.
    pub fn qualified_range(&self) -> String {
        match self.range {
            Some(range) => range.qualify(&self.sheet),
            None => self.qualified(),
        }
    }
}

/// Symbol table mapping semantic keys (e.g. `revenue_2_growth_rate`) to
/// physical cell references. Re-recording a key overwrites: last write
/// wins, which keeps regeneration idempotent.
#[derive(Debug, Default)]
pub struct CellReferenceRegistry {
    entries: HashMap<String, CellReference>,
    order: Vec<String>,
}

impl CellReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, reference: CellReference) {
        if !self.entries.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.entries.insert(key.to_string(), reference);
    }

    pub fn record_cell(&mut self, key: &str, sheet: &str, address: CellAddress) {
        self.record(key, CellReference::cell(sheet, address));
    }

    pub fn record_range(&mut self, key: &str, sheet: &str, range: CellRange) {
        self.record(key, CellReference::range(sheet, range));
    }

    pub fn lookup(&self, key: &str) -> Option<&CellReference> {
        self.entries.get(key)
    }

    /// Lookup that fails with a named missing-reference error. Stages
    /// use this for references they cannot degrade without.
    pub fn require(&self, key: &str, stage: &str) -> ModelGenResult<&CellReference> {
        self.entries
            .get(key)
            .ok_or_else(|| ModelGenError::MissingReference {
                key: key.to_string(),
                stage: stage.to_string(),
            })
    }

    /// All entries for one sheet, in recording order.
    pub fn list_by_sheet(&self, sheet: &str) -> Vec<(&str, &CellReference)> {
        self.order
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .filter(|r| r.sheet == sheet)
                    .map(|r| (key.as_str(), r))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard everything. Called exactly when the corresponding sheets
    /// are recreated from scratch at the start of a run.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
