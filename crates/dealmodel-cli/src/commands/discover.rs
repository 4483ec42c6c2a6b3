use clap::Args;
use serde_json::Value;
use std::collections::BTreeMap;

use dealmodel_core::discovery;
use dealmodel_core::workbook::CellValue;
use dealmodel_core::MemoryWorkbook;

use crate::input;

/// Arguments for structure discovery over a dumped workbook
#[derive(Args)]
pub struct DiscoverArgs {
    /// Path to a dumped workbook JSON (sheet name to row grid, as
    /// produced by `generate --dump-sheets`)
    #[arg(long)]
    pub input: Option<String>,

    /// Sheet to scan for known row labels
    #[arg(long)]
    pub sheet: String,
}

pub fn run_discover(args: DiscoverArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sheets: BTreeMap<String, Vec<Vec<CellValue>>> = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <dump.json> or stdin required for discover".into());
    };

    let mut workbook = MemoryWorkbook::new();
    for (name, rows) in sheets {
        workbook.load_sheet(&name, rows);
    }

    let structure = discovery::discover(&workbook, &args.sheet)?;
    Ok(serde_json::to_value(structure)?)
}
