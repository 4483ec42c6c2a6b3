use clap::Args;
use serde_json::Value;

use dealmodel_core::completion::NullCompletionProvider;
use dealmodel_core::pipeline;
use dealmodel_core::{EngineConfig, MemoryWorkbook, ModelInput};

use crate::input;

/// Arguments for full model generation
#[derive(Args)]
pub struct GenerateArgs {
    /// Path to JSON deal input file (or pipe JSON via stdin)
    #[arg(long)]
    pub input: Option<String>,

    /// Include the committed sheet contents in the output
    #[arg(long)]
    pub dump_sheets: bool,

    /// Path to a JSON engine config (period caps, IRR guess, sheet names)
    #[arg(long)]
    pub config: Option<String>,
}

pub fn run_generate(args: GenerateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model_input: ModelInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for generate".into());
    };

    let mut workbook = MemoryWorkbook::new();
    let config: EngineConfig = match args.config {
        Some(ref path) => input::file::read_json(path)?,
        None => EngineConfig::default(),
    };
    let output = pipeline::generate(
        &model_input,
        &mut workbook,
        &config,
        &NullCompletionProvider,
    )?;

    let mut value = serde_json::to_value(&output)?;
    if args.dump_sheets {
        value["sheets_content"] = serde_json::to_value(workbook.dump())?;
    }
    Ok(value)
}
