use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dealmodel_core::completion::NullCompletionProvider;
use dealmodel_core::period::{self, build_grid, Granularity, PeriodCaps};
use dealmodel_core::time_value;
use dealmodel_core::{pipeline, EngineConfig, MemoryWorkbook, ModelInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Model generation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateModelResponse {
    output: dealmodel_core::ComputationOutput<pipeline::GenerationSummary>,
    sheets: std::collections::BTreeMap<String, Vec<Vec<dealmodel_core::workbook::CellValue>>>,
}

/// Generate the full five-sheet model. The caller applies the returned
/// sheet grids to its own workbook.
#[napi]
pub fn generate_model(input_json: String) -> NapiResult<String> {
    let input: ModelInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;

    let mut workbook = MemoryWorkbook::new();
    let config = EngineConfig::default();
    let output = pipeline::generate(&input, &mut workbook, &config, &NullCompletionProvider)
        .map_err(to_napi_error)?;

    let response = GenerateModelResponse {
        output,
        sheets: workbook.dump(),
    };
    serde_json::to_string(&response).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CountPeriodsInput {
    start_date: NaiveDate,
    end_date: NaiveDate,
    granularity: Granularity,
}

#[derive(Serialize)]
struct CountPeriodsOutput {
    periods: u32,
    labels: Vec<String>,
}

#[napi]
pub fn count_periods(input_json: String) -> NapiResult<String> {
    let input: CountPeriodsInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;

    let caps = PeriodCaps::default();
    let periods = period::count_periods(input.start_date, input.end_date, input.granularity, &caps);
    let grid = build_grid(input.start_date, periods, input.granularity).map_err(to_napi_error)?;

    let output = CountPeriodsOutput {
        periods,
        labels: grid.into_iter().map(|p| p.label).collect(),
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IrrInput {
    cash_flows: Vec<Decimal>,
    guess: Option<Decimal>,
}

#[napi]
pub fn calculate_irr(input_json: String) -> NapiResult<String> {
    let input: IrrInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let guess = input.guess.unwrap_or(EngineConfig::default().irr_guess);
    let outcome = time_value::irr(&input.cash_flows, guess).map_err(to_napi_error)?;
    serde_json::to_string(&outcome).map_err(to_napi_error)
}
