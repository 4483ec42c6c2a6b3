//! Generation pipeline: the five-sheet model build from validated input
//! to return metrics.
//!
//! Regeneration is destructive-replace: every managed sheet is deleted
//! and recreated in one batch, and the registry starts empty, so a rerun
//! can never mix stale cells with fresh ones.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cashflow;
use crate::completion::{self, CompletionProvider, FormulaOrigin};
use crate::config::EngineConfig;
use crate::debt;
use crate::model::ModelInput;
use crate::period::{build_grid, Granularity};
use crate::projection::{self, ProjectionFigures};
use crate::registry::CellReferenceRegistry;
use crate::returns::{self, ReturnsOutput};
use crate::time_value::IrrOutcome;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple};
use crate::workbook::SheetHost;
use crate::{assumptions, ModelGenError, ModelGenResult};

/// What one generation run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub sheets: Vec<String>,
    pub periods: u32,
    pub granularity: Granularity,
    pub registry_entries: usize,
    pub equity: Money,
    pub debt_amount: Money,
    pub sale_price: Money,
    pub unlevered_irr: IrrOutcome,
    pub levered_irr: IrrOutcome,
    pub moic: Multiple,
    pub unlevered_npv: Money,
    pub formula_origin: FormulaOrigin,
}

/// Run the full pipeline against a host workbook.
///
/// The completion provider is consulted once, for the derived equity and
/// debt cells; any failure there degrades to the template formulas and
/// surfaces as a warning, never as an error.
pub fn generate(
    input: &ModelInput,
    host: &mut dyn SheetHost,
    config: &EngineConfig,
    provider: &dyn CompletionProvider,
) -> ModelGenResult<ComputationOutput<GenerationSummary>> {
    let started = Instant::now();
    let mut warnings = Vec::new();

    let periods = input.validate(&config.period_caps)?;
    let grid = build_grid(input.start_date, periods, input.granularity)?;
    let names = &config.sheet_names;

    let mut registry = CellReferenceRegistry::new();
    recreate_sheets(host, &names.all())?;
    info!(periods, granularity = input.granularity.as_str(), "sheets recreated");

    let layout = assumptions::compile(input, &names.assumptions, host, &mut registry)?;

    let overrides = consult_provider(provider, input, &registry, &mut warnings);
    let ai_used = assumptions::write_derived(
        &names.assumptions,
        &layout,
        &overrides,
        host,
        &mut registry,
    )?;
    let formula_origin = if ai_used {
        FormulaOrigin::AiAssisted
    } else {
        FormulaOrigin::Template
    };

    let (revenue_total, opex_total, noi) = projection::compile_profit_and_loss(
        input,
        &grid,
        &names.projections,
        &names.assumptions,
        host,
        &mut registry,
    )?;
    let capex_total = projection::compile_capex(
        input,
        &grid,
        &names.capex,
        &names.assumptions,
        host,
        &mut registry,
    )?;

    let schedule = debt::compute_schedule(input, periods);
    debt::write_schedule(
        &schedule,
        &grid,
        &names.debt,
        &names.assumptions,
        host,
        &mut registry,
    )?;
    host.commit()?;

    let figures = ProjectionFigures {
        revenue_total,
        opex_total,
        noi,
        capex_total,
    };
    let fcf = cashflow::assemble(
        input,
        &grid,
        Some(&figures),
        &schedule,
        names,
        host,
        &mut registry,
        &mut warnings,
    )?;
    host.commit()?;

    let metrics: ReturnsOutput = returns::calculate_returns(input, &fcf, config.irr_guess)?;

    let summary = GenerationSummary {
        sheets: names.all().iter().map(|s| s.to_string()).collect(),
        periods,
        granularity: input.granularity,
        registry_entries: registry.len(),
        equity: input.equity_amount(),
        debt_amount: input.debt_amount(),
        sale_price: fcf.sale_price,
        unlevered_irr: metrics.unlevered_irr,
        levered_irr: metrics.levered_irr,
        moic: metrics.moic,
        unlevered_npv: metrics.unlevered_npv,
        formula_origin,
    };
    info!(
        registry_entries = summary.registry_entries,
        moic = %summary.moic,
        "model generated"
    );

    Ok(with_metadata(
        "Five-sheet deal model: assumption-linked template formulas, interest-only bullet debt, \
         terminal value at the exit cap rate, Newton-Raphson IRR",
        &serde_json::json!({
            "granularity": input.granularity.as_str(),
            "periods": periods,
            "ltv_pct": input.ltv_pct,
            "discount_rate_pct": input.discount_rate_pct,
        }),
        warnings,
        started.elapsed().as_micros() as u64,
        summary,
    ))
}

/// Delete and recreate every managed sheet in one batch. A failed commit
/// is retried once; hosts occasionally reject the first destructive
/// batch after a reopen.
fn recreate_sheets(host: &mut dyn SheetHost, sheets: &[&str]) -> ModelGenResult<()> {
    match queue_and_commit(host, sheets) {
        Err(ModelGenError::SheetError { sheet, reason }) => {
            warn!(sheet, reason, "sheet recreation failed; retrying once");
            queue_and_commit(host, sheets)
        }
        other => other,
    }
}

fn queue_and_commit(host: &mut dyn SheetHost, sheets: &[&str]) -> ModelGenResult<()> {
    for sheet in sheets {
        host.delete_sheet_if_exists(sheet)?;
        host.create_sheet(sheet)?;
    }
    host.commit()
}

/// Ask the provider for the derived equity/debt formulas. Anything short
/// of a well-formed suggestion map degrades to the empty override set.
fn consult_provider(
    provider: &dyn CompletionProvider,
    input: &ModelInput,
    registry: &CellReferenceRegistry,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let prompt = derivation_prompt(input, registry);
    match provider.complete(&prompt) {
        Ok(response) => match completion::extract_calculations(&response) {
            Some(map) => map,
            None => {
                warn!("completion response held no usable formulas; using templates");
                warnings.push(
                    "completion response held no usable formulas; derived cells use templates"
                        .into(),
                );
                BTreeMap::new()
            }
        },
        Err(err) => {
            warn!(%err, "completion provider unavailable; using templates");
            warnings.push(format!(
                "completion provider unavailable ({err}); derived cells use templates"
            ));
            BTreeMap::new()
        }
    }
}

fn derivation_prompt(input: &ModelInput, registry: &CellReferenceRegistry) -> String {
    let deal_value = registry
        .lookup("deal_value")
        .map(|r| r.qualified())
        .unwrap_or_else(|| input.deal_value.to_string());
    let ltv = registry
        .lookup("ltv")
        .map(|r| r.qualified())
        .unwrap_or_else(|| input.ltv_pct.to_string());

    format!(
        "You are filling in two derived cells of a deal model's assumptions sheet.\n\
         The deal value is in cell {deal_value} and the loan-to-value percentage \
         (0-100) is in cell {ltv}.\n\
         Respond with a JSON object of the form\n\
         {{\"calculations\": {{\"equity\": {{\"formula\": \"=...\"}}, \
         \"debt_amount\": {{\"formula\": \"=...\"}}}}}}\n\
         where each formula computes the equity contribution and the debt amount \
         from those cells."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellAddress;
    use crate::completion::NullCompletionProvider;
    use crate::model::fixtures::quarterly_deal;
    use crate::workbook::MemoryWorkbook;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct CannedProvider(String);

    impl CompletionProvider for CannedProvider {
        fn complete(&self, _prompt: &str) -> ModelGenResult<String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_full_generation_with_template_fallback() {
        let input = quarterly_deal();
        let mut wb = MemoryWorkbook::new();
        let config = EngineConfig::default();

        let output = generate(&input, &mut wb, &config, &NullCompletionProvider).unwrap();
        let summary = &output.result;

        assert_eq!(summary.periods, 5);
        assert_eq!(summary.equity, dec!(400000));
        assert_eq!(summary.debt_amount, dec!(600000));
        assert_eq!(summary.formula_origin, FormulaOrigin::Template);
        assert_eq!(
            wb.sheet_names(),
            vec!["Assumptions", "CapEx", "Debt Model", "FCF", "Projections"]
        );
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("completion provider unavailable")));

        // Derived cells landed as template formulas
        assert_eq!(
            wb.formula("Assumptions", CellAddress::new(14, 2)),
            Some("=B2*(1-B4/100)")
        );
        // FCF metrics row exists
        assert!(wb.formula("FCF", CellAddress::new(15, 2)).is_some());
    }

    #[test]
    fn test_ai_suggestions_are_used_when_plausible() {
        let input = quarterly_deal();
        let mut wb = MemoryWorkbook::new();
        let config = EngineConfig::default();
        let provider = CannedProvider(
            "Here you go: {\"calculations\": {\"equity\": {\"formula\": \"=B2-B2*B4/100\"}, \
             \"debt_amount\": {\"formula\": \"=B2*B4/100\"}}}"
                .into(),
        );

        let output = generate(&input, &mut wb, &config, &provider).unwrap();
        assert_eq!(output.result.formula_origin, FormulaOrigin::AiAssisted);
        assert_eq!(
            wb.formula("Assumptions", CellAddress::new(14, 2)),
            Some("=B2-B2*B4/100")
        );
    }

    #[test]
    fn test_prose_only_response_degrades_to_templates() {
        let input = quarterly_deal();
        let mut wb = MemoryWorkbook::new();
        let config = EngineConfig::default();
        let provider = CannedProvider("Multiply the deal value by the LTV.".into());

        let output = generate(&input, &mut wb, &config, &provider).unwrap();
        assert_eq!(output.result.formula_origin, FormulaOrigin::Template);
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("no usable formulas")));
    }

    #[test]
    fn test_regeneration_replaces_sheets() {
        let input = quarterly_deal();
        let mut wb = MemoryWorkbook::new();
        let config = EngineConfig::default();

        let first = generate(&input, &mut wb, &config, &NullCompletionProvider).unwrap();
        let second = generate(&input, &mut wb, &config, &NullCompletionProvider).unwrap();

        assert_eq!(
            first.result.registry_entries,
            second.result.registry_entries
        );
        assert_eq!(first.result.moic, second.result.moic);
        assert_eq!(wb.sheet_names().len(), 5);
    }

    #[test]
    fn test_zero_ltv_levered_equals_unlevered() {
        let mut input = quarterly_deal();
        input.ltv_pct = Decimal::ZERO;
        let mut wb = MemoryWorkbook::new();
        let config = EngineConfig::default();

        let output = generate(&input, &mut wb, &config, &NullCompletionProvider).unwrap();
        let summary = &output.result;

        assert_eq!(summary.unlevered_irr, summary.levered_irr);
        assert_eq!(summary.debt_amount, Decimal::ZERO);
        assert_eq!(
            wb.cell("Debt Model", CellAddress::new(2, 1)),
            Some(&crate::workbook::CellValue::Text("No debt (LTV = 0)".into()))
        );
    }

    #[test]
    fn test_invalid_input_writes_nothing() {
        let mut input = quarterly_deal();
        input.deal_value = Decimal::ZERO;
        let mut wb = MemoryWorkbook::new();
        let config = EngineConfig::default();

        let err = generate(&input, &mut wb, &config, &NullCompletionProvider).unwrap_err();
        assert!(matches!(err, ModelGenError::InvalidInput { .. }));
        assert!(wb.sheet_names().is_empty());
    }

    #[test]
    fn test_metadata_envelope() {
        let input = quarterly_deal();
        let mut wb = MemoryWorkbook::new();
        let config = EngineConfig::default();

        let output = generate(&input, &mut wb, &config, &NullCompletionProvider).unwrap();
        assert!(output.methodology.contains("IRR"));
        assert_eq!(output.metadata.precision, "rust_decimal_128bit");
        assert_eq!(output.assumptions["granularity"], "quarterly");
    }
}
