//! Assumptions compiler: writes the canonical source-of-truth sheet and
//! registers every written cell.
//!
//! Scalars land in a fixed label/value column pair (A/B); each line-item
//! category gets a name/value/growth block. Derived equity and debt are
//! written as formulas over the registered deal-value and LTV cells, so
//! edits in the sheet propagate without regeneration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use tracing::debug;

use crate::address::{CellAddress, CellRange};
use crate::completion::is_plausible_formula;
use crate::model::{Growth, ItemCategory, ModelInput};
use crate::period::serial_date;
use crate::registry::CellReferenceRegistry;
use crate::workbook::{CellValue, SheetHost};
use crate::ModelGenResult;

const LABEL_COL: u32 = 1;
const VALUE_COL: u32 = 2;
const GROWTH_COL: u32 = 3;

/// Where the compiler left room for the derived fields, filled in by
/// [`write_derived`] after the optional AI consultation.
#[derive(Debug, Clone)]
pub struct AssumptionsLayout {
    pub derived_equity: CellAddress,
    pub derived_debt: CellAddress,
    pub rows_used: u32,
}

/// Write all scalar and line-item assumptions and register their cells.
/// Leaves the two derived value cells empty for [`write_derived`].
pub fn compile(
    input: &ModelInput,
    sheet: &str,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
) -> ModelGenResult<AssumptionsLayout> {
    let mut row = 1u32;
    write_label(host, sheet, row, "Deal Assumptions")?;
    row += 1;

    let scalars: [(&str, &str, CellValue); 12] = [
        ("deal_value", "Deal value", CellValue::Number(input.deal_value)),
        (
            "transaction_fee",
            "Transaction fee (%)",
            CellValue::Number(input.transaction_fee_pct),
        ),
        ("ltv", "LTV (%)", CellValue::Number(input.ltv_pct)),
        (
            "disposal_cost",
            "Disposal cost (%)",
            CellValue::Number(input.disposal_cost_pct),
        ),
        (
            "terminal_cap_rate",
            "Terminal cap rate (%)",
            CellValue::Number(input.terminal_cap_rate_pct),
        ),
        (
            "discount_rate",
            "Discount rate (%)",
            CellValue::Number(input.discount_rate_pct),
        ),
        (
            "debt_issuance_fee",
            "Debt issuance fee (%)",
            CellValue::Number(input.debt_terms.issuance_fee_pct),
        ),
        (
            "debt_fixed_rate",
            "Debt fixed rate (%)",
            CellValue::Number(input.debt_terms.fixed_rate_pct),
        ),
        (
            "currency",
            "Currency",
            CellValue::Text(input.currency.code().to_string()),
        ),
        (
            "start_date",
            "Start date",
            CellValue::Number(Decimal::from(serial_date(input.start_date))),
        ),
        (
            "end_date",
            "End date",
            CellValue::Number(Decimal::from(serial_date(input.end_date))),
        ),
        (
            "granularity",
            "Granularity",
            CellValue::Text(input.granularity.as_str().to_string()),
        ),
    ];

    for (key, label, value) in scalars {
        let address = CellAddress::new(row, VALUE_COL);
        write_label(host, sheet, row, label)?;
        host.write_cell(sheet, address, value)?;
        registry.record_cell(key, sheet, address);
        row += 1;
    }

    // Reserve the derived rows; their formulas arrive via write_derived.
    write_label(host, sheet, row, "Equity")?;
    let derived_equity = CellAddress::new(row, VALUE_COL);
    row += 1;
    write_label(host, sheet, row, "Debt amount")?;
    let derived_debt = CellAddress::new(row, VALUE_COL);
    row += 1;

    for category in [
        ItemCategory::Revenue,
        ItemCategory::OperatingExpense,
        ItemCategory::CapitalExpenditure,
    ] {
        row = compile_category(input, category, sheet, row, host, registry)?;
    }

    debug!(sheet, rows = row - 1, "assumptions sheet compiled");
    Ok(AssumptionsLayout {
        derived_equity,
        derived_debt,
        rows_used: row - 1,
    })
}

/// One line-item block: header, name/value/growth triples, count row.
/// An empty category writes nothing and consumes no rows.
fn compile_category(
    input: &ModelInput,
    category: ItemCategory,
    sheet: &str,
    start_row: u32,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
) -> ModelGenResult<u32> {
    let items = input.items(category);
    if items.is_empty() {
        return Ok(start_row);
    }
    let prefix = category.key_prefix();

    // Blank separator, then the header row
    let mut row = start_row + 1;
    write_label(host, sheet, row, category.header())?;
    host.write_cell(
        sheet,
        CellAddress::new(row, VALUE_COL),
        CellValue::Text("Base value".into()),
    )?;
    host.write_cell(
        sheet,
        CellAddress::new(row, GROWTH_COL),
        CellValue::Text("Growth rate".into()),
    )?;
    row += 1;

    let first_item_row = row;
    for (i, item) in items.iter().enumerate() {
        let n = i + 1;
        let name_cell = CellAddress::new(row, LABEL_COL);
        let value_cell = CellAddress::new(row, VALUE_COL);
        let growth_cell = CellAddress::new(row, GROWTH_COL);

        host.write_cell(sheet, name_cell, CellValue::Text(item.name.clone()))?;
        host.write_cell(sheet, value_cell, CellValue::Number(item.base_value))?;
        if let Growth::AnnualRate { rate_pct } = item.growth {
            host.write_cell(
                sheet,
                growth_cell,
                CellValue::Number(rate_pct / dec!(100)),
            )?;
        }

        registry.record_cell(&format!("{prefix}_{n}"), sheet, value_cell);
        registry.record_cell(&format!("{prefix}_{n}_name"), sheet, name_cell);
        registry.record_cell(&format!("{prefix}_{n}_growth_rate"), sheet, growth_cell);
        row += 1;
    }

    registry.record_range(
        &format!("{prefix}_range"),
        sheet,
        CellRange {
            start: CellAddress::new(first_item_row, VALUE_COL),
            end: CellAddress::new(row - 1, VALUE_COL),
        },
    );

    write_label(host, sheet, row, "Count")?;
    let count_cell = CellAddress::new(row, VALUE_COL);
    host.write_cell(
        sheet,
        count_cell,
        CellValue::Number(Decimal::from(items.len() as u64)),
    )?;
    registry.record_cell(&format!("{prefix}_count"), sheet, count_cell);

    Ok(row + 1)
}

/// Fill the derived equity and debt cells: AI-suggested formulas when a
/// plausible override exists for the key, the deterministic template
/// otherwise. Registers both keys.
pub fn write_derived(
    sheet: &str,
    layout: &AssumptionsLayout,
    overrides: &BTreeMap<String, String>,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
) -> ModelGenResult<bool> {
    let deal_value = registry.require("deal_value", "AssumptionsCompiler")?.address;
    let ltv = registry.require("ltv", "AssumptionsCompiler")?.address;

    let equity_template = format!(
        "={}*(1-{}/100)",
        deal_value.to_a1(),
        ltv.to_a1()
    );
    let debt_template = format!("={}*{}/100", deal_value.to_a1(), ltv.to_a1());

    let mut ai_used = false;
    let mut pick = |key: &str, template: String| -> String {
        match overrides.get(key) {
            Some(formula) if is_plausible_formula(formula) => {
                ai_used = true;
                formula.trim().to_string()
            }
            _ => template,
        }
    };

    let equity_formula = pick("equity", equity_template);
    let debt_formula = pick("debt_amount", debt_template);

    host.write_cell(
        sheet,
        layout.derived_equity,
        CellValue::Formula(equity_formula),
    )?;
    host.write_cell(sheet, layout.derived_debt, CellValue::Formula(debt_formula))?;
    registry.record_cell("equity", sheet, layout.derived_equity);
    registry.record_cell("debt_amount", sheet, layout.derived_debt);

    Ok(ai_used)
}

fn write_label(
    host: &mut dyn SheetHost,
    sheet: &str,
    row: u32,
    label: &str,
) -> ModelGenResult<()> {
    host.write_cell(
        sheet,
        CellAddress::new(row, LABEL_COL),
        CellValue::Text(label.to_string()),
    )
}
