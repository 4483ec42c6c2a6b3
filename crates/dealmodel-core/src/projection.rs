//! Projection compiler: per-period formula rows for each line-item
//! category, aggregate total rows, and the NOI line.
//!
//! Formula policy per item, per period p: period 1 references the
//! registered base-value cell on the assumptions sheet; later periods
//! reference the prior period's cell, scaled by
//! `(1 + growth-rate-cell / divisor)` for annual-rate items and copied
//! unchanged for flat items. The same loop produces the numeric series
//! consumed by the cash-flow and returns stages, so formulas and
//! numbers cannot drift apart.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::address::{CellAddress, CellRange};
use crate::model::{Growth, ItemCategory, ModelInput};
use crate::period::Period;
use crate::registry::CellReferenceRegistry;
use crate::workbook::{CellValue, SheetHost};
use crate::ModelGenResult;

/// First period column: column A is the label column.
const FIRST_PERIOD_COL: u32 = 2;

/// Numeric results of the projection stage, one value per operating
/// period.
#[derive(Debug, Clone)]
pub struct ProjectionFigures {
    pub revenue_total: Vec<Decimal>,
    pub opex_total: Vec<Decimal>,
    pub noi: Vec<Decimal>,
    pub capex_total: Vec<Decimal>,
}

struct CategoryBlock {
    total_row: u32,
    totals: Vec<Decimal>,
    next_row: u32,
}

/// Compile the P&L sheet: revenue block, operating-expense block, and
/// the NOI row (the terminal line of the projection — no depreciation,
/// interest, or net-income rows belong here).
pub fn compile_profit_and_loss(
    input: &ModelInput,
    grid: &[Period],
    sheet: &str,
    assumptions_sheet: &str,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
) -> ModelGenResult<(Vec<Decimal>, Vec<Decimal>, Vec<Decimal>)> {
    write_period_header(grid, sheet, host)?;

    let revenue = compile_category_block(
        input,
        ItemCategory::Revenue,
        grid,
        sheet,
        assumptions_sheet,
        2,
        host,
        registry,
    )?;
    registry.record_range(
        "total_revenue_row",
        sheet,
        total_range(revenue.total_row, grid.len()),
    );

    let opex = compile_category_block(
        input,
        ItemCategory::OperatingExpense,
        grid,
        sheet,
        assumptions_sheet,
        revenue.next_row,
        host,
        registry,
    )?;
    registry.record_range(
        "total_opex_row",
        sheet,
        total_range(opex.total_row, grid.len()),
    );

    // NOI = Total Revenue + Total Operating Expenses. Expenses are
    // stored negative, so this is a pure addition.
    let noi_row = opex.next_row;
    host.write_cell(
        sheet,
        CellAddress::new(noi_row, 1),
        CellValue::Text("NOI".into()),
    )?;
    let mut noi = Vec::with_capacity(grid.len());
    for p in 0..grid.len() {
        let col = FIRST_PERIOD_COL + p as u32;
        let formula = format!(
            "={}+{}",
            CellAddress::new(revenue.total_row, col).to_a1(),
            CellAddress::new(opex.total_row, col).to_a1()
        );
        host.write_cell(sheet, CellAddress::new(noi_row, col), CellValue::Formula(formula))?;
        noi.push(revenue.totals[p] + opex.totals[p]);
    }
    registry.record_range("noi_row", sheet, total_range(noi_row, grid.len()));

    debug!(sheet, periods = grid.len(), "profit and loss compiled");
    Ok((revenue.totals, opex.totals, noi))
}

/// Compile the capital-expenditure sheet: item rows plus a total row.
pub fn compile_capex(
    input: &ModelInput,
    grid: &[Period],
    sheet: &str,
    assumptions_sheet: &str,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
) -> ModelGenResult<Vec<Decimal>> {
    write_period_header(grid, sheet, host)?;

    let block = compile_category_block(
        input,
        ItemCategory::CapitalExpenditure,
        grid,
        sheet,
        assumptions_sheet,
        2,
        host,
        registry,
    )?;
    registry.record_range(
        "capex_total_row",
        sheet,
        total_range(block.total_row, grid.len()),
    );

    debug!(sheet, periods = grid.len(), "capex projection compiled");
    Ok(block.totals)
}

/// One category: N item rows then a total row. A category with zero
/// items still gets its total row, holding a literal 0 per period
/// (never an empty sum).
#[allow(clippy::too_many_arguments)]
fn compile_category_block(
    input: &ModelInput,
    category: ItemCategory,
    grid: &[Period],
    sheet: &str,
    assumptions_sheet: &str,
    start_row: u32,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
) -> ModelGenResult<CategoryBlock> {
    let items = input.items(category);
    let prefix = category.key_prefix();
    let sign = category.sign();
    let periods = grid.len();

    let mut item_values: Vec<Vec<Decimal>> = Vec::with_capacity(items.len());
    let mut row = start_row;

    for (i, item) in items.iter().enumerate() {
        let n = i + 1;
        host.write_cell(
            sheet,
            CellAddress::new(row, 1),
            CellValue::Text(item.name.clone()),
        )?;

        let base_ref = registry.require(&format!("{prefix}_{n}"), "ProjectionCompiler")?;
        let base_qualified = base_ref.address.qualify(assumptions_sheet);
        let growth_ref =
            registry.require(&format!("{prefix}_{n}_growth_rate"), "ProjectionCompiler")?;
        let growth_qualified = growth_ref.address.qualify(assumptions_sheet);

        let mut values = Vec::with_capacity(periods);
        for p in 0..periods {
            let col = FIRST_PERIOD_COL + p as u32;
            let address = CellAddress::new(row, col);

            let (formula, value) = if p == 0 {
                let formula = if sign.is_sign_negative() {
                    format!("=-{base_qualified}")
                } else {
                    format!("={base_qualified}")
                };
                (formula, item.base_value * sign)
            } else {
                let prev = CellAddress::new(row, col - 1).to_a1();
                match item.growth {
                    Growth::AnnualRate { rate_pct } => {
                        let divisor = input.granularity.divisor();
                        let formula = if divisor == Decimal::ONE {
                            format!("={prev}*(1+{growth_qualified})")
                        } else {
                            format!("={prev}*(1+{growth_qualified}/{divisor})")
                        };
                        let factor = Decimal::ONE + rate_pct / dec!(100) / divisor;
                        (formula, values[p - 1] * factor)
                    }
                    Growth::None => (format!("={prev}"), values[p - 1]),
                }
            };

            host.write_cell(sheet, address, CellValue::Formula(formula))?;
            values.push(value);
        }
        item_values.push(values);
        row += 1;
    }

    // Total row
    let total_row = row;
    host.write_cell(
        sheet,
        CellAddress::new(total_row, 1),
        CellValue::Text(category.total_label().to_string()),
    )?;
    let mut totals = Vec::with_capacity(periods);
    for p in 0..periods {
        let col = FIRST_PERIOD_COL + p as u32;
        let address = CellAddress::new(total_row, col);
        if items.is_empty() {
            host.write_cell(sheet, address, CellValue::Number(Decimal::ZERO))?;
            totals.push(Decimal::ZERO);
        } else {
            let span = CellRange {
                start: CellAddress::new(start_row, col),
                end: CellAddress::new(total_row - 1, col),
            };
            host.write_cell(
                sheet,
                address,
                CellValue::Formula(format!("=SUM({})", span.to_a1())),
            )?;
            totals.push(item_values.iter().map(|v| v[p]).sum());
        }
    }

    Ok(CategoryBlock {
        total_row,
        totals,
        next_row: total_row + 1,
    })
}

fn write_period_header(
    grid: &[Period],
    sheet: &str,
    host: &mut dyn SheetHost,
) -> ModelGenResult<()> {
    host.write_cell(
        sheet,
        CellAddress::new(1, 1),
        CellValue::Text("Line item".into()),
    )?;
    for period in grid {
        host.write_cell(
            sheet,
            CellAddress::new(1, FIRST_PERIOD_COL + period.index),
            CellValue::Text(period.label.clone()),
        )?;
    }
    Ok(())
}

fn total_range(row: u32, periods: usize) -> CellRange {
    CellRange::row_span(row, FIRST_PERIOD_COL, FIRST_PERIOD_COL + periods as u32 - 1)
}
