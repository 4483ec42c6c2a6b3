//! Free-cash-flow assembler: merges operating cash flow, capital
//! outflows, terminal sale proceeds, and levered adjustments into
//! period-indexed rows on the FCF sheet.
//!
//! Column B is period 0, the pre-operating initial-investment column;
//! operating periods follow. Source rows resolve through the registry,
//! falling back to structure discovery over committed sheet content
//! when the registry from the original run is gone.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::address::{CellAddress, CellRange};
use crate::config::SheetNames;
use crate::debt::DebtSchedule;
use crate::discovery::{self, StructureMarker};
use crate::model::ModelInput;
use crate::period::{period_serial, Period};
use crate::projection::ProjectionFigures;
use crate::registry::CellReferenceRegistry;
use crate::types::Money;
use crate::workbook::{CellValue, SheetHost};
use crate::{ModelGenError, ModelGenResult};

const DATE_ROW: u32 = 2;
const PURCHASE_ROW: u32 = 3;
const TRANSACTION_ROW: u32 = 4;
const NOI_ROW: u32 = 5;
const CAPEX_ROW: u32 = 6;
const SALE_ROW: u32 = 7;
const DISPOSAL_ROW: u32 = 8;
const UNLEVERED_ROW: u32 = 9;
const DEBT_UPFRONT_ROW: u32 = 10;
const DEBT_EXPENSE_ROW: u32 = 11;
const LOAN_ROW: u32 = 12;
const LEVERED_ROW: u32 = 13;
const UNLEVERED_IRR_ROW: u32 = 15;
const LEVERED_IRR_ROW: u32 = 16;
const MOIC_ROW: u32 = 17;

/// Column of period p: B holds period 0.
fn period_col(p: usize) -> u32 {
    2 + p as u32
}

/// Numeric cash-flow rows, indices 0..=P. Equity distributions are the
/// levered row: the initial equity outlay is implicit in its negative
/// period-0 value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcfOutput {
    pub unlevered: Vec<Money>,
    pub levered: Vec<Money>,
    pub sale_price: Money,
}

/// Assemble the FCF sheet and the numeric cash-flow rows.
///
/// `figures` carries the projection stage's numeric series within a
/// generation run; pass `None` in a fresh session to recover them from
/// committed sheet content instead.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    input: &ModelInput,
    grid: &[Period],
    figures: Option<&ProjectionFigures>,
    schedule: &DebtSchedule,
    names: &SheetNames,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
    warnings: &mut Vec<String>,
) -> ModelGenResult<FcfOutput> {
    let periods = grid.len();
    if periods == 0 {
        return Err(ModelGenError::InvalidInput {
            field: "period range".into(),
            reason: "cannot assemble cash flows without a terminal column".into(),
        });
    }
    let sheet = names.fcf.as_str();
    let last_col = period_col(periods);

    // Source rows for NOI and CapEx: registry first, then discovery.
    let (noi_sheet, noi_range) = resolve_row(
        registry,
        host,
        "noi_row",
        &names.projections,
        StructureMarker::Noi,
        warnings,
    )?;
    let (capex_sheet, capex_range) = resolve_row(
        registry,
        host,
        "capex_total_row",
        &names.capex,
        StructureMarker::TotalCapex,
        warnings,
    )?;

    let (noi, capex_total) = match figures {
        Some(f) => (f.noi.clone(), f.capex_total.clone()),
        None => (
            read_numeric_row(host, &noi_sheet, noi_range, periods)?,
            read_numeric_row(host, &capex_sheet, capex_range, periods)?,
        ),
    };

    // Scalar terms: registered assumption cells when available, the
    // input's literal values otherwise.
    let deal = scalar_term(registry, "deal_value", input.deal_value, warnings);
    let fee = scalar_term(registry, "transaction_fee", input.transaction_fee_pct, warnings);
    let cap_rate = scalar_term(
        registry,
        "terminal_cap_rate",
        input.terminal_cap_rate_pct,
        warnings,
    );
    let disposal_pct = scalar_term(registry, "disposal_cost", input.disposal_cost_pct, warnings);
    let debt_amount = scalar_term(registry, "debt_amount", input.debt_amount(), warnings);
    let issuance_fee = scalar_term(
        registry,
        "debt_issuance_fee",
        input.debt_terms.issuance_fee_pct,
        warnings,
    );

    write_header(grid, sheet, input, host)?;

    // --- Unlevered rows -------------------------------------------------

    let mut purchase = vec![Decimal::ZERO; periods + 1];
    purchase[0] = -input.deal_value;
    write_sparse_row(
        host,
        sheet,
        PURCHASE_ROW,
        "Purchase Price",
        periods,
        |p| (p == 0).then(|| CellValue::Formula(format!("=-{deal}"))),
    )?;

    let mut transaction = vec![Decimal::ZERO; periods + 1];
    transaction[0] = -input.deal_value * input.transaction_fee_pct / dec!(100);
    write_sparse_row(
        host,
        sheet,
        TRANSACTION_ROW,
        "Transaction Costs",
        periods,
        |p| (p == 0).then(|| CellValue::Formula(format!("=-{deal}*{fee}/100"))),
    )?;

    let mut noi_cells = vec![Decimal::ZERO; periods + 1];
    for p in 1..=periods {
        noi_cells[p] = noi[p - 1];
    }
    write_sparse_row(host, sheet, NOI_ROW, "NOI", periods, |p| {
        (p >= 1).then(|| {
            let source = CellAddress::new(noi_range.start.row, noi_range.start.col + p as u32 - 1);
            CellValue::Formula(format!("={}", source.qualify(&noi_sheet)))
        })
    })?;

    let mut capex_cells = vec![Decimal::ZERO; periods + 1];
    for p in 1..=periods {
        capex_cells[p] = -capex_total[p - 1];
    }
    write_sparse_row(host, sheet, CAPEX_ROW, "CapEx", periods, |p| {
        (p >= 1).then(|| {
            let source =
                CellAddress::new(capex_range.start.row, capex_range.start.col + p as u32 - 1);
            CellValue::Formula(format!("=-{}", source.qualify(&capex_sheet)))
        })
    })?;

    let terminal_noi = noi[periods - 1];
    let sale_price = terminal_noi / (input.terminal_cap_rate_pct / dec!(100));
    let mut sale = vec![Decimal::ZERO; periods + 1];
    sale[periods] = sale_price;
    let terminal_noi_source =
        CellAddress::new(noi_range.start.row, noi_range.start.col + periods as u32 - 1)
            .qualify(&noi_sheet);
    write_sparse_row(host, sheet, SALE_ROW, "Sale Price", periods, |p| {
        (p == periods).then(|| {
            CellValue::Formula(format!("={terminal_noi_source}/({cap_rate}/100)"))
        })
    })?;

    let mut disposal = vec![Decimal::ZERO; periods + 1];
    disposal[periods] = -sale_price * input.disposal_cost_pct / dec!(100);
    let sale_cell = CellAddress::new(SALE_ROW, last_col).to_a1();
    write_sparse_row(host, sheet, DISPOSAL_ROW, "Disposal Costs", periods, |p| {
        (p == periods).then(|| {
            CellValue::Formula(format!("=-{sale_cell}*{disposal_pct}/100"))
        })
    })?;

    let mut unlevered = Vec::with_capacity(periods + 1);
    host.write_cell(
        sheet,
        CellAddress::new(UNLEVERED_ROW, 1),
        CellValue::Text("Unlevered Cashflows".into()),
    )?;
    for p in 0..=periods {
        let col = period_col(p);
        let span = CellRange {
            start: CellAddress::new(PURCHASE_ROW, col),
            end: CellAddress::new(DISPOSAL_ROW, col),
        };
        host.write_cell(
            sheet,
            CellAddress::new(UNLEVERED_ROW, col),
            CellValue::Formula(format!("=SUM({})", span.to_a1())),
        )?;
        unlevered.push(
            purchase[p] + transaction[p] + noi_cells[p] + capex_cells[p] + sale[p] + disposal[p],
        );
    }

    // --- Levered adjustments --------------------------------------------

    let has_debt = schedule.has_debt();
    let debt_value = input.debt_amount();

    let mut debt_upfront = vec![Decimal::ZERO; periods + 1];
    if has_debt {
        debt_upfront[0] = -debt_value * input.debt_terms.issuance_fee_pct / dec!(100);
    }
    write_sparse_row(host, sheet, DEBT_UPFRONT_ROW, "Debt Upfront Cost", periods, |p| {
        (p == 0 && has_debt)
            .then(|| CellValue::Formula(format!("=-{debt_amount}*{issuance_fee}/100")))
    })?;

    let mut debt_expense = vec![Decimal::ZERO; periods + 1];
    for p in 1..=periods {
        debt_expense[p] = -schedule.service_at(p);
    }
    let service_ref = registry.lookup("debt_service_row").cloned();
    if has_debt && service_ref.is_none() {
        warn!("debt service row not registered; writing literal values");
        warnings.push(
            "debt service row not registered; FCF debt expense written as literal values".into(),
        );
    }
    write_sparse_row(host, sheet, DEBT_EXPENSE_ROW, "Debt Expense", periods, |p| {
        if p == 0 || !has_debt {
            return None;
        }
        Some(match &service_ref {
            Some(re) => {
                let source =
                    CellAddress::new(re.address.row, re.address.col + p as u32);
                CellValue::Formula(format!("=-{}", source.qualify(&re.sheet)))
            }
            None => CellValue::Number(-schedule.service_at(p)),
        })
    })?;

    let mut loan = vec![Decimal::ZERO; periods + 1];
    if has_debt {
        loan[1] = debt_value;
    }
    write_sparse_row(host, sheet, LOAN_ROW, "Loan Proceeds", periods, |p| {
        (p == 1 && has_debt).then(|| CellValue::Formula(format!("={debt_amount}")))
    })?;

    let mut levered = Vec::with_capacity(periods + 1);
    host.write_cell(
        sheet,
        CellAddress::new(LEVERED_ROW, 1),
        CellValue::Text("Levered Cashflows".into()),
    )?;
    for p in 0..=periods {
        let col = period_col(p);
        let c = |row: u32| CellAddress::new(row, col).to_a1();
        host.write_cell(
            sheet,
            CellAddress::new(LEVERED_ROW, col),
            CellValue::Formula(format!(
                "={}+{}+{}+{}",
                c(UNLEVERED_ROW),
                c(DEBT_UPFRONT_ROW),
                c(DEBT_EXPENSE_ROW),
                c(LOAN_ROW)
            )),
        )?;
        levered.push(unlevered[p] + debt_upfront[p] + debt_expense[p] + loan[p]);
    }

    let unlevered_range = CellRange::row_span(UNLEVERED_ROW, 2, last_col);
    let levered_range = CellRange::row_span(LEVERED_ROW, 2, last_col);
    registry.record_range("unlevered_cashflows_row", sheet, unlevered_range);
    registry.record_range("levered_cashflows_row", sheet, levered_range);

    write_metric_rows(host, sheet, unlevered_range, levered_range, periods)?;

    debug!(sheet, periods, has_debt, "cash flows assembled");
    Ok(FcfOutput {
        unlevered,
        levered,
        sale_price,
    })
}

/// Resolve an aggregate source row: registered range first, structure
/// discovery over committed content second, named error last — never a
/// guessed row.
fn resolve_row(
    registry: &CellReferenceRegistry,
    host: &dyn SheetHost,
    key: &str,
    sheet: &str,
    marker: StructureMarker,
    warnings: &mut Vec<String>,
) -> ModelGenResult<(String, CellRange)> {
    if let Some(re) = registry.lookup(key) {
        if let Some(range) = re.range {
            return Ok((re.sheet.clone(), range));
        }
    }

    let structure = discovery::discover(host, sheet)?;
    if let Some(found) = structure.get(marker) {
        warn!(key, sheet, row = found.row, "row recovered via structure discovery");
        warnings.push(format!(
            "'{key}' was not registered; recovered row {} on '{sheet}' via structure discovery",
            found.row
        ));
        return Ok((sheet.to_string(), found.range));
    }

    Err(ModelGenError::MissingReference {
        key: key.to_string(),
        stage: "FreeCashFlowAssembler".into(),
    })
}

/// Read numeric period values from a committed row. Only meaningful
/// against a host that returns evaluated values (a reopened workbook).
fn read_numeric_row(
    host: &dyn SheetHost,
    sheet: &str,
    range: CellRange,
    periods: usize,
) -> ModelGenResult<Vec<Decimal>> {
    let grid = host.read_used_range(sheet)?;
    let row_idx = (range.start.row - 1) as usize;
    let row = grid.get(row_idx).ok_or_else(|| ModelGenError::SheetError {
        sheet: sheet.to_string(),
        reason: format!("row {} is outside the used range", range.start.row),
    })?;

    let mut values = Vec::with_capacity(periods);
    for col in range.start.col..=range.end.col {
        let cell = row.get((col - 1) as usize);
        match cell.and_then(|c| c.as_number()) {
            Some(n) => values.push(n),
            None => {
                return Err(ModelGenError::SheetError {
                    sheet: sheet.to_string(),
                    reason: format!(
                        "cell {} holds non-numeric content; cannot recover figures",
                        CellAddress::new(range.start.row, col).to_a1()
                    ),
                })
            }
        }
    }

    if values.len() != periods {
        return Err(ModelGenError::SheetError {
            sheet: sheet.to_string(),
            reason: format!(
                "recovered row spans {} periods but the model has {}",
                values.len(),
                periods
            ),
        });
    }
    Ok(values)
}

/// Registered assumption cell when available; the literal input value as
/// a degraded fallback otherwise.
fn scalar_term(
    registry: &CellReferenceRegistry,
    key: &str,
    literal: Decimal,
    warnings: &mut Vec<String>,
) -> String {
    match registry.lookup(key) {
        Some(re) => re.qualified(),
        None => {
            warnings.push(format!(
                "'{key}' was not registered; FCF formulas use the literal input value"
            ));
            literal.to_string()
        }
    }
}

fn write_header(
    grid: &[Period],
    sheet: &str,
    input: &ModelInput,
    host: &mut dyn SheetHost,
) -> ModelGenResult<()> {
    host.write_cell(
        sheet,
        CellAddress::new(1, 1),
        CellValue::Text("Free Cash Flow".into()),
    )?;
    host.write_cell(
        sheet,
        CellAddress::new(1, 2),
        CellValue::Text("Initial".into()),
    )?;
    for period in grid {
        host.write_cell(
            sheet,
            CellAddress::new(1, period_col(period.index as usize + 1)),
            CellValue::Text(period.label.clone()),
        )?;
    }

    // Serial-date row for date-aware downstream formulas
    host.write_cell(
        sheet,
        CellAddress::new(DATE_ROW, 1),
        CellValue::Text("Date".into()),
    )?;
    for p in 0..=grid.len() {
        let serial = period_serial(input.start_date, p as u32, input.granularity)?;
        host.write_cell(
            sheet,
            CellAddress::new(DATE_ROW, period_col(p)),
            CellValue::Number(Decimal::from(serial)),
        )?;
    }
    Ok(())
}

/// Write a labelled row where only some period columns carry content;
/// the rest hold a literal 0.
fn write_sparse_row<F>(
    host: &mut dyn SheetHost,
    sheet: &str,
    row: u32,
    label: &str,
    periods: usize,
    mut content: F,
) -> ModelGenResult<()>
where
    F: FnMut(usize) -> Option<CellValue>,
{
    host.write_cell(
        sheet,
        CellAddress::new(row, 1),
        CellValue::Text(label.to_string()),
    )?;
    for p in 0..=periods {
        let value = content(p).unwrap_or(CellValue::Number(Decimal::ZERO));
        host.write_cell(sheet, CellAddress::new(row, period_col(p)), value)?;
    }
    Ok(())
}

/// Summary metric rows as formulas over the registered cash-flow rows;
/// the host evaluates these, the engine never does.
fn write_metric_rows(
    host: &mut dyn SheetHost,
    sheet: &str,
    unlevered: CellRange,
    levered: CellRange,
    periods: usize,
) -> ModelGenResult<()> {
    let first_distribution = CellAddress::new(LEVERED_ROW, 3);
    let last = CellAddress::new(LEVERED_ROW, period_col(periods));
    let initial = CellAddress::new(LEVERED_ROW, 2);

    for (row, label, formula) in [
        (
            UNLEVERED_IRR_ROW,
            "Unlevered IRR",
            format!("=IRR({})", unlevered.to_a1()),
        ),
        (
            LEVERED_IRR_ROW,
            "Levered IRR",
            format!("=IRR({})", levered.to_a1()),
        ),
        (
            MOIC_ROW,
            "MOIC",
            format!(
                "=SUM({}:{})/ABS({})",
                first_distribution.to_a1(),
                last.to_a1(),
                initial.to_a1()
            ),
        ),
    ] {
        host.write_cell(sheet, CellAddress::new(row, 1), CellValue::Text(label.into()))?;
        host.write_cell(sheet, CellAddress::new(row, 2), CellValue::Formula(formula))?;
    }
    Ok(())
}
