//! Debt scheduler: fixed-rate, interest-only schedule with a bullet
//! repayment in the terminal period.
//!
//! Runs independently off the assumptions; the cash-flow assembler
//! consumes its single debt-service row. Column p holds period p, with
//! period 0 the closing column.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{CellAddress, CellRange};
use crate::model::ModelInput;
use crate::period::Period;
use crate::registry::CellReferenceRegistry;
use crate::types::{Money, Rate};
use crate::workbook::{CellValue, SheetHost};
use crate::ModelGenResult;

/// Period columns start at B; column B is period 0.
const FIRST_PERIOD_COL: u32 = 2;

const BALANCE_ROW: u32 = 2;
const RATE_ROW: u32 = 3;
const SERVICE_ROW: u32 = 4;

/// Per-period schedule rows, each of length P+1 (indices 0..=P).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtScheduleRows {
    pub balance: Vec<Money>,
    pub rate: Vec<Rate>,
    pub service: Vec<Money>,
}

/// A zero-LTV model produces an explicit no-debt sentinel, never an
/// omitted stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DebtSchedule {
    NoDebt,
    Schedule(DebtScheduleRows),
}

impl DebtSchedule {
    /// Debt service for period p; zero when there is no debt.
    pub fn service_at(&self, p: usize) -> Money {
        match self {
            DebtSchedule::NoDebt => Decimal::ZERO,
            DebtSchedule::Schedule(rows) => rows.service[p],
        }
    }

    pub fn has_debt(&self) -> bool {
        matches!(self, DebtSchedule::Schedule(_))
    }
}

/// Compute the schedule over operating periods 1..=P (period 0 is the
/// close): constant balance, zero terminal balance, and debt service of
/// balance×rate ordinarily plus the bullet principal in the terminal
/// period.
pub fn compute_schedule(input: &ModelInput, periods: u32) -> DebtSchedule {
    if !input.has_debt() {
        return DebtSchedule::NoDebt;
    }

    let p = periods as usize;
    let principal = input.debt_amount();
    let fixed_rate = input.debt_terms.fixed_rate_pct / dec!(100);

    let mut balance = vec![principal; p + 1];
    balance[p] = Decimal::ZERO;

    let mut rate = vec![fixed_rate; p + 1];
    rate[0] = Decimal::ZERO;

    let mut service = Vec::with_capacity(p + 1);
    for i in 0..=p {
        if i == p {
            // Terminal period: interest on the prior balance plus the
            // bullet principal repayment
            service.push(balance[i - 1] * rate[i] + balance[i - 1]);
        } else {
            service.push(balance[i] * rate[i]);
        }
    }

    DebtSchedule::Schedule(DebtScheduleRows {
        balance,
        rate,
        service,
    })
}

/// Write the schedule to the debt sheet and register the debt-service
/// row. The balance row references the registered debt-amount cell so
/// the sheet stays linked to the assumptions.
pub fn write_schedule(
    schedule: &DebtSchedule,
    grid: &[Period],
    sheet: &str,
    assumptions_sheet: &str,
    host: &mut dyn SheetHost,
    registry: &mut CellReferenceRegistry,
) -> ModelGenResult<()> {
    host.write_cell(
        sheet,
        CellAddress::new(1, 1),
        CellValue::Text("Debt Model".into()),
    )?;

    let rows = match schedule {
        DebtSchedule::NoDebt => {
            host.write_cell(
                sheet,
                CellAddress::new(2, 1),
                CellValue::Text("No debt (LTV = 0)".into()),
            )?;
            debug!(sheet, "no-debt sentinel written");
            return Ok(());
        }
        DebtSchedule::Schedule(rows) => rows,
    };

    // Header: period 0 is the close, then the operating period labels
    host.write_cell(
        sheet,
        CellAddress::new(1, FIRST_PERIOD_COL),
        CellValue::Text("Initial".into()),
    )?;
    for period in grid {
        host.write_cell(
            sheet,
            CellAddress::new(1, FIRST_PERIOD_COL + 1 + period.index),
            CellValue::Text(period.label.clone()),
        )?;
    }

    for (row, label) in [
        (BALANCE_ROW, "Outstanding Balance"),
        (RATE_ROW, "Interest Rate"),
        (SERVICE_ROW, "Debt Service"),
    ] {
        host.write_cell(sheet, CellAddress::new(row, 1), CellValue::Text(label.into()))?;
    }

    let debt_cell = registry.require("debt_amount", "DebtScheduler")?;
    let debt_qualified = debt_cell.address.qualify(assumptions_sheet);
    let last = rows.balance.len() - 1;

    for p in 0..=last {
        let col = FIRST_PERIOD_COL + p as u32;

        // Outstanding balance links back to the assumptions; the
        // terminal column is a literal zero after the bullet repayment.
        let balance_value = if p == last {
            CellValue::Number(Decimal::ZERO)
        } else {
            CellValue::Formula(format!("={debt_qualified}"))
        };
        host.write_cell(sheet, CellAddress::new(BALANCE_ROW, col), balance_value)?;

        host.write_cell(
            sheet,
            CellAddress::new(RATE_ROW, col),
            CellValue::Number(rows.rate[p]),
        )?;

        let service_value = if p == 0 {
            CellValue::Number(Decimal::ZERO)
        } else if p == last {
            let prev_balance = CellAddress::new(BALANCE_ROW, col - 1).to_a1();
            let rate = CellAddress::new(RATE_ROW, col).to_a1();
            CellValue::Formula(format!("={prev_balance}*{rate}+{prev_balance}"))
        } else {
            let balance = CellAddress::new(BALANCE_ROW, col).to_a1();
            let rate = CellAddress::new(RATE_ROW, col).to_a1();
            CellValue::Formula(format!("={balance}*{rate}"))
        };
        host.write_cell(sheet, CellAddress::new(SERVICE_ROW, col), service_value)?;
    }

    registry.record_range(
        "debt_service_row",
        sheet,
        CellRange::row_span(SERVICE_ROW, FIRST_PERIOD_COL, FIRST_PERIOD_COL + last as u32),
    );

    debug!(sheet, periods = last, "debt schedule written");
    Ok(())
}
