//! Rate-of-return math over period-indexed cash-flow series.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ModelGenError;
use crate::types::{Money, Rate};
use crate::ModelGenResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Result of an IRR solve. A series with no real solution is an
/// expected state, reported as a sentinel rather than a failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "rate", rename_all = "kebab-case")]
pub enum IrrOutcome {
    Converged(Rate),
    NoSolution,
}

impl IrrOutcome {
    pub fn rate(&self) -> Option<Rate> {
        match self {
            IrrOutcome::Converged(r) => Some(*r),
            IrrOutcome::NoSolution => None,
        }
    }
}

/// Net Present Value of a series of cash flows at a per-period rate.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> ModelGenResult<Money> {
    if rate <= dec!(-1) {
        return Err(ModelGenError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        if discount.is_zero() {
            return Err(ModelGenError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result += cf / discount;
    }

    Ok(result)
}

/// Internal Rate of Return using Newton-Raphson. Returns
/// [`IrrOutcome::NoSolution`] when the solver fails to converge or the
/// series cannot support a solution at all.
pub fn irr(cash_flows: &[Money], guess: Rate) -> ModelGenResult<IrrOutcome> {
    if cash_flows.len() < 2 {
        return Err(ModelGenError::InvalidInput {
            field: "cash_flows".into(),
            reason: "IRR requires at least 2 cash flows".into(),
        });
    }

    // A series that never changes sign has no IRR; skip the solver.
    let has_negative = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    let has_positive = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    if !has_negative || !has_positive {
        return Ok(IrrOutcome::NoSolution);
    }

    let mut rate = guess;

    for _ in 0..MAX_IRR_ITERATIONS {
        let mut npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let one_plus_r = Decimal::ONE + rate;

        for (t, cf) in cash_flows.iter().enumerate() {
            let t_dec = Decimal::from(t as i64);
            let discount = one_plus_r.powd(t_dec);
            if discount.is_zero() {
                continue;
            }
            npv_val += cf / discount;
            if t > 0 {
                dnpv -= t_dec * cf / (one_plus_r.powd(t_dec + Decimal::ONE));
            }
        }

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(IrrOutcome::Converged(rate));
        }

        if dnpv.is_zero() {
            return Ok(IrrOutcome::NoSolution);
        }

        rate -= npv_val / dnpv;

        // Guard against divergence
        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    Ok(IrrOutcome::NoSolution)
}
