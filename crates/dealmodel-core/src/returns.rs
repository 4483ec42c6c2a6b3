//! Return metrics computed over the assembled numeric cash-flow rows.
//!
//! The sheet carries `IRR(...)` formulas for the host to evaluate; this
//! module produces the same metrics engine-side so callers get numbers
//! without a spreadsheet host in the loop.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cashflow::FcfOutput;
use crate::model::ModelInput;
use crate::time_value::{self, IrrOutcome};
use crate::types::{Money, Multiple, Rate};
use crate::{ModelGenError, ModelGenResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsOutput {
    pub unlevered_irr: IrrOutcome,
    pub levered_irr: IrrOutcome,
    /// Total distributions over the initial equity outlay.
    pub moic: Multiple,
    /// NPV of the unlevered series at the input discount rate.
    pub unlevered_npv: Money,
}

/// Per-period IRRs, MOIC, and NPV over the cash-flow rows. The discount
/// rate is annual in the input and scaled to the period here.
pub fn calculate_returns(
    input: &ModelInput,
    fcf: &FcfOutput,
    irr_guess: Rate,
) -> ModelGenResult<ReturnsOutput> {
    let unlevered_irr = time_value::irr(&fcf.unlevered, irr_guess)?;
    let levered_irr = time_value::irr(&fcf.levered, irr_guess)?;

    let initial_equity = fcf.levered[0];
    if initial_equity.is_zero() {
        return Err(ModelGenError::DivisionByZero {
            context: "MOIC over a zero initial equity outlay".into(),
        });
    }
    let distributions: Decimal = fcf.levered[1..].iter().sum();
    let moic = distributions / initial_equity.abs();

    let period_rate = input.discount_rate_pct / dec!(100) / input.granularity.divisor();
    let unlevered_npv = time_value::npv(period_rate, &fcf.unlevered)?;

    debug!(
        moic = %moic,
        npv = %unlevered_npv,
        "return metrics computed"
    );
    Ok(ReturnsOutput {
        unlevered_irr,
        levered_irr,
        moic,
        unlevered_npv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::quarterly_deal;
    use pretty_assertions::assert_eq;

    fn fcf(unlevered: Vec<Decimal>, levered: Vec<Decimal>) -> FcfOutput {
        FcfOutput {
            unlevered,
            levered,
            sale_price: Decimal::ZERO,
        }
    }

    #[test]
    fn test_moic_reference_value() {
        // Distributions of 120 over an outlay of 100: MOIC 1.20
        let input = quarterly_deal();
        let flows = fcf(
            vec![dec!(-100), dec!(30), dec!(30), dec!(30), dec!(30)],
            vec![dec!(-100), dec!(30), dec!(30), dec!(30), dec!(30)],
        );
        let returns = calculate_returns(&input, &flows, dec!(0.10)).unwrap();
        assert_eq!(returns.moic, dec!(1.20));
    }

    #[test]
    fn test_irr_reference_value() {
        let input = quarterly_deal();
        let flows = fcf(
            vec![dec!(-100), dec!(30), dec!(30), dec!(30), dec!(30)],
            vec![dec!(-100), dec!(30), dec!(30), dec!(30), dec!(30)],
        );
        let returns = calculate_returns(&input, &flows, dec!(0.10)).unwrap();
        let rate = returns.levered_irr.rate().unwrap();
        assert!(rate > dec!(0.07) && rate < dec!(0.08), "got {rate}");
    }

    #[test]
    fn test_no_solution_is_reported_not_raised() {
        let input = quarterly_deal();
        let flows = fcf(
            vec![dec!(-100), dec!(-5), dec!(-5)],
            vec![dec!(-100), dec!(10), dec!(10)],
        );
        let returns = calculate_returns(&input, &flows, dec!(0.10)).unwrap();
        assert_eq!(returns.unlevered_irr, IrrOutcome::NoSolution);
        assert!(returns.levered_irr.rate().is_none() || returns.moic < Decimal::ONE);
    }

    #[test]
    fn test_zero_initial_equity_is_division_error() {
        let input = quarterly_deal();
        let flows = fcf(
            vec![dec!(-100), dec!(30)],
            vec![dec!(0), dec!(30)],
        );
        let err = calculate_returns(&input, &flows, dec!(0.10)).unwrap_err();
        assert!(matches!(err, ModelGenError::DivisionByZero { .. }));
    }

    #[test]
    fn test_npv_uses_periodised_discount_rate() {
        // 8% annual on a quarterly grid discounts at 2% per period
        let input = quarterly_deal();
        let flows = fcf(
            vec![dec!(-100), dec!(102)],
            vec![dec!(-100), dec!(102)],
        );
        let returns = calculate_returns(&input, &flows, dec!(0.10)).unwrap();
        let expected = dec!(-100) + dec!(102) / dec!(1.02);
        assert!((returns.unlevered_npv - expected).abs() < dec!(0.0001));
    }
}
