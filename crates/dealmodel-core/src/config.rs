//! Engine configuration: period caps, solver settings, and the sheet
//! names that constitute the workbook's de facto file format.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::period::PeriodCaps;
use crate::types::Rate;

/// Names of the generated sheets. Other tooling reads these back, so
/// they default to the layout downstream consumers depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetNames {
    pub assumptions: String,
    pub projections: String,
    pub capex: String,
    pub debt: String,
    pub fcf: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        SheetNames {
            assumptions: "Assumptions".into(),
            projections: "Projections".into(),
            capex: "CapEx".into(),
            debt: "Debt Model".into(),
            fcf: "FCF".into(),
        }
    }
}

impl SheetNames {
    pub fn all(&self) -> [&str; 5] {
        [
            &self.assumptions,
            &self.projections,
            &self.capex,
            &self.debt,
            &self.fcf,
        ]
    }
}

/// Engine-wide configuration, threaded by value into the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub period_caps: PeriodCaps,
    /// Initial guess for the IRR solver
    #[serde(default = "default_irr_guess")]
    pub irr_guess: Rate,
    #[serde(default)]
    pub sheet_names: SheetNames,
}

fn default_irr_guess() -> Decimal {
    dec!(0.10)
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            period_caps: PeriodCaps::default(),
            irr_guess: default_irr_guess(),
            sheet_names: SheetNames::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{ "irr_guess": "0.05" }"#).unwrap();
        assert_eq!(cfg.irr_guess, dec!(0.05));
        assert_eq!(cfg.sheet_names.debt, "Debt Model");
        assert_eq!(cfg.period_caps.daily, 1000);
    }
}
