//! Deal assumption input model. A `ModelInput` is created once per
//! generation request and is read-only thereafter.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ModelGenError;
use crate::period::{count_periods, Granularity, PeriodCaps};
use crate::types::{Currency, Money, Rate};
use crate::ModelGenResult;

/// Growth behaviour of a repeatable line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Growth {
    /// Flat carry-forward: each period copies the prior period.
    #[default]
    None,
    /// Compounding at an annual rate, scaled by the period divisor.
    AnnualRate { rate_pct: Rate },
}

/// A single revenue / opex / capex line item. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Per-period base value in period 1, always entered positive.
    pub base_value: Money,
    #[serde(default)]
    pub growth: Growth,
}

/// Debt terms for the fixed-rate, interest-only facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtTerms {
    /// Issuance fee as a percentage of the loan amount (1.5 = 1.5%)
    pub issuance_fee_pct: Rate,
    /// Fixed annual interest rate in percentage points (5 = 5%)
    pub fixed_rate_pct: Rate,
}

/// The repeatable line-item categories of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemCategory {
    Revenue,
    OperatingExpense,
    CapitalExpenditure,
}

impl ItemCategory {
    /// Registry key prefix, e.g. `revenue_2_growth_rate`.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ItemCategory::Revenue => "revenue",
            ItemCategory::OperatingExpense => "opex",
            ItemCategory::CapitalExpenditure => "capex",
        }
    }

    /// Section header on the assumptions sheet.
    pub fn header(&self) -> &'static str {
        match self {
            ItemCategory::Revenue => "Revenue Items",
            ItemCategory::OperatingExpense => "Operating Expense Items",
            ItemCategory::CapitalExpenditure => "Capital Expenditure Items",
        }
    }

    /// Label of the aggregate row on the projection sheet.
    pub fn total_label(&self) -> &'static str {
        match self {
            ItemCategory::Revenue => "Total Revenue",
            ItemCategory::OperatingExpense => "Total Operating Expenses",
            ItemCategory::CapitalExpenditure => "Total CapEx",
        }
    }

    /// Sign convention on the projection sheet: expenses are stored
    /// negative so NOI is a pure addition.
    pub fn sign(&self) -> Decimal {
        match self {
            ItemCategory::OperatingExpense => dec!(-1),
            _ => Decimal::ONE,
        }
    }
}

/// The structured deal-assumption input consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInput {
    #[serde(default)]
    pub currency: Currency,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub granularity: Granularity,
    /// Gross purchase price of the deal
    pub deal_value: Money,
    /// Transaction fee as a percentage of deal value (2 = 2%)
    pub transaction_fee_pct: Rate,
    /// Loan-to-value in percentage points (60 = 60%)
    pub ltv_pct: Rate,
    /// Disposal cost as a percentage of the terminal sale price
    pub disposal_cost_pct: Rate,
    /// Terminal capitalisation rate in percentage points
    pub terminal_cap_rate_pct: Rate,
    /// Discount rate in percentage points (used for NPV reporting)
    pub discount_rate_pct: Rate,
    pub debt_terms: DebtTerms,
    #[serde(default)]
    pub revenue_items: Vec<LineItem>,
    #[serde(default)]
    pub operating_expense_items: Vec<LineItem>,
    #[serde(default)]
    pub capital_expenditure_items: Vec<LineItem>,
}

impl ModelInput {
    pub fn items(&self, category: ItemCategory) -> &[LineItem] {
        match category {
            ItemCategory::Revenue => &self.revenue_items,
            ItemCategory::OperatingExpense => &self.operating_expense_items,
            ItemCategory::CapitalExpenditure => &self.capital_expenditure_items,
        }
    }

    /// Debt amount: deal value × LTV / 100.
    pub fn debt_amount(&self) -> Money {
        self.deal_value * self.ltv_pct / dec!(100)
    }

    /// Equity amount: deal value × (1 − LTV / 100).
    pub fn equity_amount(&self) -> Money {
        self.deal_value * (Decimal::ONE - self.ltv_pct / dec!(100))
    }

    pub fn has_debt(&self) -> bool {
        self.ltv_pct > Decimal::ZERO
    }

    /// Fail-fast validation before any sheet write. Returns the
    /// operating period count on success.
    pub fn validate(&self, caps: &PeriodCaps) -> ModelGenResult<u32> {
        if self.deal_value <= Decimal::ZERO {
            return Err(invalid("deal_value", "must be positive"));
        }
        if self.end_date <= self.start_date {
            return Err(invalid("end_date", "must be after start_date"));
        }
        if self.ltv_pct < Decimal::ZERO || self.ltv_pct > dec!(100) {
            return Err(invalid("ltv_pct", "must be between 0 and 100"));
        }
        if self.terminal_cap_rate_pct <= Decimal::ZERO {
            return Err(invalid("terminal_cap_rate_pct", "must be positive"));
        }
        for (field, value) in [
            ("transaction_fee_pct", self.transaction_fee_pct),
            ("disposal_cost_pct", self.disposal_cost_pct),
            ("discount_rate_pct", self.discount_rate_pct),
            ("debt_terms.issuance_fee_pct", self.debt_terms.issuance_fee_pct),
            ("debt_terms.fixed_rate_pct", self.debt_terms.fixed_rate_pct),
        ] {
            if value < Decimal::ZERO {
                return Err(invalid(field, "must not be negative"));
            }
        }

        for category in [
            ItemCategory::Revenue,
            ItemCategory::OperatingExpense,
            ItemCategory::CapitalExpenditure,
        ] {
            for (i, item) in self.items(category).iter().enumerate() {
                if item.name.trim().is_empty() {
                    return Err(invalid(
                        &format!("{}_{}", category.key_prefix(), i + 1),
                        "line item name must not be empty",
                    ));
                }
                if item.base_value < Decimal::ZERO {
                    return Err(invalid(
                        &format!("{}_{}", category.key_prefix(), i + 1),
                        "base value must not be negative (signs are applied by the engine)",
                    ));
                }
            }
        }

        let periods = count_periods(self.start_date, self.end_date, self.granularity, caps);
        if periods == 0 {
            return Err(invalid(
                "period range",
                "model has zero operating periods; no terminal column can be assembled",
            ));
        }
        Ok(periods)
    }
}

fn invalid(field: &str, reason: &str) -> ModelGenError {
    ModelGenError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    /// A 1m deal over four quarters at 60% LTV; the worked example used
    /// throughout the stage tests.
    pub fn quarterly_deal() -> ModelInput {
        ModelInput {
            currency: Currency::USD,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            granularity: Granularity::Quarterly,
            deal_value: dec!(1000000),
            transaction_fee_pct: dec!(2),
            ltv_pct: dec!(60),
            disposal_cost_pct: dec!(1),
            terminal_cap_rate_pct: dec!(5),
            discount_rate_pct: dec!(8),
            debt_terms: DebtTerms {
                issuance_fee_pct: dec!(1),
                fixed_rate_pct: dec!(5),
            },
            revenue_items: vec![
                LineItem {
                    name: "Rental income".into(),
                    base_value: dec!(50000),
                    growth: Growth::AnnualRate { rate_pct: dec!(4) },
                },
                LineItem {
                    name: "Parking".into(),
                    base_value: dec!(5000),
                    growth: Growth::None,
                },
            ],
            operating_expense_items: vec![LineItem {
                name: "Maintenance".into(),
                base_value: dec!(10000),
                growth: Growth::AnnualRate { rate_pct: dec!(2) },
            }],
            capital_expenditure_items: vec![LineItem {
                name: "Roof works".into(),
                base_value: dec!(2000),
                growth: Growth::None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::quarterly_deal;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_input_returns_period_count() {
        let caps = PeriodCaps::default();
        // 364 days / 90 → 5 quarterly periods (ceil)
        assert_eq!(quarterly_deal().validate(&caps).unwrap(), 5);
    }

    #[test]
    fn test_missing_deal_value_fails_fast() {
        let caps = PeriodCaps::default();
        let mut input = quarterly_deal();
        input.deal_value = Decimal::ZERO;
        assert!(input.validate(&caps).is_err());
    }

    #[test]
    fn test_inverted_dates_rejected() {
        let caps = PeriodCaps::default();
        let mut input = quarterly_deal();
        input.end_date = input.start_date;
        assert!(input.validate(&caps).is_err());
    }

    #[test]
    fn test_ltv_bounds() {
        let caps = PeriodCaps::default();
        let mut input = quarterly_deal();
        input.ltv_pct = dec!(101);
        assert!(input.validate(&caps).is_err());
        input.ltv_pct = Decimal::ZERO;
        assert!(input.validate(&caps).is_ok());
    }

    #[test]
    fn test_derived_amounts() {
        let input = quarterly_deal();
        assert_eq!(input.debt_amount(), dec!(600000));
        assert_eq!(input.equity_amount(), dec!(400000));
    }

    #[test]
    fn test_growth_wire_format() {
        let json = serde_json::json!({ "kind": "annual-rate", "rate_pct": 3 });
        let growth: Growth = serde_json::from_value(json).unwrap();
        assert_eq!(growth, Growth::AnnualRate { rate_pct: dec!(3) });

        let none: Growth = serde_json::from_value(serde_json::json!({ "kind": "none" })).unwrap();
        assert_eq!(none, Growth::None);
    }
}
