use chrono::NaiveDate;
use clap::Args;
use serde_json::{json, Value};

use dealmodel_core::period::{build_grid, count_periods, Granularity, PeriodCaps};

/// Arguments for period counting
#[derive(Args)]
pub struct PeriodsArgs {
    /// Range start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// Range end date (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// Period granularity: daily, monthly, quarterly, or yearly
    #[arg(long, default_value = "monthly")]
    pub granularity: String,
}

pub fn run_periods(args: PeriodsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = parse_date(&args.start)?;
    let end = parse_date(&args.end)?;
    let granularity = parse_granularity(&args.granularity)?;

    let caps = PeriodCaps::default();
    let count = count_periods(start, end, granularity, &caps);
    let grid = build_grid(start, count, granularity)?;
    let labels: Vec<&str> = grid.iter().map(|p| p.label.as_str()).collect();

    Ok(json!({
        "periods": count,
        "granularity": granularity.as_str(),
        "labels": labels,
    }))
}

fn parse_date(s: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': {}", s, e).into())
}

fn parse_granularity(s: &str) -> Result<Granularity, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "daily" => Ok(Granularity::Daily),
        "monthly" => Ok(Granularity::Monthly),
        "quarterly" => Ok(Granularity::Quarterly),
        "yearly" | "annual" => Ok(Granularity::Yearly),
        other => Err(format!(
            "Unknown granularity '{}': expected daily, monthly, quarterly, or yearly",
            other
        )
        .into()),
    }
}
