//! Splitting ambiguous branch deposits between the cash and check columns

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::{
    patterns, reconcile, Category, CellKey, ExpectationCell, ExpectationTable, MatchingConfig,
    TransactionTable,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reconciliation_core=debug".parse()?))
        .init();

    println!("💵 Reconciliation Core - Deposit Slip Example\n");

    let day = NaiveDate::from_ymd_opt(2025, 3, 3).ok_or("invalid date")?;
    let expectations = ExpectationTable::new(vec![
        ExpectationCell::new(day, Category::Cash, BigDecimal::from(50)),
        ExpectationCell::new(day, Category::Check, BigDecimal::from(50)),
    ])?;

    // An exact split exists: {50} / {30, 20}
    let exact = TransactionTable::new(vec![
        patterns::ambiguous_deposit(1, day, BigDecimal::from(30))?,
        patterns::ambiguous_deposit(2, day, BigDecimal::from(20))?,
        patterns::ambiguous_deposit(3, day, BigDecimal::from(50))?,
    ])?;

    // No exact split: the largest deposits fill cash, the rest go to check
    let uneven = TransactionTable::new(vec![
        patterns::ambiguous_deposit(1, day, BigDecimal::from(45))?,
        patterns::ambiguous_deposit(2, day, BigDecimal::from(35))?,
        patterns::ambiguous_deposit(3, day, BigDecimal::from(22))?,
    ])?;

    for (label, transactions) in [("Exact", &exact), ("Uneven", &uneven)] {
        let report = reconcile(transactions, &expectations, MatchingConfig::default())?;
        println!("🧾 {} deposits:", label);
        for category in [Category::Cash, Category::Check] {
            if let Some(record) = report.match_for(&CellKey::new(day, category)) {
                let rows: Vec<String> = record.row_ids.iter().map(|id| id.to_string()).collect();
                println!(
                    "  {:<6} {:<30} rows [{}] total {} diff {}",
                    category.label(),
                    record.method.label(),
                    rows.join(", "),
                    record.actual_total,
                    record.difference
                );
            }
        }
        println!();
    }

    Ok(())
}
