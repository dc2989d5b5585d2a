//! End-to-end reconciliation of a short statement against a card summary
//! and a deposit slip
//!
//! Run with `RUST_LOG=reconciliation_core=debug` to see per-cell decisions.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::utils::{MemorySink, StrictTransactionValidator};
use reconciliation_core::{
    patterns, Category, CellOutcome, Direction, ExpectationTable, MatchingConfig,
    ReconciliationSink, Reconciler, TransactionBuilder, TransactionTable, WideRow,
};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
tolerance = "0.01"

[window]
forward_days = 3

[[window.backward]]
category = "Discover"
days = 1

[fairness]
max_per_cell = 5
reservation = "0.2"

[cleanup]
extra_days = 2
"#;

fn money(s: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(s).ok()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("reconciliation_core=info".parse()?)
                .add_directive(Level::WARN.into()),
        )
        .with_target(true)
        .init();

    println!("🏦 Reconciliation Core - Daily Reconciliation Example\n");

    let jan = |d: u32| NaiveDate::from_ymd_opt(2025, 1, d).ok_or("invalid date");

    // 1. Card summary and deposit slip, as read from the spreadsheet
    println!("📋 Loading expectations...");
    let summary = ExpectationTable::from_wide_rows(
        &["Date", "Visa", "Master Card", "Visa & MC", "Amex", "Discover", "Total"],
        &[
            WideRow::new(
                jan(6)?,
                vec![None, money("1250.40"), money("310.00"), money("1560.40"), money("845.10"), None, money("2405.50")],
            ),
            WideRow::new(
                jan(7)?,
                vec![None, money("980.00"), money("0"), money("980.00"), None, money("120.00"), money("1100.00")],
            ),
        ],
        &[],
    )?;
    let slip = ExpectationTable::from_wide_rows(
        &["Date", "Cash", "Check", "Unnamed: 3"],
        &[WideRow::new(jan(6)?, vec![None, money("400"), money("275.50"), None])],
        &[Category::Cash, Category::Check],
    )?;
    let expectations = summary.merge(slip)?;
    println!("  ✓ {} expectation cells\n", expectations.len());

    // 2. Bank statement rows, classified upstream
    println!("📄 Loading bank statement...");
    let transactions = TransactionTable::with_validator(
        vec![
            patterns::card_settlement(1, jan(7)?, Category::Visa, BigDecimal::from(800))?,
            patterns::card_settlement(2, jan(7)?, Category::Visa, BigDecimal::from_str("450.40")?)?,
            patterns::card_settlement(3, jan(8)?, Category::Mastercard, BigDecimal::from(310))?,
            patterns::card_settlement(4, jan(9)?, Category::Amex, BigDecimal::from_str("839.95")?)?,
            patterns::ambiguous_deposit(5, jan(6)?, BigDecimal::from(400))?,
            patterns::ambiguous_deposit(6, jan(6)?, BigDecimal::from_str("175.50")?)?,
            patterns::ambiguous_deposit(7, jan(6)?, BigDecimal::from(100))?,
            patterns::card_settlement(8, jan(6)?, Category::Discover, BigDecimal::from(120))?,
            patterns::card_settlement(9, jan(12)?, Category::Visa, BigDecimal::from(980))?,
            TransactionBuilder::new(10, jan(7)?, "MONTHLY SERVICE FEE")
                .amount(BigDecimal::from(-25))
                .direction(Direction::Debit)
                .build()?,
        ],
        &StrictTransactionValidator,
    )?;
    println!("  ✓ {} bank rows\n", transactions.len());

    // 3. Run the passes one at a time
    println!("🔍 Reconciling...");
    let config = MatchingConfig::from_toml(CONFIG)?;
    let mut reconciler = Reconciler::new(&transactions, &expectations, config)?;
    reconciler.run_matching_pass()?;
    println!("  ✓ Matching pass: {} matched", reconciler.matches().count());
    reconciler.run_exclusivity_pass()?;
    println!(
        "  ✓ Exclusivity pass: {} rows reserved",
        reconciler.ledger().count(reconciliation_core::ClaimKind::Exclusive)
    );
    reconciler.run_cleanup_pass()?;
    let report = reconciler.finish()?;
    println!("  ✓ Run {}\n", report.run_id);

    // 4. Per-cell outcome
    println!("📊 Cell outcomes:");
    for key in expectations.keys() {
        match report.outcome(key) {
            Some(CellOutcome::Matched(record)) => println!(
                "  ✅ {:<22} {:>10} via {:<28} diff {}",
                key.to_string(),
                record.expected_amount,
                record.method.label(),
                record.difference
            ),
            Some(CellOutcome::Unmatched(record)) => println!(
                "  ❌ {:<22} {:>10} found {:>10} ({:?}): {}",
                key.to_string(),
                record.expected_amount,
                record.found_total,
                record.coverage(),
                record.reason
            ),
            None => println!("  ⚠️  {} has no outcome", key),
        }
    }
    println!();

    // 5. Net discrepancy per category
    println!("📈 Net discrepancies:");
    for entry in &report.discrepancies.categories {
        println!(
            "  {:<14} net {:>10} (leftover rows: {})",
            entry.category.label(),
            entry.net,
            entry.leftover_rows.len()
        );
    }
    println!("  Total net: {}\n", report.discrepancies.net_total());

    // 6. Hand the results to a sink
    let handle = MemorySink::new();
    let mut sink = handle.clone();
    sink.publish_report(&report).await?;
    let summary = report.summary();
    println!(
        "💾 Published {} matches and {} unmatched cells",
        handle.matches()?.len(),
        handle.unmatched()?.len()
    );
    for method in &summary.by_method {
        println!("  {:<30} {}", method.method, method.count);
    }

    Ok(())
}
