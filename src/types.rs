//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one bank statement row, the unit of allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Classification shared by bank transactions and expectation cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Visa,
    Mastercard,
    DebitVisa,
    DebitMaster,
    Discover,
    Amex,
    OtherCards,
    /// Cash column of the deposit slip
    Cash,
    /// Check column of the deposit slip
    Check,
    /// Deposit whose description does not say whether it is cash or check
    CashOrCheck,
    /// Description matched no known pattern; never allocated
    Unknown,
}

impl Category {
    /// Card brands that appear as card summary columns
    pub const CARDS: [Category; 7] = [
        Category::Visa,
        Category::Mastercard,
        Category::DebitVisa,
        Category::DebitMaster,
        Category::Discover,
        Category::Amex,
        Category::OtherCards,
    ];

    /// Parse a column header or classifier label.
    ///
    /// Matching ignores case and repeated whitespace so that summary headers
    /// like `"Master Card"` and `"MASTERCARD"` resolve to the same category.
    pub fn from_label(label: &str) -> Option<Category> {
        let normalized = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let category = match normalized.as_str() {
            "visa" => Category::Visa,
            "master card" | "mastercard" | "mc" => Category::Mastercard,
            "debit visa" => Category::DebitVisa,
            "debit master" | "debit mastercard" => Category::DebitMaster,
            "discover" => Category::Discover,
            "amex" | "american express" => Category::Amex,
            "other cards" | "other" => Category::OtherCards,
            "cash" => Category::Cash,
            "check" | "cheque" => Category::Check,
            "cash/check" | "cash or check" => Category::CashOrCheck,
            "unknown" => Category::Unknown,
            _ => return None,
        };
        Some(category)
    }

    /// Human-readable label, matching the summary column spelling
    pub fn label(&self) -> &'static str {
        match self {
            Category::Visa => "Visa",
            Category::Mastercard => "Master Card",
            Category::DebitVisa => "Debit Visa",
            Category::DebitMaster => "Debit Master",
            Category::Discover => "Discover",
            Category::Amex => "Amex",
            Category::OtherCards => "Other Cards",
            Category::Cash => "Cash",
            Category::Check => "Check",
            Category::CashOrCheck => "Cash/Check",
            Category::Unknown => "Unknown",
        }
    }

    pub fn is_card(&self) -> bool {
        Self::CARDS.contains(self)
    }

    /// Cash or Check, the two deposit slip columns
    pub fn is_deposit(&self) -> bool {
        matches!(self, Category::Cash | Category::Check)
    }

    /// Whether an expectation cell may carry this category
    pub fn is_expectation(&self) -> bool {
        self.is_card() || self.is_deposit()
    }

    /// Whether a transaction of this category can satisfy a cell of `target`
    pub fn satisfies(&self, target: Category) -> bool {
        match self {
            Category::Unknown => false,
            Category::CashOrCheck => target.is_deposit(),
            own => *own == target,
        }
    }

    /// Directions a cell of this category will accept.
    ///
    /// Card settlements arrive as credits or pre-authorized debits, deposits
    /// only as credits.
    pub fn accepts(&self, direction: Direction) -> bool {
        if self.is_deposit() {
            direction == Direction::Credit
        } else {
            direction.is_inflow()
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bank statement transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Money credited to the account
    Credit,
    /// Money debited from the account
    Debit,
    /// Pre-authorized debit; nets fees against a settlement
    Bpad,
}

impl Direction {
    /// Parse the bank statement transaction type column
    pub fn from_label(label: &str) -> Option<Direction> {
        match label.trim().to_uppercase().as_str() {
            "CREDIT" | "CR" => Some(Direction::Credit),
            "DEBIT" | "DR" => Some(Direction::Debit),
            "BPAD" => Some(Direction::Bpad),
            _ => None,
        }
    }

    /// Credits and pre-authorized debits count as inflow
    pub fn is_inflow(&self) -> bool {
        matches!(self, Direction::Credit | Direction::Bpad)
    }
}

/// One bank statement row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable row identifier assigned at ingestion
    pub row_id: RowId,
    /// Posting date
    pub date: NaiveDate,
    /// Normalized description
    pub description: String,
    /// Signed amount
    pub amount: BigDecimal,
    /// Transaction type
    pub direction: Direction,
    /// Category derived from the description
    pub category: Category,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        row_id: RowId,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
        direction: Direction,
        category: Category,
    ) -> Self {
        Self {
            row_id,
            date,
            description,
            amount,
            direction,
            category,
        }
    }

    /// Inflow with a known category, i.e. part of the shared matching pool
    pub fn is_poolable(&self) -> bool {
        self.direction.is_inflow() && self.category != Category::Unknown
    }
}

/// Identity of an expectation cell: one (date, category) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub date: NaiveDate,
    pub category: Category,
}

impl CellKey {
    pub fn new(date: NaiveDate, category: Category) -> Self {
        Self { date, category }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.category)
    }
}

/// Expected amount for one (date, category) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationCell {
    pub date: NaiveDate,
    pub category: Category,
    pub expected_amount: BigDecimal,
}

impl ExpectationCell {
    /// Create a new expectation cell
    pub fn new(date: NaiveDate, category: Category, expected_amount: BigDecimal) -> Self {
        Self {
            date,
            category,
            expected_amount,
        }
    }

    pub fn key(&self) -> CellKey {
        CellKey::new(self.date, self.category)
    }
}

/// Matching strategies available to the per-cell pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Every candidate within tolerance of the expected amount, as one group
    Exact,
    /// Whole or partial sums of candidates sharing a description
    DescriptionSum,
    /// Combinations of two or three of the largest candidates
    SubsetSum,
    /// Closest single candidate within a percentage band
    AmountRange,
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Exact => "exact",
            StrategyKind::DescriptionSum => "sum_by_description",
            StrategyKind::SubsetSum => "subset_sum",
            StrategyKind::AmountRange => "amount_range",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How an ambiguous cash/check set was split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    /// Both sides hit their expected amounts within tolerance
    Exact,
    /// Greedy fill of the cash side, remainder to check
    Proportional,
}

/// Which pass produced a match, and with which strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "pass", content = "strategy")]
pub enum MatchMethod {
    Pipeline(StrategyKind),
    Partition(PartitionKind),
    Cleanup(StrategyKind),
}

impl MatchMethod {
    /// Label used by reporting, e.g. `exact` or `cleanup_sum_by_description`
    pub fn label(&self) -> String {
        match self {
            MatchMethod::Pipeline(kind) => kind.label().to_string(),
            MatchMethod::Partition(PartitionKind::Exact) => "cash_check_exact_split".to_string(),
            MatchMethod::Partition(PartitionKind::Proportional) => {
                "cash_check_proportional_split".to_string()
            }
            MatchMethod::Cleanup(kind) => format!("cleanup_{}", kind.label()),
        }
    }
}

/// A cell satisfied by a set of bank rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub cell: CellKey,
    pub expected_amount: BigDecimal,
    pub method: MatchMethod,
    /// Rows consumed by this match
    pub row_ids: Vec<RowId>,
    pub actual_total: BigDecimal,
    /// `actual_total - expected_amount`
    pub difference: BigDecimal,
}

impl MatchRecord {
    /// Create a match record; the difference is derived from the totals
    pub fn new(
        cell: CellKey,
        expected_amount: BigDecimal,
        method: MatchMethod,
        row_ids: Vec<RowId>,
        actual_total: BigDecimal,
    ) -> Self {
        let difference = &actual_total - &expected_amount;
        Self {
            cell,
            expected_amount,
            method,
            row_ids,
            actual_total,
            difference,
        }
    }
}

/// Why a cell ended a pass without a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// The selector found no unclaimed rows in the cell's window
    NoCandidateTransactions,
    /// Candidates existed but no strategy accepted them
    NoStrategyMatch { tried: Vec<StrategyKind> },
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedReason::NoCandidateTransactions => {
                f.write_str("No transactions found for category in date range")
            }
            UnmatchedReason::NoStrategyMatch { tried } => {
                let names: Vec<&str> = tried.iter().map(|k| k.label()).collect();
                write!(f, "No match found after trying: {}", names.join(", "))
            }
        }
    }
}

/// How the exclusively allocated rows compare to the expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coverage {
    NothingFound,
    Insufficient,
    Excess,
    /// Found total equals the expectation but no strategy could use it
    Even,
}

/// A cell with no match and the rows exclusively allocated to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedRecord {
    pub cell: CellKey,
    pub expected_amount: BigDecimal,
    /// Rows allocated to this cell alone, for discrepancy accounting only
    pub row_ids: Vec<RowId>,
    pub found_total: BigDecimal,
    pub reason: UnmatchedReason,
}

impl UnmatchedRecord {
    /// `found_total - expected_amount`
    pub fn difference(&self) -> BigDecimal {
        &self.found_total - &self.expected_amount
    }

    pub fn coverage(&self) -> Coverage {
        if self.row_ids.is_empty() {
            return Coverage::NothingFound;
        }
        match self.found_total.cmp(&self.expected_amount) {
            std::cmp::Ordering::Less => Coverage::Insufficient,
            std::cmp::Ordering::Greater => Coverage::Excess,
            std::cmp::Ordering::Equal => Coverage::Even,
        }
    }
}

/// Passes of one reconciliation run, in the only order they may execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RunPhase {
    Ready,
    Matched,
    Allocated,
    CleanedUp,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Ready => "ready",
            RunPhase::Matched => "matched",
            RunPhase::Allocated => "allocated",
            RunPhase::CleanedUp => "cleaned up",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while reconciling
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Missing expected column: {0}")]
    MissingExpectedColumn(String),
    #[error("Unknown category label: {0}")]
    UnknownCategory(String),
    #[error("Duplicate row id: {0}")]
    DuplicateRowId(RowId),
    #[error("Duplicate expectation cell: {0}")]
    DuplicateCell(CellKey),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Pass out of order: expected phase {expected}, found {found}")]
    PassOrder { expected: RunPhase, found: RunPhase },
    #[error("Sink error: {0}")]
    Sink(String),
    #[error("Row {row_id} is already claimed by {holder}; {claimant} cannot claim it")]
    AllocationConflict {
        row_id: RowId,
        holder: CellKey,
        claimant: CellKey,
    },
    #[error("Cell {0} finished the run without an outcome")]
    MissingOutcome(CellKey),
    #[error("Ledger claims for {0} disagree with its recorded rows")]
    LedgerMismatch(CellKey),
    #[error("No candidate transactions for {0}")]
    NoCandidateTransactions(CellKey),
    #[error("No strategy matched {cell}")]
    NoStrategyMatch {
        cell: CellKey,
        tried: Vec<StrategyKind>,
    },
    #[error(
        "Ambiguous deposits on {date} total {ambiguous_total}, too far from expected {expected_total}"
    )]
    AmbiguousPartitionInfeasible {
        date: NaiveDate,
        ambiguous_total: BigDecimal,
        expected_total: BigDecimal,
    },
}

impl ReconError {
    /// Errors that end a cell unmatched rather than aborting the run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReconError::NoCandidateTransactions(_)
                | ReconError::NoStrategyMatch { .. }
                | ReconError::AmbiguousPartitionInfeasible { .. }
        )
    }

    /// Convert a per-cell matching failure into the reason recorded on the
    /// cell; any other error is handed back for propagation.
    pub fn into_unmatched_reason(self) -> Result<UnmatchedReason, ReconError> {
        match self {
            ReconError::NoCandidateTransactions(_) => Ok(UnmatchedReason::NoCandidateTransactions),
            ReconError::NoStrategyMatch { tried, .. } => Ok(UnmatchedReason::NoStrategyMatch { tried }),
            other => Err(other),
        }
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
