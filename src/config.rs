//! Configuration for the matching engine.
//!
//! Every field has a default, so an empty TOML document yields the standard
//! card-summary setup. Decimal settings are written as strings
//! (`tolerance = "0.01"`) to keep them exact.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::reconciliation::partition::MAX_EXACT_PARTITION_SET;
use crate::types::*;

/// Top-level matching configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Absolute tolerance for "equal" amounts
    #[serde(default = "default_tolerance")]
    pub tolerance: BigDecimal,
    /// Candidate date windows
    #[serde(default)]
    pub window: WindowConfig,
    /// Anti-greedy quota settings
    #[serde(default)]
    pub fairness: FairnessConfig,
    /// Strategy lists per category
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Cash/check bipartition settings
    #[serde(default)]
    pub partition: PartitionConfig,
    /// Extended-window retry settings
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Days after the cell date a settlement may post
    #[serde(default = "default_forward_days")]
    pub forward_days: u32,
    /// Category that settles slower and gets extra forward days
    #[serde(default = "default_premium_category")]
    pub premium_category: Option<Category>,
    #[serde(default = "default_premium_extra_days")]
    pub premium_extra_days: u32,
    /// Per-category look-back, e.g. Discover posting before the summary date
    #[serde(default)]
    pub backward: Vec<BackwardWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackwardWindow {
    pub category: Category,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessConfig {
    /// When disabled every cell's quota is `max_per_cell`
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum candidates one cell may see
    #[serde(default = "default_max_per_cell")]
    pub max_per_cell: usize,
    /// Share of the pool withheld from any single cell (0.0-1.0)
    #[serde(default = "default_reservation")]
    pub reservation: BigDecimal,
    /// Cells above this amount get one extra candidate
    #[serde(default = "default_large_cell_threshold")]
    pub large_cell_threshold: BigDecimal,
    /// Cells below this amount get one candidate fewer
    #[serde(default = "default_small_cell_threshold")]
    pub small_cell_threshold: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Strategies every category runs, in order
    #[serde(default = "default_strategies")]
    pub default: Vec<StrategyKind>,
    /// Per-category additions and removals
    #[serde(default = "default_overrides")]
    pub overrides: Vec<StrategyOverride>,
    /// Band for the amount-range strategy (0.03 = ±3%)
    #[serde(default = "default_amount_range_pct")]
    pub amount_range_pct: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOverride {
    pub category: Category,
    /// Appended after the default list
    #[serde(default)]
    pub extra: Vec<StrategyKind>,
    /// Removed from the default list before extras are appended
    #[serde(default)]
    pub excluded: Vec<StrategyKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Days after the slip date an ambiguous deposit may post (0 = same day)
    #[serde(default)]
    pub window_days: u32,
    /// Greedy fill target for the cash side (0.95 = stop at 95%)
    #[serde(default = "default_cash_fill_ratio")]
    pub cash_fill_ratio: BigDecimal,
    /// Ambiguous total must lie within [1/max_ratio, max_ratio] of the expected total
    #[serde(default = "default_max_ratio")]
    pub max_ratio: BigDecimal,
    /// Largest ambiguous set the exact bipartition will enumerate
    #[serde(default = "default_max_exact_set")]
    pub max_exact_set: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Days added to the forward window for the retry
    #[serde(default = "default_cleanup_extra_days")]
    pub extra_days: u32,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_tolerance() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

fn default_forward_days() -> u32 {
    3
}

fn default_premium_category() -> Option<Category> {
    Some(Category::Amex)
}

fn default_premium_extra_days() -> u32 {
    1
}

fn default_max_per_cell() -> usize {
    5
}

fn default_reservation() -> BigDecimal {
    BigDecimal::new(2.into(), 1)
}

fn default_large_cell_threshold() -> BigDecimal {
    BigDecimal::from(1000)
}

fn default_small_cell_threshold() -> BigDecimal {
    BigDecimal::from(100)
}

fn default_strategies() -> Vec<StrategyKind> {
    vec![StrategyKind::Exact, StrategyKind::DescriptionSum]
}

fn default_overrides() -> Vec<StrategyOverride> {
    vec![StrategyOverride {
        category: Category::Amex,
        extra: vec![StrategyKind::AmountRange],
        excluded: vec![],
    }]
}

fn default_amount_range_pct() -> BigDecimal {
    BigDecimal::new(3.into(), 2)
}

fn default_cash_fill_ratio() -> BigDecimal {
    BigDecimal::new(95.into(), 2)
}

fn default_max_ratio() -> BigDecimal {
    BigDecimal::from(2)
}

fn default_max_exact_set() -> usize {
    20
}

fn default_cleanup_extra_days() -> u32 {
    2
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            window: WindowConfig::default(),
            fairness: FairnessConfig::default(),
            pipeline: PipelineConfig::default(),
            partition: PartitionConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            forward_days: default_forward_days(),
            premium_category: default_premium_category(),
            premium_extra_days: default_premium_extra_days(),
            backward: Vec::new(),
        }
    }
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_per_cell: default_max_per_cell(),
            reservation: default_reservation(),
            large_cell_threshold: default_large_cell_threshold(),
            small_cell_threshold: default_small_cell_threshold(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default: default_strategies(),
            overrides: default_overrides(),
            amount_range_pct: default_amount_range_pct(),
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_days: 0,
            cash_fill_ratio: default_cash_fill_ratio(),
            max_ratio: default_max_ratio(),
            max_exact_set: default_max_exact_set(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_days: default_cleanup_extra_days(),
        }
    }
}

impl WindowConfig {
    /// Forward days for a category, including the premium allowance
    pub fn forward_days_for(&self, category: Category) -> u32 {
        if self.premium_category == Some(category) {
            self.forward_days + self.premium_extra_days
        } else {
            self.forward_days
        }
    }

    pub fn backward_days_for(&self, category: Category) -> u32 {
        self.backward
            .iter()
            .find(|w| w.category == category)
            .map(|w| w.days)
            .unwrap_or(0)
    }
}

impl PipelineConfig {
    /// Ordered strategy list for a category.
    ///
    /// Exclusions only trim the default list; extras are appended afterwards,
    /// so a strategy listed in both is kept.
    pub fn strategies_for(&self, category: Category) -> Vec<StrategyKind> {
        let overrides: Vec<&StrategyOverride> =
            self.overrides.iter().filter(|o| o.category == category).collect();

        let mut strategies: Vec<StrategyKind> = self
            .default
            .iter()
            .copied()
            .filter(|kind| !overrides.iter().any(|o| o.excluded.contains(kind)))
            .collect();
        for kind in overrides.iter().flat_map(|o| o.extra.iter()) {
            if !strategies.contains(kind) {
                strategies.push(*kind);
            }
        }
        strategies
    }
}

impl MatchingConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(input: &str) -> ReconResult<Self> {
        let config: MatchingConfig =
            toml::from_str(input).map_err(|e| ReconError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> ReconResult<()> {
        let zero = BigDecimal::from(0);
        let one = BigDecimal::from(1);

        if self.tolerance <= zero {
            return Err(ReconError::Config(
                "tolerance must be positive".to_string(),
            ));
        }

        if self.fairness.max_per_cell == 0 {
            return Err(ReconError::Config(
                "fairness.max_per_cell must be at least 1".to_string(),
            ));
        }

        if self.fairness.reservation < zero || self.fairness.reservation >= one {
            return Err(ReconError::Config(format!(
                "fairness.reservation must be in [0, 1), got {}",
                self.fairness.reservation
            )));
        }

        if self.fairness.small_cell_threshold > self.fairness.large_cell_threshold {
            return Err(ReconError::Config(
                "fairness.small_cell_threshold cannot exceed large_cell_threshold".to_string(),
            ));
        }

        if self.pipeline.default.is_empty() {
            return Err(ReconError::Config(
                "pipeline.default must name at least one strategy".to_string(),
            ));
        }

        if self.pipeline.amount_range_pct <= zero || self.pipeline.amount_range_pct >= one {
            return Err(ReconError::Config(format!(
                "pipeline.amount_range_pct must be in (0, 1), got {}",
                self.pipeline.amount_range_pct
            )));
        }

        for over in &self.pipeline.overrides {
            if !over.category.is_expectation() {
                return Err(ReconError::Config(format!(
                    "pipeline override for {} cannot apply: no cells carry that category",
                    over.category
                )));
            }
        }

        if self.partition.cash_fill_ratio <= zero || self.partition.cash_fill_ratio > one {
            return Err(ReconError::Config(format!(
                "partition.cash_fill_ratio must be in (0, 1], got {}",
                self.partition.cash_fill_ratio
            )));
        }

        if self.partition.max_ratio < one {
            return Err(ReconError::Config(
                "partition.max_ratio must be at least 1".to_string(),
            ));
        }

        if self.partition.max_exact_set > MAX_EXACT_PARTITION_SET {
            return Err(ReconError::Config(format!(
                "partition.max_exact_set cannot exceed {}",
                MAX_EXACT_PARTITION_SET
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = MatchingConfig::from_toml("").unwrap();
        assert_eq!(config, MatchingConfig::default());
        assert_eq!(config.tolerance, BigDecimal::from_str("0.01").unwrap());
        assert_eq!(config.fairness.max_per_cell, 5);
        assert_eq!(config.cleanup.extra_days, 2);
    }

    #[test]
    fn test_premium_category_gets_extra_forward_day() {
        let window = WindowConfig::default();
        assert_eq!(window.forward_days_for(Category::Amex), 4);
        assert_eq!(window.forward_days_for(Category::Visa), 3);
        assert_eq!(window.backward_days_for(Category::Discover), 0);
    }

    #[test]
    fn test_overrides_from_toml() {
        let config = MatchingConfig::from_toml(
            r#"
tolerance = "0.05"

[window]
forward_days = 2

[[window.backward]]
category = "Discover"
days = 3

[fairness]
max_per_cell = 3
reservation = "0.1"

[[pipeline.overrides]]
category = "Visa"
extra = ["subset_sum"]
excluded = ["description_sum"]
"#,
        )
        .unwrap();

        assert_eq!(config.tolerance, BigDecimal::from_str("0.05").unwrap());
        assert_eq!(config.window.backward_days_for(Category::Discover), 3);
        assert_eq!(config.window.forward_days_for(Category::Amex), 3);
        assert_eq!(config.fairness.max_per_cell, 3);
        assert_eq!(
            config.pipeline.strategies_for(Category::Visa),
            vec![StrategyKind::Exact, StrategyKind::SubsetSum]
        );
        // Overrides replace the defaults, so Amex loses its amount-range step
        assert_eq!(
            config.pipeline.strategies_for(Category::Amex),
            vec![StrategyKind::Exact, StrategyKind::DescriptionSum]
        );
    }

    #[test]
    fn test_default_amex_pipeline() {
        let pipeline = PipelineConfig::default();
        assert_eq!(
            pipeline.strategies_for(Category::Amex),
            vec![
                StrategyKind::Exact,
                StrategyKind::DescriptionSum,
                StrategyKind::AmountRange
            ]
        );
        assert_eq!(
            pipeline.strategies_for(Category::Cash),
            vec![StrategyKind::Exact, StrategyKind::DescriptionSum]
        );
    }

    #[test]
    fn test_extra_strategy_survives_its_own_exclusion() {
        let pipeline = PipelineConfig {
            overrides: vec![StrategyOverride {
                category: Category::Discover,
                extra: vec![StrategyKind::SubsetSum, StrategyKind::Exact],
                excluded: vec![StrategyKind::Exact, StrategyKind::SubsetSum],
            }],
            ..PipelineConfig::default()
        };
        assert_eq!(
            pipeline.strategies_for(Category::Discover),
            vec![
                StrategyKind::DescriptionSum,
                StrategyKind::SubsetSum,
                StrategyKind::Exact
            ]
        );
        assert_eq!(
            pipeline.strategies_for(Category::Visa),
            vec![StrategyKind::Exact, StrategyKind::DescriptionSum]
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = MatchingConfig::from_toml("[fairness]\nreservation = \"1.5\"").unwrap_err();
        assert!(matches!(err, ReconError::Config(_)));

        let err = MatchingConfig::from_toml("tolerance = \"0\"").unwrap_err();
        assert!(matches!(err, ReconError::Config(_)));

        let err = MatchingConfig::from_toml("[partition]\nmax_exact_set = 64").unwrap_err();
        assert!(matches!(err, ReconError::Config(_)));

        let err = MatchingConfig::from_toml("tolerance = [").unwrap_err();
        assert!(matches!(err, ReconError::Config(_)));
    }
}
