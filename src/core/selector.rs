//! Region inclusion thresholds.

use crate::core::config::ThresholdConfig;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub min_reads: u64,
    /// Percentage of all aligned reads, 0-100
    pub min_percentage: f64,
}

impl From<&ThresholdConfig> for Thresholds {
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            min_reads: config.min_reads_to_use_region,
            min_percentage: config.min_perc_reads_to_use_region,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&ThresholdConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exclusion {
    TooFewReads { required: u64 },
    BelowPercentage { required: f64 },
    /// Empty containers are never analyzed, whatever the thresholds
    NoReads,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::TooFewReads { required } => {
                write!(f, "fewer than {} reads", required)
            }
            Exclusion::BelowPercentage { required } => {
                write!(f, "below {}% of aligned reads", required)
            }
            Exclusion::NoReads => write!(f, "no reads"),
        }
    }
}

/// Inclusion decision for one region together with the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionDecision {
    pub region: String,
    pub reads: u64,
    pub percentage: f64,
    pub included: bool,
    pub exclusion: Option<Exclusion>,
}

/// Applies the thresholds against one run-wide denominator.
#[derive(Debug, Clone, Copy)]
pub struct RegionSelector {
    thresholds: Thresholds,
    total_aligned: u64,
}

impl RegionSelector {
    pub fn new(thresholds: Thresholds, total_aligned: u64) -> Self {
        Self {
            thresholds,
            total_aligned,
        }
    }

    pub fn total_aligned(&self) -> u64 {
        self.total_aligned
    }

    pub fn percentage(&self, reads: u64) -> f64 {
        if self.total_aligned == 0 {
            return 0.0;
        }
        reads as f64 / self.total_aligned as f64 * 100.0
    }

    pub fn decide(&self, region: &str, reads: u64) -> SelectionDecision {
        let percentage = self.percentage(reads);
        let exclusion = if reads < self.thresholds.min_reads {
            Some(Exclusion::TooFewReads {
                required: self.thresholds.min_reads,
            })
        } else if percentage < self.thresholds.min_percentage {
            Some(Exclusion::BelowPercentage {
                required: self.thresholds.min_percentage,
            })
        } else if reads == 0 {
            Some(Exclusion::NoReads)
        } else {
            None
        };

        SelectionDecision {
            region: region.to_string(),
            reads,
            percentage,
            included: exclusion.is_none(),
            exclusion,
        }
    }

    /// Decide every region, keeping the input order.
    pub fn select<'a, I>(&self, counts: I) -> Vec<SelectionDecision>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let decisions: Vec<SelectionDecision> = counts
            .into_iter()
            .map(|(region, reads)| self.decide(region, reads))
            .collect();

        let included = decisions.iter().filter(|d| d.included).count();
        tracing::info!(
            "{} of {} regions pass the thresholds (>= {} reads, >= {}% of {} aligned reads)",
            included,
            decisions.len(),
            self.thresholds.min_reads,
            self.thresholds.min_percentage,
            self.total_aligned
        );
        for decision in decisions.iter().filter(|d| !d.included) {
            if let Some(reason) = &decision.exclusion {
                tracing::debug!("Skipping {}: {}", decision.region, reason);
            }
        }
        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn thresholds(min_reads: u64, min_percentage: f64) -> Thresholds {
        Thresholds {
            min_reads,
            min_percentage,
        }
    }

    #[rstest]
    #[case(100, 100, true)]
    #[case(49, 100, false)]
    #[case(50, 5000, true)]
    #[case(50, 5001, false)]
    #[case(0, 100, false)]
    fn test_both_thresholds_apply(#[case] reads: u64, #[case] total: u64, #[case] included: bool) {
        let selector = RegionSelector::new(thresholds(50, 1.0), total);
        assert_eq!(selector.decide("r", reads).included, included);
    }

    #[test]
    fn test_exclusion_reason_is_recorded() {
        let selector = RegionSelector::new(thresholds(50, 1.0), 10_000);
        let decisions = selector.select([("a", 10), ("b", 60), ("c", 200)]);

        assert_eq!(
            decisions[0].exclusion,
            Some(Exclusion::TooFewReads { required: 50 })
        );
        assert_eq!(
            decisions[1].exclusion,
            Some(Exclusion::BelowPercentage { required: 1.0 })
        );
        assert!(decisions[2].included);
        assert!((decisions[2].percentage - 2.0).abs() < 1e-9);
        let names: Vec<&str> = decisions.iter().map(|d| d.region.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_zero_aligned_reads() {
        let selector = RegionSelector::new(thresholds(0, 0.0), 0);
        let decision = selector.decide("r", 0);
        assert_eq!(decision.percentage, 0.0);
        assert!(!decision.included);
    }

    #[test]
    fn test_empty_region_is_skipped_with_zero_thresholds() {
        let selector = RegionSelector::new(thresholds(0, 0.0), 500);
        let decisions = selector.select([("empty", 0), ("one", 1)]);

        assert_eq!(decisions[0].exclusion, Some(Exclusion::NoReads));
        assert_eq!(decisions[0].exclusion.as_ref().unwrap().to_string(), "no reads");
        assert!(decisions[1].included);
    }

    proptest! {
        #[test]
        fn prop_more_reads_never_excludes(
            total in 1u64..100_000,
            a in 0u64..100_000,
            b in 0u64..100_000,
            min_reads in 0u64..500,
            min_percentage in 0.0f64..100.0,
        ) {
            let (low, high) = (a.min(b).min(total), a.max(b).min(total));
            let selector = RegionSelector::new(thresholds(min_reads, min_percentage), total);
            if selector.decide("r", low).included {
                prop_assert!(selector.decide("r", high).included);
            }
        }
    }
}
