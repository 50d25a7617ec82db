//! Metrics calculation for simulation analysis

use serde::{Deserialize, Serialize};

use crate::simulation::orchestrator::{BatchResults, SweepResults};
use crate::simulation::replay::SimulationResult;
use crate::utils::amm_math::{PoolState, BPS_DENOMINATOR};
use crate::utils::units::{signed_to_f64, to_f64};

const HISTOGRAM_BUCKETS: usize = 10;

/// Calculator for simulation metrics
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Spot price before the first step and after each executed step
    pub fn price_path(result: &SimulationResult) -> Vec<PriceDataPoint> {
        let initial = PriceDataPoint {
            step: 0,
            label: "initial".to_string(),
            price: result.initial_pool.price_a_in_b(),
            impact_bps: 0,
        };

        std::iter::once(initial)
            .chain(result.steps.iter().map(|step| PriceDataPoint {
                step: step.index as u32 + 1,
                label: step.operation.label(),
                price: step.pool_after.price_a_in_b(),
                impact_bps: Self::price_impact_bps(&result.initial_pool, &step.pool_after),
            }))
            .collect()
    }

    /// Move of the A-in-B spot price from `before` to `after`, in bps
    pub fn price_impact_bps(before: &PoolState, after: &PoolState) -> i64 {
        let (Ok(p0), Ok(p1)) = (before.get_price(), after.get_price()) else {
            return 0;
        };
        if p0 == 0 {
            return 0;
        }
        let diff = p1 as i128 - p0 as i128;
        (diff.saturating_mul(BPS_DENOMINATOR as i128) / p0 as i128) as i64
    }

    /// Calculate cumulative MEV over the batch
    pub fn cumulative_mev(results: &BatchResults) -> Vec<CumulativeDataPoint> {
        let decimals = results.decimals;
        let mut cumulative = 0i128;

        results
            .rounds
            .iter()
            .map(|r| {
                cumulative += r.attacker_profit;
                CumulativeDataPoint {
                    round: r.round,
                    value: signed_to_f64(cumulative, decimals),
                }
            })
            .collect()
    }

    /// Calculate cumulative victim losses over the batch
    pub fn cumulative_losses(results: &BatchResults) -> Vec<CumulativeDataPoint> {
        let decimals = results.decimals;
        let mut cumulative = 0i128;

        results
            .rounds
            .iter()
            .map(|r| {
                cumulative += r.victim_loss;
                CumulativeDataPoint {
                    round: r.round,
                    value: signed_to_f64(cumulative, decimals),
                }
            })
            .collect()
    }

    /// Histogram of per-attack victim losses
    pub fn loss_distribution(results: &BatchResults) -> Vec<HistogramBucket> {
        let decimals = results.decimals;
        let losses: Vec<f64> = results
            .rounds
            .iter()
            .filter(|r| r.trade.was_attacked && r.victim_loss > 0)
            .map(|r| signed_to_f64(r.victim_loss, decimals))
            .collect();

        histogram(&losses)
    }

    /// Pool price after every round
    pub fn price_over_time(results: &BatchResults) -> Vec<PriceDataPoint> {
        let initial = results
            .pool_history
            .first()
            .map(|h| h.price_a_in_b)
            .unwrap_or_default();

        results
            .pool_history
            .iter()
            .map(|h| PriceDataPoint {
                step: h.round,
                label: h.ordering.to_string(),
                price: h.price_a_in_b,
                impact_bps: if initial > 0.0 {
                    ((h.price_a_in_b - initial) / initial * 10_000.0) as i64
                } else {
                    0
                },
            })
            .collect()
    }

    /// Profit and victim loss per candidate frontrun size
    pub fn sweep_curve(results: &SweepResults) -> Vec<SweepDataPoint> {
        results
            .sweep
            .candidates
            .iter()
            .map(|p| SweepDataPoint {
                frontrun: to_f64(p.frontrun_amount, results.decimals),
                profit: signed_to_f64(p.attacker_profit, results.decimals),
                victim_loss: signed_to_f64(p.victim_loss, results.decimals),
                completed: p.completed,
            })
            .collect()
    }
}

fn histogram(values: &[f64]) -> Vec<HistogramBucket> {
    if values.is_empty() {
        return vec![];
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let bucket_size = (max - min) / HISTOGRAM_BUCKETS as f64;

    if bucket_size == 0.0 {
        return vec![HistogramBucket {
            range_start: min,
            range_end: max,
            count: values.len() as u32,
            label: format!("{:.4}", min),
        }];
    }

    let mut buckets: Vec<HistogramBucket> = (0..HISTOGRAM_BUCKETS)
        .map(|i| {
            let start = min + (i as f64 * bucket_size);
            let end = start + bucket_size;
            HistogramBucket {
                range_start: start,
                range_end: end,
                count: 0,
                label: format!("{:.4}-{:.4}", start, end),
            }
        })
        .collect();

    for value in values {
        let idx = ((value - min) / bucket_size).floor() as usize;
        buckets[idx.min(HISTOGRAM_BUCKETS - 1)].count += 1;
    }

    buckets
}

/// Data point for cumulative charts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CumulativeDataPoint {
    pub round: u32,
    pub value: f64,
}

/// Histogram bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub range_start: f64,
    pub range_end: f64,
    pub count: u32,
    pub label: String,
}

/// Price data point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDataPoint {
    pub step: u32,
    pub label: String,
    pub price: f64,
    /// Versus the starting price
    pub impact_bps: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepDataPoint {
    pub frontrun: f64,
    pub profit: f64,
    pub victim_loss: f64,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::simulation::orchestrator::Orchestrator;
    use crate::utils::units::WAD;

    #[test]
    fn test_reference_price_path() {
        let results = Orchestrator::new(SimulationConfig::reference())
            .run_reference()
            .unwrap();

        let path = MetricsCalculator::price_path(&results.sandwich);

        assert_eq!(path.len(), 4);
        assert_eq!(path[0].price, 2.0);
        // Two A -> B buys push the A price down, the backrun pushes it back up
        assert!(path[1].price < path[0].price);
        assert!(path[2].price < path[1].price);
        assert!(path[3].price > path[2].price);
        assert!(path[2].impact_bps < 0);
    }

    #[test]
    fn test_price_impact_bps() {
        let before = PoolState::new(1_000 * WAD, 2_000 * WAD, 0).unwrap();
        let after = PoolState::new(1_000 * WAD, 2_200 * WAD, 0).unwrap();

        assert_eq!(MetricsCalculator::price_impact_bps(&before, &after), 1_000);
        assert_eq!(MetricsCalculator::price_impact_bps(&after, &after), 0);
    }

    #[test]
    fn test_histogram_buckets() {
        assert!(histogram(&[]).is_empty());
        assert_eq!(histogram(&[1.0, 1.0]).len(), 1);

        let buckets = histogram(&[0.0, 1.0, 5.0, 10.0]);
        assert_eq!(buckets.len(), HISTOGRAM_BUCKETS);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u32>(), 4);
        assert_eq!(buckets[HISTOGRAM_BUCKETS - 1].count, 1);
    }

    #[test]
    fn test_cumulative_series_match_summary() {
        let results = Orchestrator::new(SimulationConfig::quick_test())
            .run_batch()
            .unwrap();

        let mev = MetricsCalculator::cumulative_mev(&results);
        assert_eq!(mev.len(), results.rounds.len());
        let last = mev.last().unwrap().value;
        let total = signed_to_f64(results.summary.total_mev_extracted, results.decimals);
        assert!((last - total).abs() < 1e-9);
    }
}
