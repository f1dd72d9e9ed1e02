//! Parameter sweep: one full backtest per combination of candidate
//! parameter values, run in parallel, with per-combination failure
//! isolation.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use strategy_core::{share, Strategy};

use crate::engine::Backtester;
use crate::models::{BacktestResults, HistoricalSnapshot};

/// One assignment of values to the swept parameter names.
pub type ParameterSet = BTreeMap<String, f64>;

/// Run one backtest per element of the cartesian product of `ranges`.
///
/// Each combination gets a fresh strategy from `builder` and a fresh engine;
/// combinations run on the rayon pool. A failing combination (builder error
/// or run error) is logged and skipped, never fatal to the sweep. Results
/// are keyed by a `"name=value_..."` label.
pub fn run_parameter_sweep<F>(
    builder: F,
    ranges: &BTreeMap<String, Vec<f64>>,
    initial_capital: f64,
    data: &HashMap<String, Vec<HistoricalSnapshot>>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BTreeMap<String, BTreeMap<String, BacktestResults>>
where
    F: Fn(&ParameterSet) -> anyhow::Result<Box<dyn Strategy>> + Send + Sync,
{
    let combinations = cartesian_product(ranges);
    tracing::info!("Parameter sweep: {} combinations", combinations.len());

    combinations
        .par_iter()
        .filter_map(|combo| {
            let label = combo_label(combo);
            let outcome = run_combination(&builder, combo, initial_capital, data, start, end);
            match outcome {
                Ok(results) => Some((label, results)),
                Err(e) => {
                    tracing::error!("Sweep combination {} failed: {:#}", label, e);
                    None
                }
            }
        })
        .collect()
}

fn run_combination<F>(
    builder: &F,
    combo: &ParameterSet,
    initial_capital: f64,
    data: &HashMap<String, Vec<HistoricalSnapshot>>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> anyhow::Result<BTreeMap<String, BacktestResults>>
where
    F: Fn(&ParameterSet) -> anyhow::Result<Box<dyn Strategy>> + Send + Sync,
{
    let strategy = builder(combo)?;
    let mut engine = Backtester::new(initial_capital);
    engine.add_strategy(share(strategy));
    engine.run(data, start, end)
}

/// All assignments of one value per named range, in name order.
fn cartesian_product(ranges: &BTreeMap<String, Vec<f64>>) -> Vec<ParameterSet> {
    let mut combinations: Vec<ParameterSet> = vec![ParameterSet::new()];
    for (name, values) in ranges {
        combinations = combinations
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |&value| {
                    let mut next = combo.clone();
                    next.insert(name.clone(), value);
                    next
                })
            })
            .collect();
    }
    combinations
}

fn combo_label(combo: &ParameterSet) -> String {
    combo
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_product_covers_all_combinations() {
        let mut ranges = BTreeMap::new();
        ranges.insert("a".to_string(), vec![1.0, 2.0]);
        ranges.insert("b".to_string(), vec![10.0, 20.0, 30.0]);

        let combos = cartesian_product(&ranges);
        assert_eq!(combos.len(), 6);
        assert!(combos
            .iter()
            .any(|c| c["a"] == 2.0 && c["b"] == 30.0));
    }

    #[test]
    fn empty_ranges_yield_single_empty_combination() {
        let combos = cartesian_product(&BTreeMap::new());
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn labels_are_sorted_and_stable() {
        let mut combo = ParameterSet::new();
        combo.insert("stop".to_string(), 1.5);
        combo.insert("max_size".to_string(), 0.08);
        assert_eq!(combo_label(&combo), "max_size=0.08_stop=1.5");
    }
}
