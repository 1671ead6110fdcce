use crate::erase::erase_tree;
use crate::errors::EvalError;
use crate::event::{event_tree_to_tagged, Event};
use crate::event_tree::Tree;
use crate::grid::ValueGrid;
use crate::nhx;
use crate::ordered::super_reconciliation;
use crate::sim::{simulate_evolution, SimulationParams};
use crate::synteny::Synteny;
use crate::unordered::unordered_super_reconciliation;
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::*;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Metrics that can be collected for each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Difference between the DL-scores of the reference and the
    /// reconciled trees.
    DlScore,

    /// Wall-clock duration of the reconciliation, in microseconds.
    Duration,
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "dlscore" => Ok(Metric::DlScore),
            "duration" => Ok(Metric::Duration),
            other => Err(format!(
                "unknown metric `{}`, expected `dlscore` or `duration`",
                other
            )),
        }
    }
}

/// Parameter grid and collection settings for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    pub metrics: Vec<Metric>,
    pub unordered: bool,
    pub sample_size: u32,
    pub base_size: ValueGrid<usize>,
    pub depth: ValueGrid<u32>,
    pub p_dup: ValueGrid<f64>,
    pub p_dup_length: ValueGrid<f64>,
    pub p_loss: ValueGrid<f64>,
    pub p_loss_length: ValueGrid<f64>,
    pub p_rearr: ValueGrid<f64>,
}

impl EvaluationConfig {
    fn needs(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }

    /// Expand the Cartesian product of all parameter axes.
    fn grid_points(&self) -> Vec<SimulationParams> {
        let mut points = Vec::new();

        for &base_size in self.base_size.values() {
            for &depth in self.depth.values() {
                for &p_dup in self.p_dup.values() {
                    for &p_dup_length in self.p_dup_length.values() {
                        for &p_loss in self.p_loss.values() {
                            for &p_loss_length in self.p_loss_length.values() {
                                for &p_rearr in self.p_rearr.values() {
                                    points.push(SimulationParams {
                                        base: Synteny::dummy(base_size),
                                        depth,
                                        p_dup: OrderedFloat(p_dup),
                                        p_dup_length: OrderedFloat(p_dup_length),
                                        p_loss: OrderedFloat(p_loss),
                                        p_loss_length: OrderedFloat(p_loss_length),
                                        p_rearr: OrderedFloat(p_rearr),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        points
    }
}

#[derive(Debug, Default, Clone)]
struct SampleOutcome {
    dlscore: Option<u64>,
    duration: Option<u64>,
}

/// Measurements accumulated for one grid point.
#[derive(Debug, Default)]
struct PointResults {
    dlscore: Vec<u64>,
    duration: Vec<u64>,
}

fn tree_to_nhx(tree: &Tree<Event>) -> String {
    nhx::write_tree(&event_tree_to_tagged(tree))
}

/// Simulate one reference tree, erase it, reconcile the erased copy
/// and measure the requested metrics.
fn evaluate_sample<R: Rng + ?Sized>(
    rng: &mut R,
    config: &EvaluationConfig,
    params: &SimulationParams,
) -> Result<SampleOutcome> {
    let reference = simulate_evolution(rng, params);

    let mut reconciled = reference.clone();
    erase_tree(&mut reconciled);

    let start = Instant::now();

    if config.unordered {
        unordered_super_reconciliation(&mut reconciled)?;
    } else {
        super_reconciliation(&mut reconciled)?;
    }

    let mut outcome = SampleOutcome::default();

    if config.needs(Metric::Duration) {
        outcome.duration = Some(start.elapsed().as_micros() as u64);
    }

    if config.needs(Metric::DlScore) {
        let reference_score = reference.dl_score();
        let reconciled_score = reconciled.dl_score();

        if reference_score < reconciled_score {
            // A reconciliation worse than the reference betrays a flaw
            // in the algorithm; give up with both trees attached
            return Err(EvalError::Divergence {
                reference_score,
                reconciled_score,
                reference: tree_to_nhx(&reference),
                reconciled: tree_to_nhx(&reconciled),
            }
            .into());
        }

        outcome.dlscore = Some((reference_score - reconciled_score) as u64);
    }

    Ok(outcome)
}

fn params_to_json(params: &SimulationParams) -> serde_json::Value {
    json!({
        "base_size": params.base.len(),
        "depth": params.depth,
        "p_dup": params.p_dup.into_inner(),
        "p_dup_length": params.p_dup_length.into_inner(),
        "p_loss": params.p_loss.into_inner(),
        "p_loss_length": params.p_loss_length.into_inner(),
        "p_rearr": params.p_rearr.into_inner(),
    })
}

thread_local! {
    // One independent generator per worker thread, seeded from system
    // entropy when the worker first runs
    static WORKER_RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

/// Run the whole evaluation: simulate and reconcile `sample_size`
/// trees for every point of the parameter grid, in parallel, and
/// collect the requested metrics into a JSON report.
///
/// A single failing sample aborts the run: remaining work units drain
/// without doing anything and an error is returned.
pub fn run_evaluation(config: &EvaluationConfig) -> Result<serde_json::Value> {
    let points = config.grid_points();

    let mut units: Vec<&SimulationParams> = Vec::new();
    for point in &points {
        for _ in 0..config.sample_size {
            units.push(point);
        }
    }

    info!(
        "evaluating {} samples over {} parameter sets on {} threads",
        units.len(),
        points.len(),
        rayon::current_num_threads()
    );

    let bar = if atty::is(atty::Stream::Stderr) {
        let bar = ProgressBar::new(units.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "[{percent:>3}%] {pos}/{len} tasks performed",
            )
            .unwrap(),
        );
        Some(bar)
    } else {
        None
    };

    struct Shared {
        // Entries are created in completion order; the map gives the
        // entry index of each already-seen parameter set
        entries: Vec<(SimulationParams, PointResults)>,
        index: HashMap<SimulationParams, usize>,
        performed: u64,
    }

    let shared = Mutex::new(Shared {
        entries: Vec::with_capacity(points.len()),
        index: HashMap::with_capacity(points.len()),
        performed: 0,
    });
    let has_failed = AtomicBool::new(false);

    units.par_iter().for_each(|&params| {
        if has_failed.load(Ordering::Relaxed) {
            return;
        }

        let outcome = WORKER_RNG.with(|rng| {
            let mut rng = rng.borrow_mut();
            evaluate_sample(&mut *rng, config, params)
        });

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                has_failed.store(true, Ordering::Relaxed);
                error!("{:#}", err);
                return;
            }
        };

        let mut shared = shared.lock().expect("mutex poisoning");

        let index = match shared.index.get(params) {
            Some(&index) => index,
            None => {
                let index = shared.entries.len();
                shared.index.insert(params.clone(), index);
                shared.entries.push((params.clone(), PointResults::default()));
                index
            }
        };

        let results = &mut shared.entries[index].1;

        if let Some(dlscore) = outcome.dlscore {
            results.dlscore.push(dlscore);
        }

        if let Some(duration) = outcome.duration {
            results.duration.push(duration);
        }

        shared.performed += 1;

        if let Some(bar) = &bar {
            bar.set_position(shared.performed);
        }
    });

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if has_failed.load(Ordering::Relaxed) {
        bail!("at least one evaluation sample failed; no output was produced");
    }

    let shared = shared.into_inner().expect("broken mutex");
    let mut report = Vec::with_capacity(shared.entries.len());

    for (params, results) in shared.entries {
        let mut entry = json!({ "params": params_to_json(&params) });

        if config.needs(Metric::DlScore) {
            entry["dlscore"] = json!(results.dlscore);
        }

        if config.needs(Metric::Duration) {
            entry["duration"] = json!(results.duration);
        }

        report.push(entry);
    }

    Ok(serde_json::Value::Array(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(metrics: Vec<Metric>, unordered: bool) -> EvaluationConfig {
        EvaluationConfig {
            metrics,
            unordered,
            sample_size: 4,
            base_size: "4".parse().unwrap(),
            depth: "{2, 3}".parse().unwrap(),
            p_dup: "0.5".parse().unwrap(),
            p_dup_length: "0.3".parse().unwrap(),
            p_loss: "0.2".parse().unwrap(),
            p_loss_length: "0.7".parse().unwrap(),
            p_rearr: "1".parse().unwrap(),
        }
    }

    #[test]
    fn metric_parsing() {
        assert_eq!("dlscore".parse::<Metric>().unwrap(), Metric::DlScore);
        assert_eq!("duration".parse::<Metric>().unwrap(), Metric::Duration);
        assert!("wallclock".parse::<Metric>().is_err());
    }

    #[test]
    fn grid_points_form_the_cartesian_product() {
        let config = EvaluationConfig {
            depth: "{2, 3}".parse().unwrap(),
            p_dup: "{0.1, 0.5, 0.9}".parse().unwrap(),
            ..small_config(vec![Metric::DlScore], false)
        };

        let points = config.grid_points();
        assert_eq!(points.len(), 6);
    }

    #[test]
    fn collects_sample_size_measurements_per_point() {
        let config = small_config(vec![Metric::DlScore, Metric::Duration], false);
        let report = run_evaluation(&config).unwrap();

        let entries = report.as_array().unwrap();
        assert_eq!(entries.len(), 2);

        for entry in entries {
            assert_eq!(entry["dlscore"].as_array().unwrap().len(), 4);
            assert_eq!(entry["duration"].as_array().unwrap().len(), 4);
            assert_eq!(entry["params"]["base_size"], json!(4));
        }
    }

    #[test]
    fn unordered_evaluation_runs() {
        let config = small_config(vec![Metric::DlScore], true);
        let report = run_evaluation(&config).unwrap();

        for entry in report.as_array().unwrap() {
            assert_eq!(entry["dlscore"].as_array().unwrap().len(), 4);
        }
    }

    #[test]
    fn duration_only_runs_skip_scores() {
        let config = small_config(vec![Metric::Duration], false);
        let report = run_evaluation(&config).unwrap();

        for entry in report.as_array().unwrap() {
            assert!(entry.get("dlscore").is_none());
            assert_eq!(entry["duration"].as_array().unwrap().len(), 4);
        }
    }
}
