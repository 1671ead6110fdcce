use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Read;
use std::io::Write;

use synrec::erase::erase_tree;
use synrec::errors::FileError;
use synrec::evaluate::{run_evaluation, EvaluationConfig, Metric};
use synrec::event::{event_tree_from_tagged, event_tree_to_tagged};
use synrec::grid::ValueGrid;
use synrec::nhx;
use synrec::ordered::super_reconciliation;
use synrec::sim::{simulate_evolution, SimulationParams};
use synrec::synteny::Synteny;
use synrec::unordered::unordered_super_reconciliation;
use synrec::viz::event_tree_to_graphviz;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate the evolution of a synteny and output the reference
    /// event tree
    Simulate {
        /// Number of genes in the ancestral synteny
        #[clap(short = 's', long, default_value_t = 5)]
        base_size: usize,
        /// Maximum depth of events on a branch, not counting losses
        #[clap(short = 'H', long, default_value_t = 5)]
        depth: u32,
        /// Probability for an internal node to be a duplication
        #[clap(short = 'd', long, default_value_t = 0.5)]
        p_dup: f64,
        /// Parameter of the geometric distribution of the lengths of
        /// duplicated segments
        #[clap(short = 'D', long, default_value_t = 0.3)]
        p_dup_length: f64,
        /// Probability for a loss under each branch
        #[clap(short = 'l', long, default_value_t = 0.2)]
        p_loss: f64,
        /// Parameter of the geometric distribution of the lengths of
        /// lost segments
        #[clap(short = 'L', long, default_value_t = 0.7)]
        p_loss_length: f64,
        /// Parameter of the geometric distribution of the number of
        /// rearranged gene pairs (1 disables rearrangement)
        #[clap(short = 'R', long, default_value_t = 1.)]
        p_rearr: f64,
        /// Seed for the pseudo-random generator (defaults to system
        /// entropy)
        #[clap(long)]
        seed: Option<u64>,
        /// Output file, or '-' for standard output
        #[clap(short, long, default_value = "-")]
        output: String,
    },

    /// Remove loss events and internal labels from a tree, leaving a
    /// valid reconciliation input
    Erase {
        /// Input file, or '-' for standard input
        #[clap(short = 'I', long, default_value = "-")]
        input: String,
        /// Output file, or '-' for standard output
        #[clap(short, long, default_value = "-")]
        output: String,
    },

    /// Compute a super-reconciliation of an input tree
    Reconcile {
        /// Use the unordered super-reconciliation algorithm
        #[clap(short = 'U', long)]
        unordered: bool,
        /// Input file, or '-' for standard input
        #[clap(short = 'I', long, default_value = "-")]
        input: String,
        /// Output file, or '-' for standard output
        #[clap(short, long, default_value = "-")]
        output: String,
    },

    /// Evaluate metrics of the reconciliation over a grid of simulation
    /// parameters
    ///
    /// Grid parameters accept a single value, a set of values
    /// '{1, 2, 3}' or a range '[min:max]' with an optional step
    /// '[min:max:step]'.
    Evaluate {
        /// Path of the JSON report to create
        #[clap(short, long)]
        output: String,
        /// Metrics to evaluate ('dlscore' or 'duration')
        #[clap(short, long, required = true)]
        metrics: Vec<Metric>,
        /// Use the unordered super-reconciliation algorithm
        #[clap(short = 'U', long)]
        unordered: bool,
        /// Number of samples for each set of parameters
        #[clap(short = 'S', long, default_value_t = 1)]
        sample_size: u32,
        /// Number of worker threads (0 uses one per logical CPU, 1
        /// disables parallelism)
        #[clap(short, long, default_value_t = 0)]
        jobs: usize,
        /// Number of genes in the ancestral synteny
        #[clap(short = 's', long, default_value = "5")]
        base_size: ValueGrid<usize>,
        /// Maximum depth of events on a branch, not counting losses
        #[clap(short = 'H', long, default_value = "5")]
        depth: ValueGrid<u32>,
        /// Probability for an internal node to be a duplication
        #[clap(short = 'd', long, default_value = "0.5")]
        p_dup: ValueGrid<f64>,
        /// Parameter of the geometric distribution of the lengths of
        /// duplicated segments
        #[clap(short = 'D', long, default_value = "0.3")]
        p_dup_length: ValueGrid<f64>,
        /// Probability for a loss under each branch
        #[clap(short = 'l', long, default_value = "0.2")]
        p_loss: ValueGrid<f64>,
        /// Parameter of the geometric distribution of the lengths of
        /// lost segments
        #[clap(short = 'L', long, default_value = "0.7")]
        p_loss_length: ValueGrid<f64>,
        /// Parameter of the geometric distribution of the number of
        /// rearranged gene pairs (1 disables rearrangement)
        #[clap(short = 'R', long, default_value = "1")]
        p_rearr: ValueGrid<f64>,
    },

    /// Render a tree as a Graphviz graph
    Viz {
        /// Input file, or '-' for standard input
        #[clap(short = 'I', long, default_value = "-")]
        input: String,
        /// Output file, or '-' for standard output
        #[clap(short, long, default_value = "-")]
        output: String,
    },
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path).map_err(|source| {
            FileError::CannotOpen { source, filename: path.to_owned() }.into()
        })
    }
}

fn write_output(path: &str, data: &str) -> Result<()> {
    if path == "-" {
        std::io::stdout().write_all(data.as_bytes())?;
    } else {
        std::fs::write(path, data).map_err(|source| FileError::WhileCreating {
            source,
            filename: path.to_owned(),
        })?;
    }

    Ok(())
}

fn parse_input_tree(path: &str) -> Result<synrec::event_tree::Tree<synrec::event::Event>> {
    let data = read_input(path)?;
    let tagged = nhx::parse_tree(&data)
        .with_context(|| format!("while parsing the tree from `{}`", path))?;
    Ok(event_tree_from_tagged(&tagged)?)
}

fn write_output_tree(
    path: &str,
    tree: &synrec::event_tree::Tree<synrec::event::Event>,
) -> Result<()> {
    let mut data = nhx::write_tree(&event_tree_to_tagged(tree));
    data.push('\n');
    write_output(path, &data)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    stderrlog::new()
        .timestamp(stderrlog::Timestamp::Off)
        .verbosity(if args.verbose { 4 } else { 2 })
        .show_level(false)
        .init()
        .unwrap();

    match args.command {
        Commands::Simulate {
            base_size,
            depth,
            p_dup,
            p_dup_length,
            p_loss,
            p_loss_length,
            p_rearr,
            seed,
            output,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            info!("Seed: {}", seed);

            let params = SimulationParams {
                base: Synteny::dummy(base_size),
                depth,
                p_dup: p_dup.into(),
                p_dup_length: p_dup_length.into(),
                p_loss: p_loss.into(),
                p_loss_length: p_loss_length.into(),
                p_rearr: p_rearr.into(),
            };

            let mut rng = StdRng::seed_from_u64(seed);
            let tree = simulate_evolution(&mut rng, &params);
            write_output_tree(&output, &tree)
        }

        Commands::Erase { input, output } => {
            let mut tree = parse_input_tree(&input)?;
            erase_tree(&mut tree);
            write_output_tree(&output, &tree)
        }

        Commands::Reconcile { unordered, input, output } => {
            let mut tree = parse_input_tree(&input)?;

            if unordered {
                unordered_super_reconciliation(&mut tree)
                    .with_context(|| format!("while reconciling `{}`", input))?;
            } else {
                let cost = super_reconciliation(&mut tree)
                    .with_context(|| format!("while reconciling `{}`", input))?;
                debug!("Reconciliation cost: {}", cost);
            }

            write_output_tree(&output, &tree)
        }

        Commands::Evaluate {
            output,
            metrics,
            unordered,
            sample_size,
            jobs,
            base_size,
            depth,
            p_dup,
            p_dup_length,
            p_loss,
            p_loss_length,
            p_rearr,
        } => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build_global()
                .unwrap();
            debug!("Using {} threads", rayon::current_num_threads());

            let config = EvaluationConfig {
                metrics,
                unordered,
                sample_size,
                base_size,
                depth,
                p_dup,
                p_dup_length,
                p_loss,
                p_loss_length,
                p_rearr,
            };

            let report = run_evaluation(&config)?;
            write_output(&output, &serde_json::to_string(&report)?)
        }

        Commands::Viz { input, output } => {
            let tree = parse_input_tree(&input)?;
            write_output(&output, &event_tree_to_graphviz(&tree))
        }
    }
}
