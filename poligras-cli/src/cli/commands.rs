//! Command implementations and argument parsing for the Poligras CLI.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use poligras_core::{
    GraphStore, InputError, MergeConfig, MergeEngine, MergeState, NodeId, Parameters,
    PoligrasError, PoligrasOutput, SummaryEncoder, UpdateStreamError, apply_edge_updates,
    load_features, load_graph, parse_update_stream,
};
use thiserror::Error;

const DEFAULT_COUNTS: u64 = 100;
const DEFAULT_GROUP_SIZE: usize = 200;
const DEFAULT_HIDDEN_SIZE1: usize = 64;
const DEFAULT_HIDDEN_SIZE2: usize = 32;
const DEFAULT_LR: f64 = 0.001;
const DEFAULT_DROPOUT: f64 = 0.0;
const DEFAULT_WEIGHT_DECAY: f64 = 0.0;
const DEFAULT_BAD_COUNTER: u64 = 0;
const DEFAULT_SEED: u64 = 0;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "poligras", about = "Run the Poligras graph summarization pipeline.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the merge engine and summary encoder over a dataset.
    Run(RunArgs),
    /// Apply a dynamic update stream to an existing summary.
    Update(UpdateArgs),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Dataset name; input files are read as `{dataset}_graph`/`{dataset}_feat`.
    #[arg(long)]
    pub dataset: String,

    /// Directory containing the dataset's input files; defaults to the
    /// current directory.
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Output path for `output.json`; defaults to `output.json` in the
    /// input directory.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Outer merge-engine iteration count.
    #[arg(long, default_value_t = DEFAULT_COUNTS)]
    pub counts: u64,

    /// Target bucket size for the group partitioner.
    #[arg(long, default_value_t = DEFAULT_GROUP_SIZE)]
    pub group_size: usize,

    /// Policy network's first hidden layer width.
    #[arg(long, default_value_t = DEFAULT_HIDDEN_SIZE1)]
    pub hidden_size1: usize,

    /// Policy network's second hidden layer width.
    #[arg(long, default_value_t = DEFAULT_HIDDEN_SIZE2)]
    pub hidden_size2: usize,

    /// Adam learning rate.
    #[arg(long, default_value_t = DEFAULT_LR)]
    pub lr: f64,

    /// Dropout probability applied to the pairwise score matrix.
    #[arg(long, default_value_t = DEFAULT_DROPOUT)]
    pub dropout: f64,

    /// Adam weight decay.
    #[arg(long = "weight-decay", default_value_t = DEFAULT_WEIGHT_DECAY)]
    pub weight_decay: f64,

    /// Consecutive non-improving inner iterations tolerated before leaving
    /// the inner loop.
    #[arg(long, default_value_t = DEFAULT_BAD_COUNTER)]
    pub bad_counter: u64,

    /// Base RNG seed for this run.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

/// Options accepted by the `update` command.
#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    /// Path to the existing `output.json` to update in place.
    #[arg(long)]
    pub summary: PathBuf,

    /// Path to the JSON update stream.
    #[arg(long)]
    pub updates: PathBuf,

    /// Output path for `output_dynamic.json`; defaults alongside `--summary`.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Errors surfaced by the CLI's command handlers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be loaded or parsed.
    #[error(transparent)]
    Input(#[from] InputError),
    /// A core invariant was violated while building or merging the graph.
    #[error(transparent)]
    Core(#[from] PoligrasError),
    /// The update stream was malformed or referenced unknown state.
    #[error(transparent)]
    UpdateStream(#[from] UpdateStreamError),
    /// Reading, writing, or parsing a JSON document failed.
    #[error("failed to read or write `{path}`: {reason}")]
    Io {
        /// Path that could not be read or written.
        path: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl CliError {
    /// Returns the stable machine-readable error code, when one exists.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Input(err) => Some(err.code().as_str()),
            Self::Core(err) => Some(err.code().as_str()),
            Self::UpdateStream(err) => Some(err.code().as_str()),
            Self::Io { .. } => None,
        }
    }
}

/// Outcome of running a CLI command, rendered to stdout by [`render_summary`].
#[derive(Debug, Clone)]
pub enum ExecutionSummary {
    /// Result of a `run` invocation.
    Run {
        /// Supernode count after merging.
        supernode_count: usize,
        /// Superedge count after encoding.
        superedge_count: usize,
        /// Total reward accumulated across accepted merges.
        total_reward: i64,
        /// Path the output document was written to.
        output_path: PathBuf,
    },
    /// Result of an `update` invocation.
    Update {
        /// Number of updates applied.
        applied: usize,
        /// Superedge count after applying the updates.
        superedge_count: usize,
        /// Path the updated output document was written to.
        output_path: PathBuf,
    },
}

/// Renders an [`ExecutionSummary`] as human-readable text.
///
/// # Errors
///
/// Returns an I/O error if writing to `writer` fails.
pub fn render_summary(summary: &ExecutionSummary, writer: &mut impl Write) -> std::io::Result<()> {
    match summary {
        ExecutionSummary::Run {
            supernode_count,
            superedge_count,
            total_reward,
            output_path,
        } => writeln!(
            writer,
            "supernodes={supernode_count} superedges={superedge_count} total_reward={total_reward} output={}",
            output_path.display()
        ),
        ExecutionSummary::Update {
            applied,
            superedge_count,
            output_path,
        } => writeln!(
            writer,
            "updates_applied={applied} superedges={superedge_count} output={}",
            output_path.display()
        ),
    }
}

/// Dispatches and executes the parsed CLI command.
///
/// # Errors
///
/// Returns [`CliError`] if input files cannot be loaded, the update stream
/// is malformed, or an internal invariant is violated.
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Run(args) => run_pipeline(&args),
        Command::Update(args) => run_update(&args),
    }
}

fn run_pipeline(args: &RunArgs) -> Result<ExecutionSummary, CliError> {
    let input_dir = args.input_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let graph_path = input_dir.join(format!("{}_graph", args.dataset));
    let feat_path = input_dir.join(format!("{}_feat", args.dataset));
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| input_dir.join("output.json"));

    let (graph, raw_nodes) = load_graph(&graph_path)?;
    let features = load_features(&feat_path, raw_nodes.len())?;

    let mut feature_rows = HashMap::new();
    for (index, row) in features.rows.into_iter().enumerate() {
        feature_rows.insert(NodeId::new(index as u64), row);
    }

    let mut members = HashMap::new();
    for node in graph.nodes() {
        members.insert(node, vec![node]);
    }

    let initial_graph = graph.clone();
    let state = MergeState {
        graph,
        members,
        features: feature_rows,
        feat_dim: features.dim,
    };

    let config = MergeConfig {
        outer_iterations: args.counts,
        bucket_size: args.group_size,
        hidden1: args.hidden_size1,
        hidden2: args.hidden_size2,
        lr: args.lr,
        dropout: args.dropout,
        weight_decay: args.weight_decay,
        bad_counter_limit: args.bad_counter,
        seed: args.seed,
        checkpoint_dir: None,
    };

    let mut engine = MergeEngine::new(config, features.dim);
    let stop = Arc::new(AtomicBool::new(false));
    let (final_state, timeline) = engine.fit(&initial_graph, state, &stop);
    let total_reward: i64 = timeline.iter().map(|entry| entry.stats.reward).sum();

    let output = SummaryEncoder::encode(
        &initial_graph,
        &final_state,
        args.dataset.clone(),
        current_run_id(),
        Parameters {
            counts: args.counts,
            group_size: args.group_size,
            hidden_size1: args.hidden_size1,
            hidden_size2: args.hidden_size2,
            lr: args.lr,
            dropout: args.dropout,
        },
        timeline,
        total_reward,
        count_self_loops(&initial_graph),
    );

    write_json(&output_path, &output)?;

    Ok(ExecutionSummary::Run {
        supernode_count: output.graphs.summary.node_count,
        superedge_count: output.graphs.summary.edge_count,
        total_reward,
        output_path,
    })
}

fn run_update(args: &UpdateArgs) -> Result<ExecutionSummary, CliError> {
    let text = std::fs::read_to_string(&args.summary).map_err(|err| CliError::Io {
        path: args.summary.display().to_string(),
        reason: err.to_string(),
    })?;
    let output: PoligrasOutput = serde_json::from_str(&text).map_err(|err| CliError::Io {
        path: args.summary.display().to_string(),
        reason: err.to_string(),
    })?;

    let raw = std::fs::read_to_string(&args.updates).map_err(|err| CliError::Io {
        path: args.updates.display().to_string(),
        reason: err.to_string(),
    })?;
    let updates = parse_update_stream(&raw)?;

    let updated = apply_edge_updates(&output, &updates)?;

    let output_path = args.output.clone().unwrap_or_else(|| {
        args.summary
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("output_dynamic.json")
    });
    write_json(&output_path, &updated)?;

    Ok(ExecutionSummary::Update {
        applied: updates.len(),
        superedge_count: updated.graphs.summary.edge_count,
        output_path,
    })
}

fn write_json(path: &PathBuf, value: &PoligrasOutput) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|err| CliError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    std::fs::write(path, text).map_err(|err| CliError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

fn count_self_loops(graph: &GraphStore) -> usize {
    graph.nodes().filter(|&n| graph.has_self_loop(n)).count()
}

fn current_run_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("run-{secs}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir_for(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("poligras_cli_test_{name}"));
        let _ = fs::create_dir_all(&dir);
        dir
    }

    #[test]
    fn run_pipeline_produces_a_summary_with_fewer_or_equal_supernodes() {
        let dir = temp_dir_for("run_pipeline");
        fs::write(
            dir.join("toy_graph"),
            r#"{"directed":false,"nodes":[0,1,2],"edges":[{"source":0,"target":1},{"source":1,"target":2},{"source":0,"target":2}]}"#,
        )
        .expect("write graph file");
        fs::write(
            dir.join("toy_feat"),
            r#"{"dim":1,"rows":[[0.0],[1.0],[2.0]]}"#,
        )
        .expect("write feature file");

        let args = RunArgs {
            dataset: "toy".to_owned(),
            input_dir: Some(dir.clone()),
            output: None,
            counts: 2,
            group_size: 3,
            hidden_size1: 4,
            hidden_size2: 2,
            lr: 0.01,
            dropout: 0.0,
            weight_decay: 0.0,
            bad_counter: 3,
            seed: 5,
        };

        let summary = run_pipeline(&args).expect("pipeline runs");
        let ExecutionSummary::Run {
            supernode_count, ..
        } = summary
        else {
            panic!("expected a run summary");
        };
        assert!(supernode_count <= 3);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn run_update_rejects_unknown_node_without_writing_output() {
        let dir = temp_dir_for("run_update");
        let summary_path = dir.join("output.json");
        fs::write(
            &summary_path,
            r#"{"meta":{"dataset":"toy","algorithm":"Poligras","run_id":"run-0","parameters":{"counts":1,"group_size":1,"hidden_size1":1,"hidden_size2":1,"lr":0.001,"dropout":0.0}},"stats":{"initial":{"nodes":1,"edges":0},"summary":{"supernodes":1,"superedges":0,"correction_edges":0},"compression_ratio":0.0,"total_reward":0,"avg_supernode_size":1.0,"correction_breakdown":{"positive":0,"negative":0}},"graphs":{"initial":{"directed":false,"sampled":false,"node_count":1,"edge_count":0,"nodes":[],"edges":[]},"summary":{"directed":false,"sampled":false,"node_count":1,"edge_count":0,"correction_edge_count":0,"nodes":[],"edges":[]}},"timeline":[],"artifacts":{"supernodes":{"members":{"0":["0"]},"node_to_supernode":{"0":"0"}},"corrections":{"positive":[],"negative":[]},"self_loops":0}}"#,
        )
        .expect("write summary file");
        let updates_path = dir.join("updates.json");
        fs::write(&updates_path, r#"[{"type":"add","source":"0","target":"9"}]"#)
            .expect("write updates file");

        let args = UpdateArgs {
            summary: summary_path,
            updates: updates_path,
            output: None,
        };
        let err = run_update(&args).expect_err("rejects unknown node");
        assert!(matches!(err, CliError::UpdateStream(_)));
        let _ = fs::remove_dir_all(&dir);
    }
}
