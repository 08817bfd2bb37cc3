//! Command-line interface orchestration for the Poligras pipeline.
//!
//! The CLI offers a `run` command that loads a dataset's graph and feature
//! files and executes the merge engine and summary encoder, and an `update`
//! command that applies a dynamic edge-update stream to an existing summary.

mod commands;

pub use commands::{
    Cli, CliError, Command, ExecutionSummary, RunArgs, UpdateArgs, render_summary, run_cli,
};
