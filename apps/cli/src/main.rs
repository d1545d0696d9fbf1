//! Lector CLI - Command-line interface for training and applying readers
//!
//! The `lector` command trains question-answering/entailment readers,
//! answers questions with stored readers, evaluates them, and lists the
//! registered reader implementations.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Lector - train and apply text readers
///
/// Lector is a framework for training question-answering and entailment
/// models ("readers") over text corpora, with reproducible training jobs
/// and on-disk reader directories.
#[derive(Parser, Debug)]
#[command(
    name = "lector",
    author,
    version,
    about = "Lector - train and apply question-answering readers"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a reader from a configuration file
    ///
    /// The configuration names the reader, the corpus paths, and the
    /// hyperparameters; `parent_config` keys layer configurations.
    Train {
        /// Path to the TOML configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Workspace directory for training artifacts
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },

    /// Answer questions with a stored reader
    Answer {
        /// Reader directory written by `train` (a checkpoint directory)
        #[arg(short, long)]
        reader: PathBuf,

        /// QA corpus file with the questions to answer
        #[arg(short, long)]
        input: PathBuf,

        /// Write answers to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Answers to keep per question
        #[arg(long, default_value = "1")]
        top_k: usize,

        /// Questions per prediction batch
        #[arg(long, default_value = "32")]
        batch_size: usize,
    },

    /// Evaluate a stored reader on a labeled corpus
    Eval {
        /// Reader directory written by `train`
        #[arg(short, long)]
        reader: PathBuf,

        /// Labeled QA corpus file
        #[arg(short, long)]
        data: PathBuf,

        /// Questions per prediction batch
        #[arg(long, default_value = "32")]
        batch_size: usize,
    },

    /// List the registered reader implementations
    Readers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = if let Some(command) = args.command {
        command
    } else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Train { config, workspace } => {
            commands::train::execute(config, workspace).await?;
        }
        Command::Answer { reader, input, output, top_k, batch_size } => {
            commands::answer::execute(reader, input, output, top_k, batch_size)?;
        }
        Command::Eval { reader, data, batch_size } => {
            commands::eval::execute(reader, data, batch_size)?;
        }
        Command::Readers => {
            commands::readers::execute();
        }
    }

    Ok(())
}
