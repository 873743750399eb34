//! Structure-aware three-way merge CLI.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use treemerge::{merge_files, MatcherKind, MergeContext, StrategyKind};

/// Structure-aware three-way merge for class-based source files
#[derive(Parser)]
#[command(name = "ttm")]
#[command(version)]
#[command(about = "Structure-aware three-way merge", long_about = None)]
struct Cli {
    /// Left revision file
    left: PathBuf,

    /// Right revision file
    right: PathBuf,

    /// Base (common ancestor) file; omit for a two-way merge
    #[arg(short, long)]
    base: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Merge strategy: structured, linebased, semistructured, or combined
    #[arg(short, long, default_value = "structured")]
    mode: StrategyKind,

    /// Use the cost-model matcher instead of the classic matcher
    #[arg(long)]
    cost_model: bool,

    /// Cost-model weight of leaving a node unmatched
    #[arg(long, default_value_t = 1.0)]
    wn: f32,

    /// Cost-model weight of renaming
    #[arg(long, default_value_t = 1.0)]
    wr: f32,

    /// Cost-model weight of ancestry violations
    #[arg(long, default_value_t = 1.0)]
    wa: f32,

    /// Cost-model weight of sibling-group breakups
    #[arg(long, default_value_t = 1.0)]
    ws: f32,

    /// Subtree depth still considered for matching after a mismatch
    #[arg(long, default_value_t = 0)]
    look_ahead: u32,

    /// Suppress informational output
    #[arg(short, long)]
    quiet: bool,

    /// Compute the merge but do not write the result
    #[arg(long)]
    pretend: bool,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut context = MergeContext::with_strategy(cli.mode);
    context.matcher = if cli.cost_model {
        MatcherKind::CostModel
    } else {
        MatcherKind::Classic
    };
    context.quiet = cli.quiet;
    context.pretend = cli.pretend;
    context.wn = cli.wn;
    context.wr = cli.wr;
    context.wa = cli.wa;
    context.ws = cli.ws;
    context.look_ahead = cli.look_ahead;

    let outcome = merge_files(&context, &cli.left, cli.base.as_deref(), &cli.right)?;

    if !context.pretend {
        let mut output: Box<dyn Write> = match &cli.output {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(io::stdout()),
        };
        output.write_all(outcome.text.as_bytes())?;
        output.flush()?;
    }

    if !cli.quiet {
        if outcome.conflicts > 0 {
            eprintln!("Merge complete with {} conflicts.", outcome.conflicts);
        } else {
            eprintln!("Merge complete.");
        }
    }

    Ok(())
}
