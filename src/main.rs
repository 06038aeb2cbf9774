//! salloc-gate: job-submit hook for Slurm.
//!
//! Reads one JSON submission descriptor from stdin, writes a JSON verdict to
//! stdout, and exits 0 (allow), 1 (deny) or 2 (internal error / bad input).

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use salloc_gate::config::Config;
use salloc_gate::eval::{Decision, Gate, RuleMatch, SubmissionRequest};
use salloc_gate::logging;

/// Restrict salloc and OnDemand dashboard allocations to whitelisted partitions
#[derive(Parser, Debug)]
#[command(name = "salloc-gate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Overlay configuration file (default: $SALLOC_GATE_CONFIG or /etc/slurm/salloc-gate.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the job-modify hook instead of job-submit
    #[arg(long)]
    modify: bool,

    /// Log at debug level regardless of settings.log_level
    #[arg(short, long)]
    verbose: bool,
}

fn emit(result: &RuleMatch) -> ! {
    println!("{}", result.to_hook_output());
    std::process::exit(result.decision.exit_code());
}

fn fail(message: String) -> ! {
    eprintln!("salloc-gate: {message}");
    emit(&RuleMatch {
        decision: Decision::InternalError,
        reason: message,
    });
}

fn main() {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => fail(e.to_string()),
    };

    let level = if args.verbose {
        logging::parse_level("debug")
    } else {
        logging::parse_level(&config.settings.log_level)
    };
    logging::init(level);

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        fail(format!("failed to read stdin: {e}"));
    }

    let req: SubmissionRequest = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => fail(format!("JSON parse error: {e}")),
    };

    let gate = Gate::from_config(&config);
    let result = if args.modify {
        gate.job_modify(&req)
    } else {
        gate.job_submit(&req)
    };
    emit(&result);
}
