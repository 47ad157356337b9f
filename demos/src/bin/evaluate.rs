//! Aggregates per-case Dice scores by histologic subtype and grade.
//!
//! The input is a JSON array of case records:
//!
//! ```json
//! [{"id": "slide3_case12", "subtype": 2, "grade": 1, "dice": [0.91, 0.84, 1.0]}]
//! ```

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use attention_unet::evaluation::{CaseRecord, CohortAggregator};
use attention_unet_demos::init_logging;
use clap::Parser;

#[derive(Parser)]
#[command(name = "evaluate")]
#[command(about = "Summarize segmentation Dice scores per histologic subtype and grade")]
struct Args {
    /// Case records file (JSON array)
    #[arg(short, long)]
    cases: PathBuf,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let text = fs::read_to_string(&args.cases)
        .with_context(|| format!("failed to read {}", args.cases.display()))?;
    let cases: Vec<CaseRecord> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", args.cases.display()))?;
    tracing::info!(cases = cases.len(), "loaded case records");

    let mut aggregator = CohortAggregator::new();
    aggregator.extend(cases);
    tracing::info!(
        recorded = aggregator.recorded(),
        skipped = aggregator.skipped(),
        "aggregated cohort"
    );

    let report = aggregator.report();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(())
}
