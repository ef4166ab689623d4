//! This executable appends one run and its step records to an existing run
//! database. The concurrency tests spawn several of them against one file
//! to exercise cross-process writes.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use runlog::{record, RunDb};

#[derive(Parser, Debug)]
#[command(about = "Creates one run and appends its step records to a run database.")]
struct Args {
    /// The path of the database file to write to. Must already exist.
    #[arg(long)]
    db_path: PathBuf,

    /// Weight initialization recorded in the run metadata.
    #[arg(long)]
    init: String,

    /// Learning rate recorded in the run metadata.
    #[arg(long)]
    lr: f64,

    /// Number of step records to append.
    #[arg(long)]
    steps: i64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let run_info = record! {
            "init" => args.init.as_str(),
            "lr" => args.lr,
            "steps" => args.steps,
        };
        let db = RunDb::new(&args.db_path, &run_info).await?;

        for step in 0..args.steps {
            let entry = record! {
                "step" => step,
                "loss" => 1.0 / (step as f64 + 1.0),
            };
            db.insert(&entry).await?;
            // Yield the write lock now and then so the writers interleave.
            if step % 3 == 0 {
                std::thread::sleep(Duration::from_millis(2));
            }
        }
        anyhow::Ok(())
    })?;

    Ok(())
}
