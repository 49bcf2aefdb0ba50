use anyhow::Result;
use archive_store::migration::{FileOutcome, migrate_directory};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Rewrite legacy `choices: string[]` into `{choice, choiceExplanation}` objects
/// for every .json file in a directory.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the quiz files
    #[arg(default_value = ".")]
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let report = migrate_directory(&args.dir).await?;

    for (path, outcome) in &report.files {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        match outcome {
            FileOutcome::Converted => println!("[converted] {}", name),
            FileOutcome::Skipped => println!("[skipped]   {}", name),
            FileOutcome::Failed(reason) => println!("[error]     {}: {}", name, reason),
        }
    }
    println!(
        "{} converted, {} skipped, {} failed",
        report.converted(),
        report.skipped(),
        report.failed()
    );
    Ok(())
}
