use clap::{Parser, Subcommand};
use tracing::{error, info};

use hum_unify::config::Config;
use hum_unify::constants;
use hum_unify::domain::Category;
use hum_unify::logging;
use hum_unify::pipeline::manifest::{build_manifest, write_manifest};
use hum_unify::pipeline::search::{build_search_index, write_search_index};
use hum_unify::pipeline::storage::partition::load_index;
use hum_unify::pipeline::validate::{validate, write_report};
use hum_unify::pipeline::PipelineRun;

#[derive(Parser)]
#[command(name = "hum_unify")]
#[command(about = "Humanitarian crisis data unification pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform raw source batches and regenerate category partitions
    Run {
        /// Specific sources to run (comma-separated). Default: every
        /// supported source with a batch file in the input directory
        #[arg(long)]
        sources: Option<String>,
        /// Override the configured input directory
        #[arg(long)]
        input_dir: Option<std::path::PathBuf>,
    },
    /// Re-lay an oversized category as fixed-size chunks
    Chunk {
        /// Category to chunk (e.g. conflict, health)
        #[arg(long)]
        category: String,
        /// Records per chunk; defaults to the configured chunk_size
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Rebuild the corpus manifest from partition indexes
    Manifest,
    /// Rebuild the flattened search index
    SearchIndex,
    /// Check on-disk invariants and write validation-report.json
    Validate,
    /// Print per-category record counts
    Status,
}

fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Commands::Run { input_dir: Some(dir), .. } = &cli.command {
        config.input_dir = dir.clone();
    }
    let run = PipelineRun::new(config);

    match cli.command {
        Commands::Run { sources, .. } => {
            let source_list: Vec<String> = match sources {
                Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
                None => constants::supported_sources()
                    .into_iter()
                    .filter(|s| run.config().input_dir.join(format!("{}.json", s)).exists())
                    .map(str::to_string)
                    .collect(),
            };
            if source_list.is_empty() {
                println!(
                    "⚠️  No batch files found in {}",
                    run.config().input_dir.display()
                );
                return Ok(());
            }

            println!("🔄 Running unification pipeline...");
            let mut failures = 0;
            for (source, result) in run.run_sources(&source_list) {
                match result {
                    Ok(stats) => {
                        info!(source = %source, "source run finished");
                        println!("\n📊 Results for {}:", source);
                        println!("   Category: {}", stats.category);
                        println!("   Input records: {}", stats.input);
                        println!("   Unified records: {}", stats.emitted);
                        println!("   Dropped: {}", stats.dropped);
                        println!("   Partitions: {}", stats.partitions);
                    }
                    Err(e) => {
                        failures += 1;
                        error!(source = %source, "source run failed: {}", e);
                        println!("\n⚠️  {} failed: {}", source, e);
                    }
                }
            }

            let manifest = build_manifest(&run.config().unified_root)?;
            write_manifest(&run.config().unified_root, &manifest)?;
            println!(
                "\n🗂️  Manifest updated: {} records across {} categories",
                manifest.total_records,
                manifest.categories.len()
            );
            if failures > 0 {
                println!(
                    "⚠️  {} source(s) failed; their previous partition sets were kept",
                    failures
                );
            }
        }
        Commands::Chunk { category, chunk_size } => {
            let category = Category::parse(&category)
                .ok_or_else(|| anyhow::anyhow!("unknown category: {}", category))?;
            let size = chunk_size.unwrap_or(run.config().chunk_size);
            let index = run.chunk_category(category, size)?;
            println!(
                "📦 Wrote {} chunk(s) covering {} records",
                index.total_chunks, index.total_records
            );
        }
        Commands::Manifest => {
            let manifest = build_manifest(&run.config().unified_root)?;
            write_manifest(&run.config().unified_root, &manifest)?;
            println!("🗂️  Manifest: {} total records", manifest.total_records);
            for summary in &manifest.categories {
                println!(
                    "   {}: {} records, {} region(s)",
                    summary.category,
                    summary.record_count,
                    summary.regions.len()
                );
            }
        }
        Commands::SearchIndex => {
            let index = build_search_index(&run.config().unified_root)?;
            write_search_index(&run.data_root(), &index)?;
            println!("🔍 Search index built: {} entries", index.len());
        }
        Commands::Validate => {
            let report = validate(&run.config().unified_root, run.config());
            write_report(&run.data_root(), &report)?;
            println!(
                "🧪 Validation {}: {}/{} checks passed",
                report.summary.status, report.summary.passed, report.summary.total_tests
            );
            for finding in &report.errors {
                println!(
                    "   - [{}] {} {}: {}",
                    finding.check,
                    finding.category,
                    finding.file.as_deref().unwrap_or("-"),
                    finding.message
                );
            }
            if !report.passed() {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            for category in Category::all() {
                if let Some(index) = load_index(&run.config().unified_root, *category)? {
                    let range = index
                        .date_range
                        .as_ref()
                        .map(|r| format!("{}..{}", r.start, r.end))
                        .unwrap_or_else(|| "empty".to_string());
                    println!("   {}: {} records ({})", category, index.total_records, range);
                }
            }
        }
    }

    Ok(())
}
