//! Run and process commands

use crate::config::Config;
use crate::error::Result;
use crate::meta::{MetaDb, Status};
use crate::notify::LogNotifier;
use crate::pipeline::{CycleReport, Pipeline, ProcessedItem};
use crate::progress::CycleProgress;
use std::sync::Arc;

/// Options for one scheduler cycle
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Overrides `queue.max_items_per_cycle`
    pub max_items: Option<usize>,
    pub show_progress: bool,
}

/// Run one cycle: retry errors, recover stale items, process the queue
pub async fn cmd_run(config: &Config, db: &MetaDb, options: RunOptions) -> Result<CycleReport> {
    let pipeline = Pipeline::from_config(config, db.clone(), Arc::new(LogNotifier))?;
    let max_items = options
        .max_items
        .unwrap_or(config.queue.max_items_per_cycle);

    let stats = db.get_stats().await?;
    let expected = max_items.min(stats.new + stats.error + stats.processing);
    let progress = CycleProgress::start(expected, options.show_progress);

    let report = pipeline
        .run_cycle(max_items, |item| progress.advance(&item.title))
        .await?;

    progress.finish("Cycle finished");
    Ok(report)
}

/// Claim and process a single video
pub async fn cmd_process(config: &Config, db: &MetaDb) -> Result<Option<ProcessedItem>> {
    let pipeline = Pipeline::from_config(config, db.clone(), Arc::new(LogNotifier))?;
    pipeline.process_next().await
}

pub fn print_processed(item: &ProcessedItem) {
    match item.status {
        Status::Analyzed => {
            let digest = if item.has_summary { "" } else { " (no digest)" };
            println!("✓ {} [{}]{}", item.title, item.video_id, digest);
        }
        _ => println!(
            "✗ {} [{}]: {}",
            item.title,
            item.video_id,
            item.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub fn print_cycle_report(report: &CycleReport) {
    println!("\n🔄 Cycle Summary\n");
    println!("  Errors reset for retry: {}", report.retried);
    println!("  Stale items recovered: {}", report.recovered);
    if report.lost > 0 {
        println!("  Claims lost to other workers: {}", report.lost);
    }
    println!("  Processed: {}", report.processed.len());
    println!("    Analyzed: {}", report.analyzed());
    println!("    Failed: {}", report.failed());

    if !report.processed.is_empty() {
        println!();
        for item in &report.processed {
            print_processed(item);
        }
    }
}
