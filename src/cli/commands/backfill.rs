//! Batch backfill command.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::services::{BackfillDriver, BackfillEvent, BackfillSummary, SkipReason};

/// Fill cached web detection for the active-id list.
pub async fn cmd_backfill(
    config: &Config,
    list_id: Option<String>,
    delay_ms: Option<u64>,
) -> anyhow::Result<()> {
    let list_id = list_id.unwrap_or_else(|| config.backfill.list_id.clone());
    let delay = Duration::from_millis(delay_ms.unwrap_or(config.backfill.delay_ms));

    let images = super::open_images(config)?;
    let detector = super::open_detector(config)?;
    let driver = BackfillDriver::new(images, detector, config.storage.clone(), delay);

    println!(
        "{} Starting batch web detection from {}/{}",
        style("→").cyan(),
        config.store.id_lists_collection,
        list_id
    );

    let (event_tx, mut event_rx) = mpsc::channel::<BackfillEvent>(100);

    let event_handler = tokio::spawn(async move {
        let mut progress: Option<ProgressBar> = None;

        while let Some(event) = event_rx.recv().await {
            match event {
                BackfillEvent::Started { total_documents } => {
                    println!(
                        "{} Found {} active images to process",
                        style("→").cyan(),
                        total_documents
                    );
                    let pb = ProgressBar::new(total_documents as u64);
                    pb.set_style(progress_style());
                    pb.set_message("Detecting...");
                    progress = Some(pb);
                }
                BackfillEvent::DocumentStarted { document_id, .. } => {
                    if let Some(ref pb) = progress {
                        pb.set_message(document_id);
                    }
                }
                BackfillEvent::DocumentCompleted {
                    document_id,
                    entities,
                    similar_images,
                } => {
                    if let Some(ref pb) = progress {
                        pb.println(format!(
                            "{} {}: {} entities, {} similar images",
                            style("✓").green(),
                            document_id,
                            entities,
                            similar_images
                        ));
                        pb.inc(1);
                    }
                }
                BackfillEvent::DocumentSkipped {
                    document_id,
                    reason,
                } => {
                    if let Some(ref pb) = progress {
                        if reason != SkipReason::AlreadyCached {
                            pb.println(format!(
                                "{} Skipping {} - {}",
                                style("!").yellow(),
                                document_id,
                                reason
                            ));
                        }
                        pb.inc(1);
                    }
                }
                BackfillEvent::DocumentFailed { document_id, error } => {
                    if let Some(ref pb) = progress {
                        pb.println(format!(
                            "{} {}: {}",
                            style("✗").red(),
                            document_id,
                            error
                        ));
                        pb.inc(1);
                    }
                }
                BackfillEvent::Complete { .. } => {
                    if let Some(pb) = progress.take() {
                        pb.finish_and_clear();
                    }
                }
            }
        }
    });

    let result = driver.run(&list_id, event_tx).await;
    let _ = event_handler.await;

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            Err(e.into())
        }
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn print_summary(summary: &BackfillSummary) {
    println!();
    println!("{}", style("=== Summary ===").bold());
    println!("Processed: {}", style(summary.processed).green());
    println!("Skipped: {}", summary.skipped);
    println!("Errors/Empty: {}", style(summary.errors).red());
    println!("Total: {}", summary.total);
}
