//! Import queue CLI commands.
//!
//! - `booki queue status` - Show queue status
//! - `booki queue resume` - Continue confirming and placing queued books
//! - `booki queue skip` - Discard the book currently in progress

use anyhow::Result;
use clap::Subcommand;

use super::open_shelf;
use super::prompt::StdinPrompter;
use crate::ingest::{ImportProcessor, ImportQueue, RunSummary};

/// Import queue subcommands
#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Show import queue status
    Status {
        /// Maximum number of pending items to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Resume processing queued books
    Resume,

    /// Discard the book currently in progress
    Skip,
}

/// Execute a queue command
pub async fn execute(command: QueueCommands) -> Result<()> {
    match command {
        QueueCommands::Status { limit } => execute_status(limit).await,
        QueueCommands::Resume => execute_resume().await,
        QueueCommands::Skip => execute_skip().await,
    }
}

async fn execute_status(limit: usize) -> Result<()> {
    let queue = ImportQueue::open_default().await?;
    let status = queue.status().await?;

    println!();
    println!("Import Queue Status");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Queue file:  {}", queue.path().display());
    println!();
    println!("  Pending:    {}", status.pending);
    println!("  Current:    {}", if status.current.is_some() { 1 } else { 0 });
    println!("  Done:       {}", status.done);
    println!("  Discarded:  {}", status.discarded);
    println!();

    if let Some(ref current) = status.current {
        let record = &current.data.record;
        println!("In progress: [{}] {} by {}", current.id, record.title, record.author);
        println!();
    }

    let pending = queue.pending().await?;
    if !pending.is_empty() {
        println!("Next up:");
        for item in pending.iter().take(limit) {
            let record = &item.data.record;
            println!(
                "  [{}] {:<40} {:<24} {}",
                item.id,
                truncate(&record.title, 40),
                truncate(&record.author, 24),
                record.category
            );
        }
        if pending.len() > limit {
            println!("  ... and {} more", pending.len() - limit);
        }
        println!();
    }

    if status.is_idle() {
        println!("✓ Nothing left to import");
    }

    Ok(())
}

async fn execute_resume() -> Result<()> {
    let queue = ImportQueue::open_default().await?;
    let mut shelf = open_shelf()?;

    let summary = ImportProcessor::new(&mut shelf, &queue, StdinPrompter)
        .run()
        .await?;
    print_summary(&summary);

    Ok(())
}

async fn execute_skip() -> Result<()> {
    let queue = ImportQueue::open_default().await?;

    match queue.current().await? {
        Some(item) => {
            queue.discard(&item.id).await?;
            println!(
                "⏭️  Skipped {} by {}",
                item.data.record.title, item.data.record.author
            );
        }
        None => println!("No book in progress"),
    }

    Ok(())
}

pub(super) fn print_summary(summary: &RunSummary) {
    println!();
    println!("Placed:     {}", summary.inserted);
    println!("Discarded:  {}", summary.discarded);
    if summary.paused {
        println!();
        println!("⏸️  Paused. Run `booki queue resume` to continue.");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
