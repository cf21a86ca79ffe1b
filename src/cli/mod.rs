//! Command-line interface for booki.
//!
//! Provides commands for listing the shelf, adding books through pairwise
//! comparisons, tagging, reordering, searching and importing a reading
//! history.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::adapters::{BookSearch, OpenLibraryClient};
use crate::config;
use crate::core::{
    max_comparisons, AddStep, Assignment, ComparisonSession, PositionStore, Shelf,
};
use crate::domain::{all_tags, Category, Entry, EntryId, NewEntry, Tags};
use crate::ingest::{dedup_against, parse_export, EnqueueResult, ImportProcessor, ImportQueue};

pub mod prompt;
pub mod queue;

use prompt::StdinPrompter;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// booki - a personal bookshelf ranked by pairwise comparison
#[derive(Parser, Debug)]
#[command(name = "booki")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the shelf, grouped by category
    List {
        /// Only show one category
        #[arg(short, long, value_enum)]
        category: Option<CategoryArg>,

        /// Only show entries whose tags contain this text
        #[arg(short, long)]
        tag: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Add a book, answering comparisons to place it
    Add {
        title: String,

        author: String,

        #[arg(long)]
        isbn: Option<String>,

        #[arg(short, long, value_enum, default_value = "tbr")]
        category: CategoryArg,

        /// Tags to apply (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,

        /// Print the first step as JSON and exit instead of prompting
        #[arg(long)]
        json: bool,
    },

    /// Answer one comparison for a session printed by `add --json`
    Compare {
        /// Session JSON
        #[arg(long)]
        session: String,

        /// The new book is better than the one shown
        #[arg(long, conflicts_with = "worse", required_unless_present = "worse")]
        better: bool,

        /// The new book is worse than the one shown
        #[arg(long)]
        worse: bool,
    },

    /// Set (or toggle) the tags of an entry
    Tag {
        id: EntryId,

        /// Comma-separated tags
        tags: String,

        /// Toggle each given tag instead of replacing the set
        #[arg(long)]
        toggle: bool,
    },

    /// Delete an entry
    Delete { id: EntryId },

    /// Move an entry to another rank within its category (ranks start at 1)
    Move {
        from: usize,

        to: usize,

        #[arg(short, long, value_enum)]
        category: CategoryArg,
    },

    /// Apply a whole-category ordering from a JSON file of {id, position}
    Reorder {
        file: PathBuf,

        #[arg(short, long, value_enum)]
        category: CategoryArg,
    },

    /// Search for books by title
    Search {
        query: String,

        /// Add the Nth result (starting at 1)
        #[arg(long)]
        add_index: Option<usize>,

        /// Category for the added result
        #[arg(short, long, value_enum, default_value = "tbr")]
        category: CategoryArg,
    },

    /// Import a reading-history CSV export
    Import {
        file: PathBuf,

        /// Only queue the books; process later with `queue resume`
        #[arg(long)]
        no_run: bool,
    },

    /// Manage the import queue
    Queue {
        #[command(subcommand)]
        command: queue::QueueCommands,
    },

    /// List every tag in use
    Tags,

    /// Show resolved configuration (debug)
    Config,
}

/// Category for CLI (maps to Category)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    /// Ranked: liked it
    LikedIt,

    /// Ranked: it was ok
    ItWasOk,

    /// Ranked: didn't like it
    DidntLikeIt,

    /// To be read, in insertion order
    Tbr,
}

impl From<CategoryArg> for Category {
    fn from(c: CategoryArg) -> Self {
        match c {
            CategoryArg::LikedIt => Category::LikedIt,
            CategoryArg::ItWasOk => Category::ItWasOk,
            CategoryArg::DidntLikeIt => Category::DidntLikeIt,
            CategoryArg::Tbr => Category::Tbr,
        }
    }
}

/// JSON shape of one add-flow step
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum StepOutput {
    Inserted {
        entry: Entry,
    },
    Compare {
        session: ComparisonSession,
        subject: Entry,
        max_remaining: u32,
    },
}

impl From<AddStep> for StepOutput {
    fn from(step: AddStep) -> Self {
        match step {
            AddStep::Inserted(entry) => StepOutput::Inserted { entry },
            AddStep::Compare { session, subject } => StepOutput::Compare {
                max_remaining: max_comparisons(session.high - session.low),
                session,
                subject,
            },
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::List { category, tag, json } => {
                list_shelf(category.map(Category::from), tag.as_deref(), json)
            }
            Commands::Add {
                title,
                author,
                isbn,
                category,
                tags,
                json,
            } => {
                let mut candidate = NewEntry::new(title, author)
                    .with_tags(tags.as_deref().map(Tags::parse).unwrap_or_default());
                if let Some(isbn) = isbn {
                    candidate = candidate.with_isbn(isbn);
                }
                add_book(candidate, category.into(), json)
            }
            Commands::Compare {
                session,
                better,
                worse: _,
            } => compare(&session, better),
            Commands::Tag { id, tags, toggle } => tag_entry(id, &tags, toggle),
            Commands::Delete { id } => delete_entry(id),
            Commands::Move { from, to, category } => move_entry(category.into(), from, to),
            Commands::Reorder { file, category } => reorder(&file, category.into()),
            Commands::Search {
                query,
                add_index,
                category,
            } => search(&query, add_index, category.into()).await,
            Commands::Import { file, no_run } => import(&file, no_run).await,
            Commands::Queue { command } => queue::execute(command).await,
            Commands::Tags => list_tags(),
            Commands::Config => show_config(),
        }
    }
}

/// Open the configured shelf database
pub(crate) fn open_shelf() -> Result<Shelf> {
    let path = config::database_path()?;
    let store = PositionStore::open(&path)
        .with_context(|| format!("Failed to open shelf: {}", path.display()))?;
    Ok(Shelf::new(store))
}

fn rank_to_position(rank: usize) -> Result<usize> {
    if rank == 0 {
        anyhow::bail!("Ranks start at 1");
    }
    Ok(rank - 1)
}

fn print_entry(entry: &Entry) {
    let tags = if entry.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", entry.tags)
    };
    println!(
        "  {:>3}. {} by {}{}  (#{})",
        entry.position + 1,
        entry.title,
        entry.author,
        tags,
        entry.id
    );
}

/// List the shelf
fn list_shelf(category: Option<Category>, tag: Option<&str>, json: bool) -> Result<()> {
    let shelf = open_shelf()?;
    let mut shelves = shelf.store().list_all()?;
    if let Some(filter) = tag {
        shelves = shelves.filtered_by_tag(filter);
    }

    if json {
        let out = match category {
            Some(category) => serde_json::to_string_pretty(shelves.get(category))?,
            None => serde_json::to_string_pretty(&shelves)?,
        };
        println!("{}", out);
        return Ok(());
    }

    for (cat, entries) in shelves.iter() {
        if category.is_some_and(|c| c != cat) {
            continue;
        }

        println!();
        println!("{} ({})", cat, entries.len());
        println!("{}", "─".repeat(60));
        if entries.is_empty() {
            println!("  (empty)");
        }
        for entry in entries {
            print_entry(entry);
        }
    }
    println!();

    Ok(())
}

/// Add a book interactively (or print the first step with `--json`)
fn add_book(candidate: NewEntry, category: Category, json: bool) -> Result<()> {
    let mut shelf = open_shelf()?;

    if json {
        let step = shelf.begin_add(candidate, category)?;
        println!("{}", serde_json::to_string_pretty(&StepOutput::from(step))?);
        return Ok(());
    }

    let title = candidate.title.clone();
    match shelf.place(candidate, category, &mut StdinPrompter)? {
        Some(entry) => {
            println!();
            println!(
                "✅ Added '{}' to {} at #{}",
                entry.title,
                entry.category,
                entry.position + 1
            );
        }
        None => {
            println!();
            println!("Stopped. '{}' was not added.", title);
        }
    }

    Ok(())
}

/// One stateless comparison round trip
fn compare(session_json: &str, better: bool) -> Result<()> {
    let session: ComparisonSession =
        serde_json::from_str(session_json).context("Invalid session JSON")?;

    let mut shelf = open_shelf()?;
    let step = shelf.record_judgment(session, better)?;
    println!("{}", serde_json::to_string_pretty(&StepOutput::from(step))?);

    Ok(())
}

fn tag_entry(id: EntryId, raw: &str, toggle: bool) -> Result<()> {
    let mut shelf = open_shelf()?;
    let entry = shelf.store().get(id)?;

    let tags = if toggle {
        let mut tags = entry.tags.clone();
        for tag in Tags::parse(raw).iter() {
            tags.toggle(tag);
        }
        tags
    } else {
        Tags::parse(raw)
    };

    shelf.store_mut().update_tags(id, &tags)?;
    println!("Tags for '{}': {}", entry.title, tags);

    Ok(())
}

fn delete_entry(id: EntryId) -> Result<()> {
    let mut shelf = open_shelf()?;
    let entry = shelf.store_mut().delete(id)?;
    println!("🗑️  Deleted '{}' from {}", entry.title, entry.category);
    Ok(())
}

fn move_entry(category: Category, from: usize, to: usize) -> Result<()> {
    let mut shelf = open_shelf()?;
    shelf
        .store_mut()
        .move_within(category, rank_to_position(from)?, rank_to_position(to)?)?;
    println!("Moved #{} to #{} in {}", from, to, category);
    Ok(())
}

fn reorder(path: &Path, category: Category) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let assignments: Vec<Assignment> = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut shelf = open_shelf()?;
    shelf.store_mut().apply_reorder(category, &assignments)?;
    println!("Reordered {} entries in {}", assignments.len(), category);
    Ok(())
}

async fn search(query: &str, add_index: Option<usize>, category: Category) -> Result<()> {
    let client = OpenLibraryClient::from_config(&config::config()?.search)?;
    let hits = client.search(query).await?;

    if hits.is_empty() {
        println!("No results for '{}'", query);
        return Ok(());
    }

    let Some(index) = add_index else {
        println!("Results from {}:", client.name());
        for (i, hit) in hits.iter().enumerate() {
            let isbn = hit.isbn.as_deref().map(|i| format!("  (ISBN {})", i)).unwrap_or_default();
            println!("{:>3}. {} by {}{}", i + 1, hit.title, hit.author, isbn);
        }
        return Ok(());
    };

    let hit = hits
        .into_iter()
        .nth(rank_to_position(index)?)
        .with_context(|| format!("No result #{}", index))?;

    add_book(hit.into_new_entry(), category, false)
}

/// Per-kind counts of an import's enqueue results
#[derive(Debug, Default, PartialEq, Eq)]
struct EnqueueTally {
    queued: usize,
    requeued: usize,
    already_queued: usize,
}

impl EnqueueTally {
    fn from_results(results: &[EnqueueResult]) -> Self {
        let mut tally = Self::default();
        for result in results {
            match result {
                EnqueueResult::Queued(_) => tally.queued += 1,
                EnqueueResult::Requeued(_) => tally.requeued += 1,
                EnqueueResult::AlreadyQueued(_) => tally.already_queued += 1,
            }
        }
        tally
    }
}

async fn import(path: &Path, no_run: bool) -> Result<()> {
    let cfg = config::config()?;
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut report = parse_export(file, cfg.import.delimiter)?;

    let mut shelf = open_shelf()?;
    dedup_against(&mut report, &shelf.store().list_all()?);

    let queue = ImportQueue::open_default().await?;
    let results = queue.enqueue_all(&report.records).await?;
    let tally = EnqueueTally::from_results(&results);

    println!();
    println!("Import Results:");
    println!("  Queued:                {}", tally.queued);
    println!("  Queued again:          {}", tally.requeued);
    println!("  Already queued:        {}", tally.already_queued);
    println!("  Already on shelf:      {}", report.skipped_duplicates);
    println!("  Uncategorized (skip):  {}", report.skipped_uncategorized);
    if report.skipped_malformed > 0 {
        println!("  Malformed (skip):      {}", report.skipped_malformed);
    }

    if no_run {
        println!();
        println!("Run `booki queue resume` to place the queued books.");
        return Ok(());
    }

    let summary = ImportProcessor::new(&mut shelf, &queue, StdinPrompter)
        .run()
        .await?;
    queue::print_summary(&summary);

    Ok(())
}

fn list_tags() -> Result<()> {
    let shelf = open_shelf()?;
    let shelves = shelf.store().list_all()?;
    let tags = all_tags(shelves.entries().map(|e| &e.tags));

    if tags.is_empty() {
        println!("No tags yet");
    }
    for tag in tags {
        println!("{}", tag);
    }
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("  booki Configuration");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:          {}", cfg.home.display());
    println!("  Database:      {}", cfg.database.display());
    println!("  Import queue:  {}", cfg.import_queue.display());
    println!();
    println!("Search:");
    println!("  Endpoint:  {}", cfg.search.endpoint);
    println!("  Limit:     {}", cfg.search.limit);
    println!("  Timeout:   {}s", cfg.search.timeout_seconds);
    println!();
    println!("Import:");
    println!("  Delimiter: {:?}", cfg.import.delimiter as char);

    Ok(())
}
