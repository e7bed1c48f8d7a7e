use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flashcards_srs::database::db;
use flashcards_srs::export::json::export_card_history_to_path;
use flashcards_srs::{Config, ReviewService, logging};
use serde::Serialize;

/// Spaced-repetition review scheduling for flashcards
#[derive(Parser)]
#[command(name = "flashcards")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grade flashcard reviews and inspect their schedules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a graded review (again, hard, good, easy) and print the new schedule
    Review {
        card_id: i64,
        grade: String,
    },

    /// Record a review outcome (correct, wrong, timeout, reveal) without rescheduling
    Log {
        card_id: i64,
        result: String,
        /// Time taken to answer, in milliseconds
        #[arg(long, allow_negative_numbers = true)]
        duration_ms: Option<i64>,
    },

    /// Print a card's current schedule
    Show { card_id: i64 },

    /// Print what each grade would do to a card, without applying it
    Preview { card_id: i64 },

    /// Print a card's review log
    History { card_id: i64 },

    /// List cards that are due now
    Due {
        #[arg(long)]
        deck: Option<i64>,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Write a card's schedule and review log to a JSON file
    Export { card_id: i64, output: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    logging::init_tracing(&config.log_level);

    // Sample cards go only into a database file this run creates.
    let created = !config.db_path.exists();
    let service = ReviewService::open(&config)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    if created {
        service.with_connection(db::seed_sample_deck)?;
    }

    match cli.command {
        Commands::Review { card_id, grade } => print_json(&service.submit_review(card_id, &grade)?),
        Commands::Log {
            card_id,
            result,
            duration_ms,
        } => print_json(&service.record_review_event(card_id, &result, duration_ms)?),
        Commands::Show { card_id } => print_json(&service.schedule(card_id)?),
        Commands::Preview { card_id } => {
            let preview: Vec<_> = service
                .preview(card_id)?
                .into_iter()
                .map(|(grade, schedule)| serde_json::json!({ "grade": grade, "schedule": schedule }))
                .collect();
            print_json(&preview)
        }
        Commands::History { card_id } => print_json(&service.review_log(card_id)?),
        Commands::Due { deck, limit } => print_json(&service.due_cards(deck, limit)?),
        Commands::Export { card_id, output } => {
            let history = service.card_history(card_id)?;
            export_card_history_to_path(&history, &output)?;
            println!("Exported card {} to {}", card_id, output.display());
            Ok(())
        }
    }
}
