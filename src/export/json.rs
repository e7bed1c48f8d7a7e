//! JSON export of a card's schedule and review log.
//! Output uses the same `srs_*` field names as the review responses, so
//! offline statistics tooling can read it without a separate schema.

use crate::error::Result;
use crate::models::CardHistory;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Writes a card history to a pretty-printed JSON file at `path`.
pub fn export_card_history_to_path(history: &CardHistory, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(history)?;
    let mut file = File::create(path)?;
    file.write_all(json_string.as_bytes())?;
    tracing::info!(
        card_id = history.card_id,
        reviews = history.reviews.len(),
        path = %path.display(),
        "card history exported"
    );
    Ok(())
}

/// Reads back a file written by `export_card_history_to_path`.
pub fn read_card_history(path: &Path) -> Result<CardHistory> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(serde_json::from_str(&contents)?)
}
