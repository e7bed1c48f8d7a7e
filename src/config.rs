use crate::models::Scheduler;
use crate::models::scheduler::DEFAULT_LEARNING_STEPS;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Learning ladder in minutes.
    pub learning_steps: Vec<u32>,
    pub busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("db.sqlite3"),
            log_level: "info".to_string(),
            learning_steps: DEFAULT_LEARNING_STEPS.to_vec(),
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let db_path = lookup("DB_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let log_level = lookup("RUST_LOG").unwrap_or(defaults.log_level);

        let learning_steps = match lookup("SRS_LEARNING_STEPS") {
            Some(raw) => parse_steps(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "invalid SRS_LEARNING_STEPS, using default ladder");
                defaults.learning_steps
            }),
            None => defaults.learning_steps,
        };

        let busy_timeout_ms = match lookup("SRS_BUSY_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid SRS_BUSY_TIMEOUT_MS, using default timeout");
                defaults.busy_timeout_ms
            }),
            None => defaults.busy_timeout_ms,
        };

        Self {
            db_path,
            log_level,
            learning_steps,
            busy_timeout_ms,
        }
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::with_learning_steps(self.learning_steps.clone()).unwrap_or_default()
    }
}

/// Parses "1, 10, 60" into minutes; rejects empty ladders and zero steps.
fn parse_steps(raw: &str) -> Option<Vec<u32>> {
    let steps = raw
        .split(',')
        .map(|part| part.trim().parse::<u32>().ok().filter(|&m| m > 0))
        .collect::<Option<Vec<_>>>()?;
    (!steps.is_empty()).then_some(steps)
}
